//! DTO 与持久化实体之间的转换
//!
//! 纯函数，不访问网络或存储。收货信息在实体中以 JSON 文本保存，
//! 支付时间在 DTO 中是 Unix 秒、在实体中是 `DateTime<Utc>`。

use chrono::DateTime;

use crate::dto::{DeliveryDto, ItemDto, OrderDto, PaymentDto};
use crate::error::{OrderError, Result};
use crate::models::{Item, Order, OrderInfo, Payment};

/// 将已校验的订单消息转换为待写入的聚合
///
/// `order.payment_id` 取自支付交易号。
pub fn to_entity(dto: &OrderDto) -> Result<OrderInfo> {
    let delivery = serde_json::to_string(&dto.delivery)
        .map_err(|e| OrderError::Conversion(format!("收货信息序列化失败: {e}")))?;

    let date_created = dto
        .date_created
        .ok_or_else(|| OrderError::Conversion("date_created 缺失".to_string()))?;

    let payment = payment_to_entity(&dto.payment)?;

    let order = Order {
        order_uid: dto.order_uid.clone(),
        track_number: dto.track_number.clone(),
        entry: dto.entry.clone(),
        delivery,
        payment_id: payment.transaction.clone(),
        locale: dto.locale.clone(),
        internal_signature: dto.internal_signature.clone(),
        customer_id: dto.customer_id.clone(),
        delivery_service: dto.delivery_service.clone(),
        shardkey: dto.shardkey.clone(),
        sm_id: dto.sm_id,
        date_created,
        oof_shard: dto.oof_shard.clone(),
    };

    Ok(OrderInfo {
        order,
        payment,
        items: dto.items().iter().map(item_to_entity).collect(),
    })
}

/// 将存储中读出的聚合还原为订单 DTO
///
/// 收货信息 JSON 无法解析时返回 `MalformedStoredData`。
pub fn to_dto(info: &OrderInfo) -> Result<OrderDto> {
    let delivery: DeliveryDto = serde_json::from_str(&info.order.delivery)
        .map_err(|e| OrderError::malformed(&info.order.order_uid, format!("收货信息: {e}")))?;

    let order = &info.order;
    Ok(OrderDto {
        order_uid: order.order_uid.clone(),
        track_number: order.track_number.clone(),
        entry: order.entry.clone(),
        delivery,
        payment: payment_to_dto(&info.payment),
        items: Some(info.items.iter().map(item_to_dto).collect()),
        locale: order.locale.clone(),
        internal_signature: order.internal_signature.clone(),
        customer_id: order.customer_id.clone(),
        delivery_service: order.delivery_service.clone(),
        shardkey: order.shardkey.clone(),
        sm_id: order.sm_id,
        date_created: Some(order.date_created),
        oof_shard: order.oof_shard.clone(),
    })
}

fn payment_to_entity(dto: &PaymentDto) -> Result<Payment> {
    let payment_dt = DateTime::from_timestamp(dto.payment_dt, 0).ok_or_else(|| {
        OrderError::Conversion(format!("payment_dt 超出可表示范围: {}", dto.payment_dt))
    })?;

    Ok(Payment {
        transaction: dto.transaction.clone(),
        request_id: dto.request_id.clone(),
        currency: dto.currency.clone(),
        provider: dto.provider.clone(),
        amount: dto.amount,
        payment_dt,
        bank: dto.bank.clone(),
        delivery_cost: dto.delivery_cost,
        goods_total: dto.goods_total,
        custom_fee: dto.custom_fee,
    })
}

fn payment_to_dto(payment: &Payment) -> PaymentDto {
    PaymentDto {
        transaction: payment.transaction.clone(),
        request_id: payment.request_id.clone(),
        currency: payment.currency.clone(),
        provider: payment.provider.clone(),
        amount: payment.amount,
        payment_dt: payment.payment_dt.timestamp(),
        bank: payment.bank.clone(),
        delivery_cost: payment.delivery_cost,
        goods_total: payment.goods_total,
        custom_fee: payment.custom_fee,
    }
}

fn item_to_entity(dto: &ItemDto) -> Item {
    Item {
        chrt_id: dto.chrt_id,
        track_number: dto.track_number.clone(),
        price: dto.price,
        rid: dto.rid.clone(),
        name: dto.name.clone(),
        sale: dto.sale,
        size: dto.size.clone(),
        total_price: dto.total_price,
        nm_id: dto.nm_id,
        brand: dto.brand.clone(),
        status: dto.status,
    }
}

fn item_to_dto(item: &Item) -> ItemDto {
    ItemDto {
        chrt_id: item.chrt_id,
        track_number: item.track_number.clone(),
        price: item.price,
        rid: item.rid.clone(),
        name: item.name.clone(),
        sale: item.sale,
        size: item.size.clone(),
        total_price: item.total_price,
        nm_id: item.nm_id,
        brand: item.brand.clone(),
        status: item.status,
    }
}
