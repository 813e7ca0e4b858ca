//! 订单持久化实体
//!
//! 与数据库表一一对应。`OrderInfo` 是订单、支付、商品三者组成的聚合，
//! 既是写入单元也是缓存单元。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 订单主表 `orders`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    /// 收货信息的 JSON 文本，存储层不解析
    pub delivery: String,
    /// 等于关联支付的 `transaction`
    pub payment_id: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

/// 支付表 `payments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: DateTime<Utc>,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// 商品表 `items`，以 `chrt_id` 全局唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i16,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

/// 订单聚合
///
/// 不变式：`payment.transaction == order.payment_id`，
/// `items` 恰好是关联表中该订单的全部商品，按 `chrt_id` 升序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub order: Order,
    pub payment: Payment,
    pub items: Vec<Item>,
}

impl OrderInfo {
    pub fn order_uid(&self) -> &str {
        &self.order.order_uid
    }

    pub fn chrt_ids(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.chrt_id).collect()
    }

    /// 检查聚合内部的引用关系是否一致
    pub fn is_consistent(&self) -> bool {
        self.payment.transaction == self.order.payment_id
    }
}
