//! 订单消息 DTO
//!
//! Kafka 消息体与 HTTP 响应体共用同一套结构。字段缺失时按零值解码，
//! 由校验规则统一报告，而不是在反序列化阶段直接失败。

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 收货信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeliveryDto {
    #[validate(length(min = 1, message = "收货人不能为空"))]
    pub name: String,
    #[validate(length(min = 3, max = 32, message = "电话长度必须在3-32个字符之间"))]
    pub phone: String,
    #[validate(length(min = 1, message = "邮编不能为空"))]
    pub zip: String,
    #[validate(length(min = 1, message = "城市不能为空"))]
    pub city: String,
    #[validate(length(min = 1, message = "地址不能为空"))]
    pub address: String,
    #[validate(length(min = 1, message = "地区不能为空"))]
    pub region: String,
    #[validate(
        length(min = 1, message = "邮箱不能为空"),
        email(message = "邮箱格式不正确")
    )]
    pub email: String,
}

/// 支付信息，金额字段均为最小货币单位
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PaymentDto {
    #[validate(length(min = 1, message = "交易号不能为空"))]
    pub transaction: String,
    pub request_id: String,
    #[validate(length(min = 1, message = "币种不能为空"))]
    pub currency: String,
    #[validate(length(min = 1, message = "支付渠道不能为空"))]
    pub provider: String,
    #[validate(range(min = 0, message = "金额不能为负"))]
    pub amount: i64,
    /// 支付时间，Unix 秒
    #[validate(range(min = 0, message = "支付时间不能为负"))]
    pub payment_dt: i64,
    #[validate(length(min = 1, message = "银行不能为空"))]
    pub bank: String,
    #[validate(range(min = 0, message = "运费不能为负"))]
    pub delivery_cost: i64,
    #[validate(range(min = 0, message = "商品总额不能为负"))]
    pub goods_total: i64,
    #[validate(range(min = 0, message = "关税不能为负"))]
    pub custom_fee: i64,
}

/// 订单行项目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ItemDto {
    #[validate(range(min = 1, message = "chrt_id 必须大于0"))]
    pub chrt_id: i64,
    pub track_number: String,
    #[validate(range(min = 0, message = "价格不能为负"))]
    pub price: i64,
    pub rid: String,
    #[validate(length(min = 1, message = "商品名称不能为空"))]
    pub name: String,
    /// 折扣百分比
    #[validate(range(min = 0, max = 100, message = "折扣必须在0-100之间"))]
    pub sale: i16,
    #[validate(length(min = 1, message = "尺码不能为空"))]
    pub size: String,
    #[validate(range(min = 1, message = "总价必须大于0"))]
    pub total_price: i64,
    #[validate(range(min = 1, message = "nm_id 必须大于0"))]
    pub nm_id: i64,
    #[validate(length(min = 1, message = "品牌不能为空"))]
    pub brand: String,
    #[validate(custom(function = "validate_status"))]
    pub status: i32,
}

/// 订单
///
/// `items` 与 `date_created` 用 Option 区分"缺失"和"零值"，缺失时校验失败；
/// 空的商品列表是合法的。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OrderDto {
    #[validate(length(min = 1, message = "order_uid 不能为空"))]
    pub order_uid: String,
    pub track_number: String,
    #[validate(length(min = 1, message = "entry 不能为空"))]
    pub entry: String,
    pub delivery: DeliveryDto,
    pub payment: PaymentDto,
    #[validate(required(message = "items 不能为空"))]
    pub items: Option<Vec<ItemDto>>,
    #[validate(length(min = 1, message = "locale 不能为空"))]
    pub locale: String,
    #[validate(length(min = 1, message = "internal_signature 不能为空"))]
    pub internal_signature: String,
    #[validate(length(min = 1, message = "customer_id 不能为空"))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "delivery_service 不能为空"))]
    pub delivery_service: String,
    #[validate(length(min = 1, message = "shardkey 不能为空"))]
    pub shardkey: String,
    #[validate(range(min = 1, message = "sm_id 必须大于0"))]
    pub sm_id: i64,
    #[validate(required(message = "date_created 不能为空"))]
    pub date_created: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "oof_shard 不能为空"))]
    pub oof_shard: String,
}

impl OrderDto {
    /// 商品列表，缺失时视为空
    pub fn items(&self) -> &[ItemDto] {
        self.items.as_deref().unwrap_or_default()
    }
}

/// 状态码 0 表示未填写
fn validate_status(status: i32) -> Result<(), ValidationError> {
    if status == 0 {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("状态不能为空")));
    }
    Ok(())
}
