//! 仓储 Trait 定义

use async_trait::async_trait;

use crate::error::Result;
use crate::models::OrderInfo;

/// 订单聚合存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// 读取完整聚合；订单或其支付不存在时返回 `NotFound`
    async fn load(&self, order_uid: &str) -> Result<OrderInfo>;

    /// 在一个事务内写入支付、商品、订单与关联关系，任何一步失败整体回滚
    async fn upsert(&self, info: &OrderInfo) -> Result<()>;
}
