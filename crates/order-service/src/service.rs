//! 订单查询服务
//!
//! 查询接口和消费者共用的业务入口：读取时把聚合还原为 DTO，
//! 写入时把 DTO 转换为聚合后交给存储。

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::converter::{to_dto, to_entity};
use crate::dto::OrderDto;
use crate::error::{OrderError, Result};
use crate::store::OrderStore;

/// 订单服务
#[derive(Clone)]
pub struct OrderService {
    store: Arc<OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }

    /// 按 order_uid 查询订单
    ///
    /// 存储数据无法还原时返回 `MalformedStoredData`，归类为存储错误。
    #[instrument(skip(self))]
    pub async fn get(&self, order_uid: &str) -> Result<OrderDto> {
        let info = self.store.get_by_uid(order_uid).await?;

        to_dto(&info).inspect_err(|e| {
            if let OrderError::MalformedStoredData { reason, .. } = e {
                error!(reason = %reason, "订单存储数据损坏，无法还原");
            }
        })
    }

    /// 转换并写入订单，错误返回给调用方
    #[instrument(skip(self, dto), fields(order_uid = %dto.order_uid))]
    pub async fn persist(&self, dto: &OrderDto) -> Result<()> {
        let info = to_entity(dto)?;
        self.store.upsert(&info).await?;
        info!(items = info.items.len(), "订单已入库");
        Ok(())
    }

    /// 转换并写入订单，失败只记录日志
    pub async fn save(&self, dto: &OrderDto) {
        if let Err(e) = self.persist(dto).await {
            warn!(
                order_uid = %dto.order_uid,
                error = %e,
                code = e.error_code(),
                "订单写入失败，已丢弃"
            );
        }
    }
}
