//! 订单存储
//!
//! 组合持久化存储与进程内缓存，读路径采用缓存优先（cache-aside）：
//! 命中直接返回，未命中从存储读取聚合后回填缓存。
//!
//! 写路径只写存储，不更新也不失效缓存条目，因此同一订单在缓存过期前
//! 可能读到写入之前的值。旧值的存活时间由缓存 TTL 限制。

use std::sync::Arc;
use std::time::Instant;

use order_shared::observability::metrics;
use tracing::{debug, instrument, warn};

use crate::cache::OrderCache;
use crate::error::{OrderError, Result};
use crate::models::OrderInfo;
use crate::repository::OrderStorage;

/// 订单存储
pub struct OrderStore {
    storage: Arc<dyn OrderStorage>,
    cache: OrderCache,
}

impl OrderStore {
    pub fn new(storage: Arc<dyn OrderStorage>, cache: OrderCache) -> Self {
        Self { storage, cache }
    }

    /// 按 order_uid 读取聚合
    ///
    /// 存储返回错误时缓存保持不变。
    #[instrument(skip(self))]
    pub async fn get_by_uid(&self, order_uid: &str) -> Result<Arc<OrderInfo>> {
        let start = Instant::now();

        if let Some(cached) = self.cache.get(order_uid) {
            metrics::record_order_lookup("hit", start.elapsed().as_secs_f64());
            return Ok(cached);
        }

        match self.storage.load(order_uid).await {
            Ok(info) => {
                let info = Arc::new(info);
                self.cache.insert(Arc::clone(&info));
                metrics::record_order_lookup("miss", start.elapsed().as_secs_f64());
                debug!("订单已从存储加载并写入缓存");
                Ok(info)
            }
            Err(e @ OrderError::NotFound { .. }) => {
                metrics::record_order_lookup("not_found", start.elapsed().as_secs_f64());
                Err(e)
            }
            Err(e) => {
                metrics::record_order_lookup("error", start.elapsed().as_secs_f64());
                warn!(error = %e, "读取订单失败");
                Err(e)
            }
        }
    }

    /// 以单个事务写入聚合，不重试
    #[instrument(skip(self, info), fields(order_uid = %info.order_uid()))]
    pub async fn upsert(&self, info: &OrderInfo) -> Result<()> {
        match self.storage.upsert(info).await {
            Ok(()) => {
                metrics::record_order_upsert("success");
                Ok(())
            }
            Err(e) => {
                metrics::record_order_upsert("failure");
                Err(e)
            }
        }
    }

    /// 当前缓存的订单数
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// 手动移除缓存条目，写路径不会调用
    pub fn invalidate(&self, order_uid: &str) -> bool {
        self.cache.invalidate(order_uid)
    }
}
