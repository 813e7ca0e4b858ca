//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::time::Duration;

use order_shared::database::Database;

use crate::service::OrderService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    /// 就绪探针使用；未连接数据库（如内存存储测试）时为 None
    pub db: Option<Database>,
    /// 单个查询请求的截止时间
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: OrderService, db: Option<Database>, request_timeout: Duration) -> Self {
        Self {
            service,
            db,
            request_timeout,
        }
    }
}
