//! 路由配置模块
//!
//! 对外只暴露订单查询，另加存活/就绪探针。

use axum::{Router, http::Method, middleware, routing::get};
use order_shared::observability::middleware as obs_middleware;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::{handlers, state::AppState};

/// 构建完整的 HTTP 路由
///
/// `/order/{order_uid}` 只接受 GET，其它方法由 axum 返回 405 并带 `Allow` 头。
pub fn create_router(state: AppState) -> Router {
    // 查询页面可能与服务不同源，只放开只读方法
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/order/{order_uid}", get(handlers::get_order))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(obs_middleware::request_id))
                .layer(middleware::from_fn(obs_middleware::http_tracing))
                .layer(cors),
        )
        .with_state(state)
}
