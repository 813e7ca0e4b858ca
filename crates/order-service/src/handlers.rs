//! HTTP 请求处理器

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use order_shared::error::InfraError;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{instrument, warn};

use crate::error::{OrderError, Result};
use crate::state::AppState;

/// 按 order_uid 查询订单
///
/// GET /order/{order_uid}
///
/// 超过请求截止时间时放弃进行中的存储调用，返回 `CANCELLED`。
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Response> {
    let order = tokio::time::timeout(state.request_timeout, state.service.get(&order_uid))
        .await
        .map_err(|_| {
            warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "订单查询超时，已取消"
            );
            OrderError::Cancelled
        })??;

    let body = to_indented_json(&order).map_err(InfraError::from)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// 存活探针
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-service"
    }))
}

/// 就绪探针：检查数据库连接是否可用
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = match &state.db {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "service": "order-service",
            "checks": {
                "database": if db_ok { "ok" } else { "fail" }
            }
        })),
    )
}

/// 四空格缩进的 JSON
fn to_indented_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(buf)
}
