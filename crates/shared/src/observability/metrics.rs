//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 在 `port` 上启动独立的 HTTP 服务器，暴露 `/metrics` 与 `/health`。
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "orders_ingested_total",
        "Kafka order messages processed, by outcome"
    );
    metrics::describe_counter!("order_upserts_total", "Order upsert transactions, by status");
    metrics::describe_counter!("order_lookups_total", "Order lookups by uid, by result");
    metrics::describe_histogram!(
        "order_lookup_duration_seconds",
        "Order lookup duration in seconds"
    );
    metrics::describe_counter!(
        "order_cache_events_total",
        "Order cache events (hit, miss, evict, expired)"
    );
    metrics::describe_gauge!("order_cache_entries", "Orders currently held in the cache");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求；`path` 应为路由模板而非原始路径，避免标签基数爆炸
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一条 Kafka 消息的最终处理结果
#[inline]
pub fn record_order_ingest(outcome: &'static str) {
    metrics::counter!("orders_ingested_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_order_upsert(status: &'static str) {
    metrics::counter!("order_upserts_total", "status" => status).increment(1);
}

/// 记录按 uid 查询订单
#[inline]
pub fn record_order_lookup(result: &'static str, duration_secs: f64) {
    metrics::counter!("order_lookups_total", "result" => result).increment(1);
    metrics::histogram!("order_lookup_duration_seconds", "result" => result)
        .record(duration_secs);
}

#[inline]
pub fn record_cache_event(event: &'static str) {
    metrics::counter!("order_cache_events_total", "event" => event).increment(1);
}

#[inline]
pub fn set_cache_entries(entries: usize) {
    metrics::gauge!("order_cache_entries").set(entries as f64);
}
