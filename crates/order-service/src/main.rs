//! 订单服务
//!
//! 同一进程内运行 Kafka 订单消费者和 HTTP 查询接口，两者共享订单存储与缓存。

use std::sync::Arc;
use std::time::Duration;

use order_service::{
    cache::OrderCache,
    consumer::{IngestHandler, OrderConsumer},
    repository::OrderRepository,
    routes,
    service::OrderService,
    state::AppState,
    store::OrderStore,
};
use order_shared::{
    config::AppConfig,
    database::Database,
    dlq::DlqProducer,
    kafka::KafkaProducer,
    observability,
    retry::RetryPolicy,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "order-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.observability, &config.service_name).await?;

    info!(
        environment = %config.environment,
        addr = %config.server_addr(),
        "Starting order-service..."
    );

    // 存储与缓存
    let db = Database::connect(&config.database).await?;
    let repository = OrderRepository::new(db.pool().clone());
    let cache = OrderCache::from_config(&config.cache);
    info!(
        max_entries = cache.max_entries(),
        ttl_secs = cache.ttl().map(|ttl| ttl.as_secs()),
        "订单缓存已初始化"
    );
    let store = Arc::new(OrderStore::new(Arc::new(repository), cache));
    let service = OrderService::new(store);

    // 消费者
    let mut handler = IngestHandler::new(
        service.clone(),
        RetryPolicy::from(&config.ingest),
        config.service_name.as_str(),
    );
    match config.kafka.dead_letter_topic.as_deref().filter(|t| !t.is_empty()) {
        Some(topic) => {
            let producer = KafkaProducer::new(&config.kafka)?;
            handler = handler.with_dead_letters(Arc::new(DlqProducer::new(producer, topic)));
            info!(dlq_topic = topic, "死信队列已启用");
        }
        None if config.is_production() => {
            warn!("生产环境未配置死信队列，重试耗尽的订单将丢失")
        }
        None => info!("未配置死信队列，重试耗尽的订单只记录日志"),
    }
    let consumer = OrderConsumer::new(&config.kafka, handler)?;

    // HTTP
    let state = AppState::new(
        service,
        Some(db.clone()),
        Duration::from_millis(config.server.request_timeout_ms),
    );
    let app = routes::create_router(state);
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        // HTTP 停止后通知消费者在当前消息处理完后退出
        let _ = shutdown_tx.send(true);
        result
    };

    let (server_result, consumer_result) = tokio::join!(server, consumer.run(shutdown_rx));

    if let Err(e) = consumer_result {
        error!(error = %e, "订单消费者异常退出");
    }

    db.close().await;
    info!("order-service shutdown complete");

    server_result?;
    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
