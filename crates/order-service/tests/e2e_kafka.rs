//! Kafka -> HTTP 端到端测试
//!
//! 需要已启动的 Kafka、PostgreSQL 和 order-service：
//! ```bash
//! KAFKA_BROKER=localhost:9092 ORDER_SERVICE_URL=http://127.0.0.1:8081 \
//!     cargo test -p order-service --test e2e_kafka -- --ignored
//! ```

use std::time::Duration;

use order_service::dto::OrderDto;
use order_service::test_utils::{sample_item, sample_order, unique_chrt_id, unique_order_uid};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use reqwest::StatusCode;

fn brokers() -> String {
    std::env::var("KAFKA_BROKER").unwrap_or_else(|_| "localhost:9092".into())
}

fn topic() -> String {
    std::env::var("KAFKA_ORDERS_TOPIC").unwrap_or_else(|_| "orders".into())
}

fn service_url() -> String {
    // 使用 127.0.0.1 而非 localhost，避免 IPv6 连接问题
    std::env::var("ORDER_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:8081".into())
}

async fn publish(order: &OrderDto) {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", brokers())
        .set("message.timeout.ms", "5000")
        .create()
        .expect("创建 Kafka 生产者失败");

    let payload = serde_json::to_vec(order).unwrap();
    let topic = topic();
    producer
        .send(
            FutureRecord::to(&topic)
                .key(&order.order_uid)
                .payload(&payload),
            Duration::from_secs(5),
        )
        .await
        .map_err(|(e, _)| e)
        .expect("发送订单消息失败");
}

/// 轮询查询接口直到返回非 404 或超时
async fn poll_order(order_uid: &str, timeout: Duration) -> (StatusCode, String) {
    let client = reqwest::Client::new();
    let url = format!("{}/order/{}", service_url(), order_uid);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let response = client.get(&url).send().await.expect("请求订单接口失败");
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::NOT_FOUND || tokio::time::Instant::now() >= deadline {
            return (status, body);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[tokio::test]
#[ignore = "需要运行服务"]
async fn test_published_order_becomes_queryable() {
    let order_uid = unique_order_uid();
    let chrt_id = unique_chrt_id();

    let mut order = sample_order(&order_uid);
    order.payment.amount = 100;
    let mut item = sample_item(chrt_id);
    item.total_price = 50;
    item.nm_id = 1;
    order.items = Some(vec![item]);

    publish(&order).await;

    let (status, body) = poll_order(&order_uid, Duration::from_secs(15)).await;
    assert_eq!(status, StatusCode::OK, "响应: {body}");

    let served: OrderDto = serde_json::from_str(&body).unwrap();
    assert_eq!(served.payment.transaction, order_uid);
    assert_eq!(served.items()[0].chrt_id, chrt_id);
    assert_eq!(served, order);
}

#[tokio::test]
#[ignore = "需要运行服务"]
async fn test_invalid_order_is_dropped() {
    let order_uid = unique_order_uid();
    let mut order = sample_order(&order_uid);
    order.delivery.email = "not-an-email".to_string();

    publish(&order).await;

    let (status, _) = poll_order(&order_uid, Duration::from_secs(3)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
