//! 进程内端到端测试
//!
//! 消息处理器 -> 订单存储（内存实现）-> HTTP 查询，不依赖 Kafka 与数据库。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use order_service::cache::OrderCache;
use order_service::consumer::{IngestHandler, IngestOutcome};
use order_service::dto::OrderDto;
use order_service::routes::create_router;
use order_service::service::OrderService;
use order_service::state::AppState;
use order_service::store::OrderStore;
use order_service::test_utils::{MemoryOrderStorage, sample_item, sample_order};
use order_shared::kafka::ConsumerMessage;
use order_shared::retry::RetryPolicy;
use tower::ServiceExt;

struct Pipeline {
    handler: IngestHandler,
    app: axum::Router,
    storage: MemoryOrderStorage,
}

fn pipeline() -> Pipeline {
    let storage = MemoryOrderStorage::new();
    let store = OrderStore::new(Arc::new(storage.clone()), OrderCache::new(1_000, None));
    let service = OrderService::new(Arc::new(store));

    Pipeline {
        handler: IngestHandler::new(service.clone(), RetryPolicy::none(), "order-service"),
        app: create_router(AppState::new(service, None, Duration::from_secs(5))),
        storage,
    }
}

fn message(offset: i64, order: &OrderDto) -> ConsumerMessage {
    ConsumerMessage {
        topic: "orders".to_string(),
        partition: 0,
        offset,
        key: Some(order.order_uid.clone()),
        payload: serde_json::to_vec(order).unwrap(),
        timestamp: None,
        headers: HashMap::new(),
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn order_o1() -> OrderDto {
    let mut order = sample_order("o1");
    order.payment.amount = 100;

    let mut item = sample_item(7);
    item.total_price = 50;
    item.nm_id = 1;
    order.items = Some(vec![item]);
    order
}

#[tokio::test]
async fn test_ingested_order_is_served_over_http() {
    let p = pipeline();

    let outcome = p.handler.handle(&message(0, &order_o1())).await;
    assert_eq!(outcome, IngestOutcome::Persisted);

    let (status, body) = get(&p.app, "/order/o1").await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["payment"]["transaction"], "o1");
    assert_eq!(body["payment"]["amount"], 100);
    assert_eq!(body["items"][0]["chrt_id"], 7);

    let served: OrderDto = serde_json::from_value(body).unwrap();
    assert_eq!(served, order_o1());
}

#[tokio::test]
async fn test_rejected_order_is_never_served() {
    let p = pipeline();

    let mut order = order_o1();
    order.items.as_mut().unwrap()[0].sale = 150;

    let outcome = p.handler.handle(&message(0, &order)).await;
    assert!(matches!(outcome, IngestOutcome::Rejected(ref r) if r.has_field("items[0].sale")));
    assert_eq!(p.storage.upsert_calls(), 0);

    let (status, body) = get(&p.app, "/order/o1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.starts_with("ORDER_NOT_FOUND"));
}

#[tokio::test]
async fn test_order_with_empty_items_is_persisted_and_served() {
    let p = pipeline();

    let mut order = order_o1();
    order.items = Some(Vec::new());

    assert_eq!(p.handler.handle(&message(0, &order)).await, IngestOutcome::Persisted);

    let (status, body) = get(&p.app, "/order/o1").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["items"], serde_json::json!([]));
}

#[tokio::test]
async fn test_order_without_items_field_is_rejected() {
    let p = pipeline();

    let mut order = order_o1();
    order.items = None;

    let outcome = p.handler.handle(&message(0, &order)).await;
    assert!(matches!(outcome, IngestOutcome::Rejected(ref r) if r.has_field("items")));
    assert_eq!(p.storage.upsert_calls(), 0);
}

#[tokio::test]
async fn test_garbage_payload_does_not_stop_later_messages() {
    let p = pipeline();

    let garbage = ConsumerMessage {
        payload: b"\x00\x01garbage".to_vec(),
        ..message(0, &order_o1())
    };
    assert!(matches!(p.handler.handle(&garbage).await, IngestOutcome::Undecodable(_)));
    assert_eq!(p.handler.handle(&message(1, &order_o1())).await, IngestOutcome::Persisted);

    let (status, _) = get(&p.app, "/order/o1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cached_order_is_stale_after_reingest() {
    let p = pipeline();
    p.handler.handle(&message(0, &order_o1())).await;

    let (_, first) = get(&p.app, "/order/o1").await;
    assert!(first.contains("\"track_number\": \"WBILMTESTTRACK\""));

    let mut updated = order_o1();
    updated.track_number = "UPDATED".to_string();
    assert_eq!(p.handler.handle(&message(1, &updated)).await, IngestOutcome::Persisted);

    // 写入不会失效缓存，读到的仍是首次查询时的值
    let (_, second) = get(&p.app, "/order/o1").await;
    assert_eq!(second, first);
    assert_eq!(p.storage.load_calls(), 1);
}

#[tokio::test]
async fn test_orders_sharing_an_item_see_last_write() {
    let p = pipeline();

    let mut first = order_o1();
    first.items.as_mut().unwrap()[0].name = "first".to_string();
    let mut second = sample_order("o2");
    let mut shared = sample_item(7);
    shared.name = "second".to_string();
    second.items = Some(vec![shared]);

    p.handler.handle(&message(0, &first)).await;
    p.handler.handle(&message(1, &second)).await;

    let (_, body) = get(&p.app, "/order/o1").await;
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["items"][0]["name"], "second");
}
