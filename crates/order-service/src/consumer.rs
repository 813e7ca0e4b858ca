//! 订单消息消费者
//!
//! 每条消息依次经过：反序列化 -> 校验 -> 转换 -> 事务写入。
//! - 无法解析或校验失败的消息记录完整原因后丢弃，不重试。
//! - 写入失败时按重试策略退避重试（仅限瞬时故障），仍失败则投递死信队列。
//! - 无论结果如何，处理结束后才提交位移。

use std::sync::Arc;

use async_trait::async_trait;
use order_shared::config::KafkaConfig;
use order_shared::dlq::{DeadLetterMessage, DlqProducer};
use order_shared::error::InfraError;
use order_shared::kafka::{ConsumerMessage, KafkaConsumer};
use order_shared::observability::metrics;
use order_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::dto::OrderDto;
use crate::error::OrderError;
use crate::service::OrderService;
use crate::validation::{ValidationReport, validate};

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Persisted,
    /// 校验失败，附带全部违规字段
    Rejected(ValidationReport),
    /// 负载不是合法的订单 JSON
    Undecodable(String),
    /// 重试后仍未写入
    Failed(String),
}

impl IngestOutcome {
    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::Rejected(_) => "rejected",
            Self::Undecodable(_) => "undecodable",
            Self::Failed(_) => "failed",
        }
    }
}

/// 死信出口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, dead_letter: &DeadLetterMessage) -> Result<(), InfraError>;
}

#[async_trait]
impl DeadLetterSink for DlqProducer {
    async fn publish(&self, dead_letter: &DeadLetterMessage) -> Result<(), InfraError> {
        self.send(dead_letter).await
    }
}

/// 消息处理器
///
/// 与 Kafka 连接解耦，测试时直接传入构造好的 `ConsumerMessage`。
pub struct IngestHandler {
    service: OrderService,
    policy: RetryPolicy,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    source_service: String,
}

impl IngestHandler {
    pub fn new(service: OrderService, policy: RetryPolicy, source_service: impl Into<String>) -> Self {
        Self {
            service,
            policy,
            dead_letters: None,
            source_service: source_service.into(),
        }
    }

    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// 处理单条消息，不返回错误：所有结果都体现在 `IngestOutcome` 中
    pub async fn handle(&self, msg: &ConsumerMessage) -> IngestOutcome {
        let outcome = self.process(msg).await;
        metrics::record_order_ingest(outcome.label());
        outcome
    }

    async fn process(&self, msg: &ConsumerMessage) -> IngestOutcome {
        let dto: OrderDto = match msg.deserialize_payload() {
            Ok(dto) => dto,
            Err(e) => {
                warn!(
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "订单消息无法解析，已丢弃"
                );
                return IngestOutcome::Undecodable(e.to_string());
            }
        };

        if let Err(report) = validate(&dto) {
            warn!(
                order_uid = %dto.order_uid,
                partition = msg.partition,
                offset = msg.offset,
                violations = %report,
                "订单校验失败，已丢弃"
            );
            return IngestOutcome::Rejected(report);
        }

        let mut attempts: u32 = 0;
        let result = retry_with_policy(
            &self.policy,
            "order_upsert",
            OrderError::is_retryable,
            || {
                attempts += 1;
                self.service.persist(&dto)
            },
        )
        .await;

        match result {
            Ok(()) => IngestOutcome::Persisted,
            Err(e) => {
                error!(
                    order_uid = %dto.order_uid,
                    partition = msg.partition,
                    offset = msg.offset,
                    attempts,
                    error = %e,
                    "订单写入失败"
                );
                self.dead_letter(msg, &dto.order_uid, &e, attempts).await;
                IngestOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dead_letter(&self, msg: &ConsumerMessage, order_uid: &str, err: &OrderError, attempts: u32) {
        let Some(sink) = &self.dead_letters else {
            warn!(order_uid, "未配置死信队列，订单已丢失");
            return;
        };

        let dead_letter = DeadLetterMessage::from_message(
            msg,
            Some(order_uid),
            err.to_string(),
            attempts,
            self.source_service.as_str(),
        );

        if let Err(e) = sink.publish(&dead_letter).await {
            error!(order_uid, error = %e, "发送死信失败，订单已丢失");
        }
    }
}

/// 订单消费者
pub struct OrderConsumer {
    consumer: KafkaConsumer,
    topic: String,
    handler: IngestHandler,
}

impl OrderConsumer {
    pub fn new(config: &KafkaConfig, handler: IngestHandler) -> Result<Self, InfraError> {
        let consumer = KafkaConsumer::new(config, None)?;
        Ok(Self {
            consumer,
            topic: config.orders_topic.clone(),
            handler,
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    ///
    /// 关闭信号只在两条消息之间生效，正在处理的消息会完成并提交位移。
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), InfraError> {
        let Self {
            consumer,
            topic,
            handler,
        } = self;

        consumer.subscribe(&[topic.as_str()])?;
        info!(topic = %topic, "订单消费者已启动");

        consumer
            .start(shutdown, |msg| {
                let handler = &handler;
                async move {
                    handler.handle(&msg).await;
                    Ok(())
                }
            })
            .await;

        info!("订单消费者已停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::cache::OrderCache;
    use crate::converter::to_entity;
    use crate::repository::{MockOrderStorage, OrderStorage};
    use crate::store::OrderStore;
    use crate::test_utils::{MemoryOrderStorage, sample_order};

    fn message(payload: &[u8]) -> ConsumerMessage {
        ConsumerMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset: 7,
            key: None,
            payload: payload.to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        }
    }

    fn order_message(order: &OrderDto) -> ConsumerMessage {
        message(&serde_json::to_vec(order).unwrap())
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        }
    }

    fn handler_with(storage: impl OrderStorage + 'static, policy: RetryPolicy) -> IngestHandler {
        let store = OrderStore::new(Arc::new(storage), OrderCache::new(100, None));
        IngestHandler::new(OrderService::new(Arc::new(store)), policy, "order-service")
    }

    #[tokio::test]
    async fn test_valid_message_is_persisted() {
        let storage = MemoryOrderStorage::new();
        let handler = handler_with(storage.clone(), fast_policy(0));

        let outcome = handler.handle(&order_message(&sample_order("o1"))).await;

        assert_eq!(outcome, IngestOutcome::Persisted);
        assert_eq!(storage.order_count(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dropped() {
        let storage = MemoryOrderStorage::new();
        let mut sink = MockDeadLetterSink::new();
        sink.expect_publish().times(0);
        let handler = handler_with(storage.clone(), fast_policy(3)).with_dead_letters(Arc::new(sink));

        let outcome = handler.handle(&message(b"{not json")).await;

        assert!(matches!(outcome, IngestOutcome::Undecodable(_)));
        assert_eq!(outcome.label(), "undecodable");
        assert_eq!(storage.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_order_is_rejected_without_write() {
        let storage = MemoryOrderStorage::new();
        let handler = handler_with(storage.clone(), fast_policy(3));

        let mut order = sample_order("o1");
        order.items.as_mut().unwrap()[0].sale = 150;
        order.delivery.email.clear();

        match handler.handle(&order_message(&order)).await {
            IngestOutcome::Rejected(report) => {
                assert!(report.has_field("items[0].sale"));
                assert!(report.has_field("delivery.email"));
            }
            other => panic!("期望 Rejected，实际为 {other:?}"),
        }
        assert_eq!(storage.upsert_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers_after_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut mock = MockOrderStorage::new();
        let counter = Arc::clone(&calls);
        mock.expect_upsert().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(OrderError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(())
            }
        });

        let handler = handler_with(mock, fast_policy(3));
        let outcome = handler.handle(&order_message(&sample_order("o1"))).await;

        assert_eq!(outcome, IngestOutcome::Persisted);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_go_to_dead_letter() {
        let storage = MemoryOrderStorage::new();
        storage.set_unavailable(true);

        let mut sink = MockDeadLetterSink::new();
        sink.expect_publish()
            .withf(|dl| dl.message_id == "o1" && dl.attempts == 3 && dl.source_offset == 7)
            .times(1)
            .returning(|_| Ok(()));

        let handler = handler_with(storage.clone(), fast_policy(2)).with_dead_letters(Arc::new(sink));
        let outcome = handler.handle(&order_message(&sample_order("o1"))).await;

        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(storage.upsert_calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let mut mock = MockOrderStorage::new();
        mock.expect_upsert()
            .times(1)
            .returning(|_| Err(OrderError::Database(sqlx::Error::RowNotFound)));

        let mut sink = MockDeadLetterSink::new();
        sink.expect_publish()
            .withf(|dl| dl.attempts == 1 && dl.source_service == "order-service")
            .times(1)
            .returning(|_| Ok(()));

        let handler = handler_with(mock, fast_policy(5)).with_dead_letters(Arc::new(sink));
        let outcome = handler.handle(&order_message(&sample_order("o1"))).await;

        assert!(matches!(outcome, IngestOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately_without_sink() {
        let storage = MemoryOrderStorage::new();
        storage.set_unavailable(true);
        let handler = handler_with(storage.clone(), RetryPolicy::none());

        let outcome = handler.handle(&order_message(&sample_order("o1"))).await;

        assert_eq!(outcome.label(), "failed");
        assert_eq!(storage.upsert_calls(), 1);
    }

    #[tokio::test]
    async fn test_redelivered_message_is_idempotent() {
        let storage = MemoryOrderStorage::new();
        let handler = handler_with(storage.clone(), fast_policy(0));
        let msg = order_message(&sample_order("o1"));

        assert_eq!(handler.handle(&msg).await, IngestOutcome::Persisted);
        assert_eq!(handler.handle(&msg).await, IngestOutcome::Persisted);

        let loaded = storage.load("o1").await.unwrap();
        assert_eq!(loaded, to_entity(&sample_order("o1")).unwrap());
        assert_eq!(storage.order_count(), 1);
    }
}
