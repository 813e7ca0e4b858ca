//! 死信队列
//!
//! 重试耗尽后仍无法入库的消息连同失败原因写入死信 topic，由人工或离线任务处理，
//! 主消费循环照常提交位移继续前进。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::InfraError;
use crate::kafka::{ConsumerMessage, KafkaProducer};

/// 死信消息信封
///
/// 保留原始负载与来源位置，便于定位和重放。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 业务标识（订单 uid），负载无法解析时为 `partition:offset`
    pub message_id: String,
    pub source_topic: String,
    pub source_partition: i32,
    pub source_offset: i64,
    /// 原始负载；非 UTF-8 字节会被替换为 U+FFFD
    pub payload: String,
    pub error: String,
    /// 放弃前总共执行的次数（首次 + 重试）
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
    pub source_service: String,
}

impl DeadLetterMessage {
    pub fn from_message(
        msg: &ConsumerMessage,
        message_id: Option<&str>,
        error: impl Into<String>,
        attempts: u32,
        source_service: impl Into<String>,
    ) -> Self {
        let message_id = message_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", msg.partition, msg.offset));

        Self {
            message_id,
            source_topic: msg.topic.clone(),
            source_partition: msg.partition,
            source_offset: msg.offset,
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: error.into(),
            attempts,
            failed_at: Utc::now(),
            source_service: source_service.into(),
        }
    }
}

/// DLQ 生产者
#[derive(Clone)]
pub struct DlqProducer {
    producer: KafkaProducer,
    topic: String,
}

impl DlqProducer {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    /// 将死信信封写入 DLQ topic，以 message_id 作为消息 key
    pub async fn send(&self, dead_letter: &DeadLetterMessage) -> Result<(), InfraError> {
        self.producer
            .send_json(&self.topic, &dead_letter.message_id, dead_letter)
            .await?;

        warn!(
            message_id = %dead_letter.message_id,
            source_topic = %dead_letter.source_topic,
            source_offset = dead_letter.source_offset,
            attempts = dead_letter.attempts,
            error = %dead_letter.error,
            dlq_topic = %self.topic,
            "消息已发送到死信队列"
        );

        Ok(())
    }
}
