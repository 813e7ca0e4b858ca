//! 订单消息生成工具
//!
//! 生成逼真的订单消息并发送到 Kafka 或输出到标准输出，
//! 可按比例混入非法订单以覆盖消费者的丢弃路径。

pub mod cli;
pub mod generator;
