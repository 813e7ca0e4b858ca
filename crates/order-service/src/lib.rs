//! 订单服务
//!
//! 从 Kafka 消费订单消息，经校验、转换后以事务方式写入 PostgreSQL，
//! 并通过带缓存的 HTTP 接口按 order_uid 提供查询。
//!
//! 写路径：consumer -> validation -> converter -> store.upsert
//! 读路径：handlers -> service -> store.get_by_uid -> converter

pub mod cache;
pub mod consumer;
pub mod converter;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod test_utils;
pub mod validation;
