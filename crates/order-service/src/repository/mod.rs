//! 订单仓储层
//!
//! - `OrderStorage` 定义订单聚合的读写接口，服务层依赖 trait 以便 mock 测试
//! - `OrderRepository` 是基于 PostgreSQL 的实现，写入在单个事务内完成

mod order_repo;
mod traits;

pub use order_repo::OrderRepository;
pub use traits::*;
