//! 集成测试公共工具

use order_service::test_utils::test_database_config;
use order_shared::database::Database;

pub const SCHEMA: &str = include_str!("../../../../migrations/0001_create_orders.sql");

/// 连接测试数据库并确保表结构存在
pub async fn setup_database() -> Database {
    let db = Database::connect(&test_database_config())
        .await
        .expect("无法连接测试数据库，请设置 TEST_DATABASE_URL 或 DATABASE_URL");

    sqlx::raw_sql(SCHEMA)
        .execute(db.pool())
        .await
        .expect("初始化表结构失败");

    db
}
