//! 统一基础设施错误
//!
//! 数据库、Kafka、配置等基础设施层共享的错误类型，业务服务在此基础上定义自己的错误枚举。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Kafka 错误: {0}")]
    Kafka(String),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, InfraError>;

impl InfraError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => is_transient_sqlx_error(e),
            Self::Kafka(_) => true,
            _ => false,
        }
    }
}

/// 判断 sqlx 错误是否为瞬时故障
///
/// 连接池超时、IO 错误、连接被关闭属于瞬时故障；约束冲突、类型错误等重试也不会成功。
pub fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            // 40001 serialization_failure / 40P01 deadlock_detected / 08xxx connection_exception
            db_err
                .code()
                .is_some_and(|code| code == "40001" || code == "40P01" || code.starts_with("08"))
        }
        _ => false,
    }
}
