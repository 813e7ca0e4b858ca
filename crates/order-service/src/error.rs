//! 订单服务错误类型
//!
//! 在共享库 InfraError 基础上区分校验失败、订单不存在、存储故障、存储数据损坏和请求取消，
//! 查询接口按错误类别映射 HTTP 状态码，内部细节只写日志。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_shared::error::{InfraError, is_transient_sqlx_error};

use crate::validation::ValidationReport;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 输入不合法，丢弃不重试
    Validation,
    NotFound,
    /// 事务或连接故障，存储数据损坏也归入此类
    Storage,
    /// 请求截止时间已到，进行中的存储调用被放弃
    Cancelled,
}

/// 订单服务错误
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("订单校验失败: {0}")]
    Validation(ValidationReport),

    #[error("订单转换失败: {0}")]
    Conversion(String),

    #[error("订单不存在: {order_uid}")]
    NotFound { order_uid: String },

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 已持久化的数据无法还原（如收货信息 JSON 损坏），说明上游写入了坏数据
    #[error("存储数据损坏: order_uid={order_uid}, {reason}")]
    MalformedStoredData { order_uid: String, reason: String },

    #[error("请求已取消")]
    Cancelled,

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, OrderError>;

impl OrderError {
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        Self::NotFound {
            order_uid: order_uid.into(),
        }
    }

    pub fn malformed(order_uid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedStoredData {
            order_uid: order_uid.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Conversion(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(_) | Self::MalformedStoredData { .. } | Self::Infra(_) => {
                ErrorKind::Storage
            }
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conversion(_) => "CONVERSION_ERROR",
            Self::NotFound { .. } => "ORDER_NOT_FOUND",
            Self::Database(_) => "STORAGE_ERROR",
            Self::MalformedStoredData { .. } => "MALFORMED_STORED_DATA",
            Self::Cancelled => "CANCELLED",
            Self::Infra(e) => e.code(),
        }
    }

    /// 只有瞬时存储故障值得重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => is_transient_sqlx_error(e),
            Self::Infra(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// 对外展示的简短消息，不含 SQL 错误或存储内容
    fn public_message(&self) -> String {
        match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "存储暂不可用，请稍后重试".to_string()
            }
            Self::MalformedStoredData { order_uid, reason } => {
                tracing::error!(order_uid = %order_uid, reason = %reason, "订单存储数据损坏");
                "订单数据读取失败".to_string()
            }
            Self::Infra(e) => {
                tracing::error!(error = %e, "基础设施错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let body = format!("{}: {}", self.error_code(), self.public_message());
        (self.status_code(), body).into_response()
    }
}

impl From<ValidationReport> for OrderError {
    fn from(report: ValidationReport) -> Self {
        Self::Validation(report)
    }
}
