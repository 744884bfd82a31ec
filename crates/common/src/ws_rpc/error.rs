/// WebSocket RPC 错误定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// RPC 错误码
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcErrorCode {
    // 通用错误
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Timeout,
    ConnectionClosed,
    ConnectionFailed,
    HandshakeFailed,
    SerializationError,

    // 服务相关错误
    ServiceNotFound,
    ServiceAlreadyExists,
    PermissionDenied,
}

impl RpcErrorCode {
    /// 转换为字符串码
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::HandshakeFailed => "HANDSHAKE_FAILED",
            Self::SerializationError => "SERIALIZATION_ERROR",

            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::ServiceAlreadyExists => "SERVICE_ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
        }
    }

    /// 从字符串码解析，未知错误码归为内部错误
    pub fn parse(code: &str) -> Self {
        match code {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "METHOD_NOT_FOUND" => Self::MethodNotFound,
            "INVALID_PARAMS" => Self::InvalidParams,
            "TIMEOUT" => Self::Timeout,
            "CONNECTION_CLOSED" => Self::ConnectionClosed,
            "CONNECTION_FAILED" => Self::ConnectionFailed,
            "HANDSHAKE_FAILED" => Self::HandshakeFailed,
            "SERIALIZATION_ERROR" => Self::SerializationError,
            "SERVICE_NOT_FOUND" => Self::ServiceNotFound,
            "SERVICE_ALREADY_EXISTS" => Self::ServiceAlreadyExists,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            _ => Self::InternalError,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RPC 错误
#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl RpcError {
    /// 创建新的 RPC 错误
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// 创建带详情的 RPC 错误
    pub fn with_details(
        code: RpcErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// 无效请求错误
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    /// 方法不存在错误
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::MethodNotFound,
            format!("方法不存在: {}", method.into()),
        )
    }

    /// 参数错误
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    /// 内部错误
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    /// 超时错误
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Timeout, message)
    }

    /// 连接关闭错误
    pub fn connection_closed() -> Self {
        Self::new(RpcErrorCode::ConnectionClosed, "连接已关闭")
    }

    /// 连接失败错误
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ConnectionFailed, message)
    }

    /// 握手失败错误
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::HandshakeFailed, message)
    }

    /// 序列化错误
    pub fn serialization_error(err: impl fmt::Display) -> Self {
        Self::new(
            RpcErrorCode::SerializationError,
            format!("序列化错误: {}", err),
        )
    }

    /// 服务不存在
    pub fn service_not_found(service_id: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::ServiceNotFound,
            format!("服务不存在: {}", service_id.into()),
        )
    }

    /// 服务已存在
    pub fn service_already_exists(service_id: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::ServiceAlreadyExists,
            format!("服务已存在: {}", service_id.into()),
        )
    }

    /// 权限不足
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::PermissionDenied, message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err)
    }
}

impl From<crate::Error> for RpcError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::InvalidArgument(msg) => Self::invalid_params(msg),
            crate::Error::NotFound(msg) => Self::service_not_found(msg),
            crate::Error::PermissionDenied(msg) => Self::permission_denied(msg),
            crate::Error::Network(msg) => Self::connection_failed(msg),
            crate::Error::Serialization(e) => Self::serialization_error(e),
            other => Self::internal_error(other.to_string()),
        }
    }
}

impl From<RpcError> for crate::Error {
    fn from(err: RpcError) -> Self {
        match err.code {
            RpcErrorCode::ServiceNotFound | RpcErrorCode::MethodNotFound => {
                crate::Error::NotFound(err.to_string())
            }
            RpcErrorCode::PermissionDenied => crate::Error::PermissionDenied(err.to_string()),
            RpcErrorCode::ConnectionClosed
            | RpcErrorCode::ConnectionFailed
            | RpcErrorCode::HandshakeFailed
            | RpcErrorCode::Timeout => crate::Error::Network(err.to_string()),
            _ => crate::Error::Internal(err.to_string()),
        }
    }
}
