//! 错误类型定义
//!
//! 定义命令序列器的错误类型，提供描述性错误消息。
//!
//! ## 功能
//! - 定义 SequencerError 枚举，涵盖批次、会话和请求错误
//! - 实现错误转换（From trait）
//! - 支持转换为 JSON-RPC 错误格式

use thiserror::Error;

use crate::rpc::types::JsonRpcError;

/// 序列器错误类型
#[derive(Debug, Error)]
pub enum SequencerError {
    /// 存储的命令批次无法解析
    #[error("命令批次无效: {0}")]
    InvalidBatch(String),

    /// 已有批次在执行
    #[error("已有命令批次正在执行")]
    BatchInProgress,

    /// 会话不存在
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    /// 无效的请求
    #[error("无效的请求: {0}")]
    InvalidRequest(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<SequencerError> for JsonRpcError {
    fn from(err: SequencerError) -> Self {
        // 应用特定的错误码范围 (-32000 到 -32099)
        let code = match &err {
            SequencerError::SessionNotFound(_) => -32001,
            SequencerError::BatchInProgress => -32030,
            SequencerError::InvalidBatch(_) => -32031,
            SequencerError::InvalidRequest(_) => -32602,
            SequencerError::SerializationError(_) => -32700,
        };

        JsonRpcError {
            code,
            message: err.to_string(),
            data: Some(serde_json::json!({
                "error_type": err.error_type(),
                "error_code": err.code(),
                "recoverable": err.is_recoverable(),
            })),
        }
    }
}

impl SequencerError {
    /// 获取错误码
    pub fn code(&self) -> i32 {
        match self {
            SequencerError::InvalidBatch(_) => 2001,
            SequencerError::BatchInProgress => 2002,
            SequencerError::SessionNotFound(_) => 2003,
            SequencerError::InvalidRequest(_) => 2004,
            SequencerError::SerializationError(_) => 2005,
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SequencerError::InvalidBatch(_) => "invalid_batch",
            SequencerError::BatchInProgress => "batch_in_progress",
            SequencerError::SessionNotFound(_) => "session_not_found",
            SequencerError::InvalidRequest(_) => "invalid_request",
            SequencerError::SerializationError(_) => "serialization_error",
        }
    }

    /// 检查是否为可恢复错误
    ///
    /// 批次冲突在当前批次结束或停止后可以重试。
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SequencerError::BatchInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SequencerError::SessionNotFound("test-id".to_string());
        assert_eq!(err.to_string(), "会话不存在: test-id");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SequencerError::InvalidBatch("".to_string()).code(), 2001);
        assert_eq!(SequencerError::BatchInProgress.code(), 2002);
        assert_eq!(SequencerError::SessionNotFound("".to_string()).code(), 2003);
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            SequencerError::InvalidBatch("".to_string()).error_type(),
            "invalid_batch"
        );
        assert_eq!(SequencerError::BatchInProgress.error_type(), "batch_in_progress");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(SequencerError::BatchInProgress.is_recoverable());
        assert!(!SequencerError::InvalidBatch("".to_string()).is_recoverable());
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: SequencerError = serde_err.into();
        assert_eq!(err.error_type(), "serialization_error");
    }

    #[test]
    fn test_sequencer_error_to_json_rpc_error() {
        let err = SequencerError::SessionNotFound("test-id".to_string());
        let rpc_err: JsonRpcError = err.into();
        assert_eq!(rpc_err.code, -32001);
        assert!(rpc_err.message.contains("test-id"));

        let err = SequencerError::InvalidRequest("bad params".to_string());
        let rpc_err: JsonRpcError = err.into();
        assert_eq!(rpc_err.code, -32602);

        let rpc_err: JsonRpcError = SequencerError::BatchInProgress.into();
        assert_eq!(rpc_err.code, -32030);
        let data = rpc_err.data.unwrap();
        assert_eq!(data["error_type"], "batch_in_progress");
        assert_eq!(data["error_code"], 2002);
        assert_eq!(data["recoverable"], true);
    }
}
