//! RPC 数据类型定义
//!
//! 定义 JSON-RPC 请求、响应和通知的数据结构。

use serde::{Deserialize, Serialize};

// ============ RPC 请求类型 ============

/// 创建会话响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// 只携带会话 ID 的请求（关闭、停止、查询状态）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// 加载命令批次请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBatchRequest {
    pub session_id: String,
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// 加载存储的命令批次请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStoredRequest {
    pub session_id: String,
    /// 页面存储中的命令 JSON 原文
    pub commands_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// 终端输出请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRequest {
    pub session_id: String,
    /// Base64 编码的输出数据
    pub data: String,
}

/// 终端输出响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputResponse {
    /// 本块中识别出的标记数量
    pub markers: usize,
}

/// 原始标记请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerRequest {
    pub session_id: String,
    /// 输出层解析出的原始标记文本
    pub marker: String,
}

// ============ JSON-RPC 2.0 协议类型 ============

/// JSON-RPC 请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

/// JSON-RPC 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

impl JsonRpcResponse {
    /// 创建成功响应
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// 创建错误响应
    pub fn error(id: serde_json::Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 错误
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// 解析错误 (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// 无效请求 (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// 方法不存在 (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method.into()),
            data: None,
        }
    }

    /// 无效参数 (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

/// JSON-RPC 通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// 创建新通知
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Some(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_batch_request_title_optional() {
        let request: LoadBatchRequest = serde_json::from_value(serde_json::json!({
            "session_id": "s1",
            "commands": ["echo a", "echo b"]
        }))
        .unwrap();
        assert_eq!(request.commands.len(), 2);
        assert!(request.title.is_none());
    }

    #[test]
    fn test_load_stored_request_deserialization() {
        let request: LoadStoredRequest = serde_json::from_value(serde_json::json!({
            "session_id": "s1",
            "commands_json": "[\"ls\"]",
            "title": "List"
        }))
        .unwrap();
        assert_eq!(request.commands_json, "[\"ls\"]");
        assert_eq!(request.title.as_deref(), Some("List"));
    }

    #[test]
    fn test_json_rpc_request_deserialization() {
        let json = r#"{"jsonrpc":"2.0","method":"batch.status","params":{"session_id":"abc"},"id":1}"#;
        let request: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, "batch.status");
        assert!(request.params.is_some());
        assert_eq!(request.id, serde_json::json!(1));
    }

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(
            serde_json::json!(1),
            serde_json::json!({"session_id": "abc123"}),
        );
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response = JsonRpcResponse::error(
            serde_json::json!(1),
            JsonRpcError::method_not_found("unknown.method"),
        );
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("-32601"));
        assert!(!json.contains("\"result\""));
    }

    #[test]
    fn test_json_rpc_notification() {
        let notification = JsonRpcNotification::new(
            "terminal.write",
            serde_json::json!({"session_id": "abc", "line": "hello"}),
        );
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("\"method\":\"terminal.write\""));
    }
}
