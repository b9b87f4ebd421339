//! RPC 方法注册和调用
//!
//! 实现 JSON-RPC 方法的注册和分发。

use serde::de::DeserializeOwned;

use super::server::NotificationSender;
use super::types::{
    CreateSessionResponse, JsonRpcError, JsonRpcResponse, LoadBatchRequest, LoadStoredRequest,
    MarkerRequest, OutputRequest, OutputResponse, SessionRequest,
};
use crate::session::SessionManager;
use crate::utils::error::SequencerError;

/// RPC 方法处理器
pub struct RpcMethods {
    session_manager: SessionManager,
}

impl RpcMethods {
    /// 创建带通知发送器的方法处理器
    pub fn with_notification_sender(notification_sender: NotificationSender) -> Self {
        Self {
            session_manager: SessionManager::new(notification_sender),
        }
    }

    /// 关闭所有会话
    pub fn shutdown(&mut self) {
        self.session_manager.close_all();
    }

    /// 调用指定方法
    pub fn call(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> JsonRpcResponse {
        let result = match method {
            "session.create" => self.session_create(),
            "session.close" => self.session_close(params),
            "session.list" => self.session_list(),
            "batch.load" => self.batch_load(params),
            "batch.load_stored" => self.batch_load_stored(params),
            "batch.stop" => self.batch_stop(params),
            "batch.status" => self.batch_status(params),
            "terminal.output" => self.terminal_output(params),
            "terminal.marker" => self.terminal_marker(params),
            _ => return JsonRpcResponse::error(id, JsonRpcError::method_not_found(method)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, e),
        }
    }

    /// 创建会话
    fn session_create(&mut self) -> Result<serde_json::Value, JsonRpcError> {
        let session_id = self.session_manager.create_session();
        to_value(CreateSessionResponse { session_id })
    }

    /// 关闭会话
    fn session_close(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: SessionRequest = parse_params(params)?;
        self.session_manager.close_session(&request.session_id)?;
        Ok(serde_json::Value::Null)
    }

    /// 列出会话
    fn session_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        to_value(self.session_manager.list_sessions())
    }

    /// 加载命令批次
    fn batch_load(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: LoadBatchRequest = parse_params(params)?;
        self.session_manager
            .load_batch(&request.session_id, request.commands, request.title)?;
        Ok(serde_json::Value::Null)
    }

    /// 加载存储的命令批次
    fn batch_load_stored(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: LoadStoredRequest = parse_params(params)?;
        self.session_manager.load_stored(
            &request.session_id,
            &request.commands_json,
            request.title,
        )?;
        Ok(serde_json::Value::Null)
    }

    /// 停止批次
    fn batch_stop(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: SessionRequest = parse_params(params)?;
        self.session_manager.stop(&request.session_id)?;
        Ok(serde_json::Value::Null)
    }

    /// 查询批次状态
    fn batch_status(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: SessionRequest = parse_params(params)?;
        to_value(self.session_manager.status(&request.session_id)?)
    }

    /// 输入终端输出
    fn terminal_output(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: OutputRequest = parse_params(params)?;
        let markers = self
            .session_manager
            .feed_output(&request.session_id, &request.data)?;
        to_value(OutputResponse { markers })
    }

    /// 输入原始标记
    fn terminal_marker(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: MarkerRequest = parse_params(params)?;
        self.session_manager
            .feed_marker(&request.session_id, &request.marker)?;
        Ok(serde_json::Value::Null)
    }
}

fn parse_params<T: DeserializeOwned>(
    params: Option<serde_json::Value>,
) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("缺少参数"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("参数解析错误: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| SequencerError::from(e).into())
}
