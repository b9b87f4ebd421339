//! RPC 服务器实现
//!
//! 通过 stdin/stdout 实现 JSON-RPC 2.0 通信。

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use super::methods::RpcMethods;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sequencer::state::LifecycleEvent;

type SendResult = Result<(), mpsc::error::SendError<JsonRpcNotification>>;

/// 通知发送器，可以克隆并在多个地方使用
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<JsonRpcNotification>,
}

impl NotificationSender {
    /// 创建新的通知发送器
    pub fn new(tx: mpsc::UnboundedSender<JsonRpcNotification>) -> Self {
        Self { tx }
    }

    /// 发送通知
    pub fn send(&self, notification: JsonRpcNotification) -> SendResult {
        self.tx.send(notification)
    }

    /// 发送需要写入远程 shell 通道的帧
    pub fn send_channel(&self, session_id: &str, payload: &str) -> SendResult {
        self.send(JsonRpcNotification::new(
            "channel.send",
            serde_json::json!({
                "session_id": session_id,
                "payload": payload
            }),
        ))
    }

    /// 发送终端显示行
    pub fn send_display(&self, session_id: &str, line: &str) -> SendResult {
        self.send(JsonRpcNotification::new(
            "terminal.write",
            serde_json::json!({
                "session_id": session_id,
                "line": line
            }),
        ))
    }

    /// 发送命令生命周期通知
    pub fn send_lifecycle(&self, session_id: &str, event: &LifecycleEvent) -> SendResult {
        let mut params = serde_json::json!({ "session_id": session_id });
        let method = match event {
            LifecycleEvent::CommandStarted { command } => {
                params["command"] = serde_json::json!(command);
                "command.started"
            }
            LifecycleEvent::CommandCompleted { command, exit_code } => {
                params["command"] = serde_json::json!(command);
                params["exit_code"] = serde_json::json!(exit_code);
                "command.completed"
            }
            LifecycleEvent::CommandFailed { command, exit_code } => {
                params["command"] = serde_json::json!(command);
                params["exit_code"] = serde_json::json!(exit_code);
                "command.failed"
            }
            LifecycleEvent::AllCompleted => "batch.completed",
            LifecycleEvent::AllCompletedAndExit { should_close } => {
                params["should_close"] = serde_json::json!(should_close);
                "batch.completed_exit"
            }
            LifecycleEvent::Error { message } => {
                params["message"] = serde_json::json!(message);
                "batch.error"
            }
        };
        self.send(JsonRpcNotification::new(method, params))
    }
}

/// RPC 服务器
pub struct RpcServer {
    methods: Arc<Mutex<RpcMethods>>,
    notification_rx: Arc<Mutex<mpsc::UnboundedReceiver<JsonRpcNotification>>>,
    notification_sender: NotificationSender,
}

impl RpcServer {
    /// 创建新的 RPC 服务器
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let notification_sender = NotificationSender { tx };

        let methods = RpcMethods::with_notification_sender(notification_sender.clone());

        Self {
            methods: Arc::new(Mutex::new(methods)),
            notification_rx: Arc::new(Mutex::new(rx)),
            notification_sender,
        }
    }

    /// 获取通知发送器
    pub fn notification_sender(&self) -> NotificationSender {
        self.notification_sender.clone()
    }

    /// 运行 RPC 服务器
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
        let mut reader = BufReader::new(stdin);

        let mut line = String::new();

        // 启动通知发送任务
        let notification_rx = self.notification_rx.clone();
        let stdout_for_notifications = stdout.clone();
        let notification_task = tokio::spawn(async move {
            let mut rx = notification_rx.lock().await;
            while let Some(notification) = rx.recv().await {
                let mut stdout = stdout_for_notifications.lock().await;
                if let Ok(json) = serde_json::to_string(&notification) {
                    let _ = stdout.write_all(json.as_bytes()).await;
                    let _ = stdout.write_all(b"\n").await;
                    let _ = stdout.flush().await;
                }
            }
        });

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                tracing::info!("stdin 关闭，退出");
                break;
            }

            let line_trimmed = line.trim();
            if line_trimmed.is_empty() {
                continue;
            }

            let response = self.handle_request(line_trimmed).await;

            let response_json = serde_json::to_string(&response)?;
            let mut stdout = stdout.lock().await;
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        // 关闭所有会话，使未触发的定时派发失效
        self.methods.lock().await.shutdown();
        notification_task.abort();

        Ok(())
    }

    /// 处理单个请求
    pub async fn handle_request(&self, line: &str) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                return JsonRpcResponse::error(
                    serde_json::Value::Null,
                    super::types::JsonRpcError::parse_error(format!("JSON 解析错误: {}", e)),
                );
            }
        };

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                request.id,
                super::types::JsonRpcError::invalid_request("无效的 JSON-RPC 版本"),
            );
        }

        let mut methods = self.methods.lock().await;
        methods.call(&request.method, request.params, request.id)
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}
