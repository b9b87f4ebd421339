//! 会话通知输出
//!
//! 把序列器的输出转发为带会话 ID 的 JSON-RPC 通知。

use crate::rpc::server::NotificationSender;
use crate::sequencer::driver::SequencerOutput;
use crate::sequencer::state::LifecycleEvent;

/// 会话通知器
pub struct SessionNotifier {
    session_id: String,
    sender: NotificationSender,
}

impl SessionNotifier {
    /// 创建会话通知器
    pub fn new(session_id: impl Into<String>, sender: NotificationSender) -> Self {
        Self {
            session_id: session_id.into(),
            sender,
        }
    }
}

impl SequencerOutput for SessionNotifier {
    fn send(&self, payload: &str) {
        if let Err(e) = self.sender.send_channel(&self.session_id, payload) {
            tracing::error!("发送通道帧失败: {}", e);
        }
    }

    fn display(&self, line: &str) {
        if let Err(e) = self.sender.send_display(&self.session_id, line) {
            tracing::error!("发送终端显示通知失败: {}", e);
        }
    }

    fn notify(&self, event: &LifecycleEvent) {
        if let Err(e) = self.sender.send_lifecycle(&self.session_id, event) {
            tracing::error!("发送生命周期通知失败: {}", e);
        }
    }
}
