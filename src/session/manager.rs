//! 会话管理器
//!
//! 每个终端会话持有一个命令序列器和一个标记扫描器，会话关闭时一并丢弃。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::rpc::server::NotificationSender;
use crate::sequencer::config::SequencerConfig;
use crate::sequencer::driver::{CommandSequencer, SequencerOutput};
use crate::sequencer::state::BatchStatus;
use crate::shell::osc::MarkerScanner;
use crate::utils::error::SequencerError;

use super::notifier::SessionNotifier;

/// 终端会话
pub struct SequencerSession {
    /// 会话 ID
    pub id: String,
    /// 创建时间（Unix 秒）
    pub created_at: u64,
    sequencer: CommandSequencer,
    scanner: MarkerScanner,
}

impl SequencerSession {
    /// 创建会话
    pub fn new(id: String, output: Arc<dyn SequencerOutput>, config: SequencerConfig) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            id,
            created_at,
            sequencer: CommandSequencer::with_config(output, config),
            scanner: MarkerScanner::new(),
        }
    }

    /// 获取序列器
    pub fn sequencer(&self) -> &CommandSequencer {
        &self.sequencer
    }

    /// 输入一块终端输出，把其中的标记交给序列器，返回标记数量
    pub fn feed_output(&mut self, text: &str) -> usize {
        let markers = self.scanner.feed(text);
        for raw in &markers {
            self.sequencer.on_output_marker(raw);
        }
        markers.len()
    }
}

/// 会话管理器
pub struct SessionManager {
    /// 会话映射表
    sessions: HashMap<String, SequencerSession>,
    /// 通知发送器
    notification_sender: NotificationSender,
    /// 新会话使用的序列器配置
    config: SequencerConfig,
}

impl SessionManager {
    /// 创建会话管理器
    pub fn new(notification_sender: NotificationSender) -> Self {
        Self::with_config(notification_sender, SequencerConfig::default())
    }

    /// 创建带配置的会话管理器
    pub fn with_config(notification_sender: NotificationSender, config: SequencerConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            notification_sender,
            config,
        }
    }

    /// 创建新会话
    pub fn create_session(&mut self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let output = Arc::new(SessionNotifier::new(
            session_id.clone(),
            self.notification_sender.clone(),
        ));
        let session = SequencerSession::new(session_id.clone(), output, self.config.clone());
        self.sessions.insert(session_id.clone(), session);

        tracing::info!("创建会话: {}", session_id);
        session_id
    }

    /// 关闭会话
    pub fn close_session(&mut self, session_id: &str) -> Result<(), SequencerError> {
        let session = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SequencerError::SessionNotFound(session_id.to_string()))?;

        session.sequencer.shutdown();

        tracing::info!("关闭会话: {}", session_id);
        Ok(())
    }

    /// 关闭所有会话
    pub fn close_all(&mut self) {
        for (session_id, session) in self.sessions.drain() {
            session.sequencer.shutdown();
            tracing::debug!("关闭会话: {}", session_id);
        }
    }

    /// 加载命令批次
    pub fn load_batch(
        &self,
        session_id: &str,
        commands: Vec<String>,
        title: Option<String>,
    ) -> Result<(), SequencerError> {
        self.get(session_id)?.sequencer.load_batch(commands, title);
        Ok(())
    }

    /// 加载存储的命令 JSON
    pub fn load_stored(
        &self,
        session_id: &str,
        commands_json: &str,
        title: Option<String>,
    ) -> Result<(), SequencerError> {
        self.get(session_id)?
            .sequencer
            .load_stored(commands_json, title);
        Ok(())
    }

    /// 停止会话中的批次
    pub fn stop(&self, session_id: &str) -> Result<(), SequencerError> {
        self.get(session_id)?.sequencer.stop();
        Ok(())
    }

    /// 查询执行状态
    pub fn status(&self, session_id: &str) -> Result<BatchStatus, SequencerError> {
        Ok(self.get(session_id)?.sequencer.status())
    }

    /// 输入 Base64 编码的终端输出
    pub fn feed_output(&mut self, session_id: &str, data: &str) -> Result<usize, SequencerError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SequencerError::SessionNotFound(session_id.to_string()))?;

        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
            .map_err(|e| SequencerError::InvalidRequest(format!("Invalid base64 data: {}", e)))?;
        let text = String::from_utf8_lossy(&decoded);

        let count = session.feed_output(&text);
        tracing::trace!("会话 {} 输出 {} bytes，标记 {} 个", session_id, decoded.len(), count);
        Ok(count)
    }

    /// 输入一个原始标记
    pub fn feed_marker(&self, session_id: &str, raw: &str) -> Result<(), SequencerError> {
        self.get(session_id)?.sequencer.on_output_marker(raw);
        Ok(())
    }

    /// 列出所有会话 ID
    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// 获取会话引用
    pub fn get_session(&self, session_id: &str) -> Option<&SequencerSession> {
        self.sessions.get(session_id)
    }

    /// 获取会话数量
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn get(&self, session_id: &str) -> Result<&SequencerSession, SequencerError> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| SequencerError::SessionNotFound(session_id.to_string()))
    }
}
