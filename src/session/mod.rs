//! 会话管理模块
//!
//! 按终端会话管理命令序列器。

pub mod manager;
pub mod notifier;

pub use manager::{SequencerSession, SessionManager};
pub use notifier::SessionNotifier;
