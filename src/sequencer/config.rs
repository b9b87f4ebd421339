//! 序列器配置

use std::time::Duration;

/// 命令成功后等待 shell 稳定的延迟
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);
/// 错过提示符时，由输出开始标记触发的兜底延迟
pub const FALLBACK_DELAY: Duration = Duration::from_millis(500);

/// 序列器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// 命令成功后派发下一条命令前的延迟
    pub settle_delay: Duration,
    /// 输出开始标记触发派发前的延迟
    pub fallback_delay: Duration,
    /// 批次全部成功后是否发出可关闭窗口的信号
    pub exit_on_complete: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            fallback_delay: FALLBACK_DELAY,
            exit_on_complete: true,
        }
    }
}

impl SequencerConfig {
    /// 设置稳定延迟
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// 设置兜底延迟
    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// 设置完成后是否发出关闭信号
    pub fn with_exit_on_complete(mut self, enabled: bool) -> Self {
        self.exit_on_complete = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SequencerConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.fallback_delay, Duration::from_millis(500));
        assert!(config.exit_on_complete);
    }

    #[test]
    fn test_builders() {
        let config = SequencerConfig::default()
            .with_settle_delay(Duration::from_millis(10))
            .with_fallback_delay(Duration::from_millis(20))
            .with_exit_on_complete(false);
        assert_eq!(config.settle_delay, Duration::from_millis(10));
        assert_eq!(config.fallback_delay, Duration::from_millis(20));
        assert!(!config.exit_on_complete);
    }
}
