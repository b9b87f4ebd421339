//! 命令序列器驱动
//!
//! 把状态机产生的副作用落到实际的输出上：通道发送、终端显示、
//! 生命周期回调，以及基于 tokio 定时器的延迟派发。

use std::sync::{Arc, Mutex};

use super::config::SequencerConfig;
use super::state::{BatchStatus, Effect, Event, LifecycleEvent, Phase, SequencerState};
use crate::shell::osc::Marker;

/// 序列器输出
///
/// 发送是即发即忘的：序列器只等待后续的完成标记，不等待传输确认。
pub trait SequencerOutput: Send + Sync {
    /// 通过已建立的通道发送已编码的帧
    fn send(&self, payload: &str);
    /// 向终端显示一行提示
    fn display(&self, line: &str);
    /// 生命周期回调
    fn notify(&self, event: &LifecycleEvent);
}

/// 命令序列器
///
/// 每个终端会话持有一个实例。克隆共享同一份状态。
#[derive(Clone)]
pub struct CommandSequencer {
    state: Arc<Mutex<SequencerState>>,
    output: Arc<dyn SequencerOutput>,
    config: SequencerConfig,
}

impl CommandSequencer {
    /// 使用默认配置创建序列器
    pub fn new(output: Arc<dyn SequencerOutput>) -> Self {
        Self::with_config(output, SequencerConfig::default())
    }

    /// 使用指定配置创建序列器
    pub fn with_config(output: Arc<dyn SequencerOutput>, config: SequencerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SequencerState::new())),
            output,
            config,
        }
    }

    /// 获取配置
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// 加载命令批次，等待提示符就绪后才开始派发
    pub fn load_batch(&self, commands: Vec<String>, title: Option<String>) {
        self.handle(Event::Load { commands, title });
    }

    /// 加载存储的命令 JSON
    pub fn load_stored(&self, commands_json: &str, title: Option<String>) {
        self.handle(Event::LoadStored {
            commands_json: commands_json.to_string(),
            title,
        });
    }

    /// 处理终端输出中的原始标记文本
    pub fn on_output_marker(&self, raw: &str) {
        match Marker::parse(raw) {
            Some(marker) => self.on_marker(marker),
            None => tracing::debug!("忽略无法识别的标记: {:?}", raw),
        }
    }

    /// 处理已解析的标记
    pub fn on_marker(&self, marker: Marker) {
        self.handle(Event::Marker(marker));
    }

    /// 停止执行并清空队列
    pub fn stop(&self) {
        self.handle(Event::Stop);
    }

    /// 会话关闭时静默清空，使未触发的定时器失效
    pub fn shutdown(&self) {
        self.handle(Event::Shutdown);
    }

    /// 执行状态快照
    pub fn status(&self) -> BatchStatus {
        self.lock().status()
    }

    /// 当前阶段
    pub fn phase(&self) -> Phase {
        self.lock().phase().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SequencerState> {
        // 状态转换不会在持锁期间 panic，中毒时沿用内部状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, event: Event) {
        let effects = self.lock().apply(event, &self.config);
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&self, effect: Effect) {
        match effect {
            Effect::Display(line) => self.output.display(&line),
            Effect::Send(payload) => self.output.send(&payload),
            Effect::Notify(event) => self.output.notify(&event),
            Effect::Schedule { delay, generation } => {
                let runtime = match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("无法调度延迟派发，缺少 tokio 运行时: {}", e);
                        return;
                    }
                };
                let sequencer = self.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sequencer.handle(Event::DispatchDue { generation });
                });
            }
        }
    }
}
