//! 命令序列器状态机
//!
//! 纯状态转换：`(SequencerState, Event) -> (SequencerState, Vec<Effect>)`。
//! 发送、显示、回调和定时器都以 [`Effect`] 的形式返回，由驱动器执行，
//! 因此状态机可以脱离真实通道和终端单独测试。
//!
//! ## 状态转换规则
//! - Idle + 加载批次 -> AwaitingPrompt（不立即派发）
//! - AwaitingPrompt + A -> 派发队首命令 -> Dispatched
//! - Dispatched + D(0) -> 队列非空则定时派发 (Ready)，否则批次完成
//! - Dispatched + D(非0) -> 丢弃剩余队列 -> BatchDone(Failed)
//! - 非等待、无在途命令时 C -> 兜底定时派发
//! - 任何状态 + 停止 -> Idle

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::batch::StoredBatch;
use super::config::SequencerConfig;
use super::frame::encode_command;
use crate::shell::osc::Marker;
use crate::utils::error::SequencerError;

/// 批次结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 全部命令成功
    Completed,
    /// 某条命令返回非零退出码
    Failed { command: String, exit_code: i32 },
}

/// 序列器阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// 空闲
    Idle,
    /// 批次已加载，等待提示符就绪
    AwaitingPrompt,
    /// 可以派发，等待定时派发触发
    Ready,
    /// 有命令在执行
    Dispatched,
    /// 批次结束
    BatchDone(BatchOutcome),
}

/// 执行状态快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatus {
    /// 是否有命令在执行
    pub executing: bool,
    /// 队列中剩余命令数
    pub remaining: usize,
    /// 当前批次命令总数（批次成功完成后归零）
    pub total: usize,
}

/// 命令生命周期事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// 命令已派发
    CommandStarted { command: String },
    /// 批次最后一条命令成功
    CommandCompleted { command: String, exit_code: i32 },
    /// 命令失败，批次终止
    CommandFailed { command: String, exit_code: i32 },
    /// 批次全部完成
    AllCompleted,
    /// 批次全部完成，调用方可以关闭终端窗口
    AllCompletedAndExit { should_close: bool },
    /// 批次无法开始
    Error { message: String },
}

/// 状态机输入事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 加载命令批次
    Load {
        commands: Vec<String>,
        title: Option<String>,
    },
    /// 加载存储的命令 JSON
    LoadStored {
        commands_json: String,
        title: Option<String>,
    },
    /// 终端输出中观察到的标记
    Marker(Marker),
    /// 定时派发触发
    DispatchDue { generation: u64 },
    /// 停止执行
    Stop,
    /// 会话关闭，静默清空
    Shutdown,
}

/// 状态转换产生的副作用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// 向终端显示一行
    Display(String),
    /// 通过通道发送已编码的帧
    Send(String),
    /// 生命周期回调
    Notify(LifecycleEvent),
    /// 延迟后以给定代数触发 [`Event::DispatchDue`]
    Schedule { delay: Duration, generation: u64 },
}

/// 终端提示文本
mod banner {
    pub fn title(title: &str) -> Vec<String> {
        vec![
            format!("\x1b[1;34m{}\x1b[0m", title),
            "=".repeat(title.chars().count()),
            String::new(),
        ]
    }

    pub const AUTO_EXECUTING: &str = "\x1b[1;33mAuto-executing installation commands:\x1b[0m";
    pub const WAITING: &str = "Waiting for terminal ready signal...";
    pub const PARSE_ERROR: &str = "\x1b[1;31mError parsing installation commands.\x1b[0m";
    pub const FINISHED: &str = "\x1b[1;32mFinished executing installation commands.\x1b[0m";
    pub const CONTINUE: &str =
        "\x1b[1;36mYou can now continue with manual commands if needed.\x1b[0m";
    pub const STOPPED: &str = "\x1b[1;33mCommand execution stopped.\x1b[0m";

    pub fn executing(command: &str) -> String {
        format!("\x1b[1;37mExecuting:\x1b[0m {}", command)
    }

    pub fn failed(exit_code: i32) -> String {
        format!(
            "\x1b[1;31mCommand failed with exit status: {}. Stopping further execution.\x1b[0m",
            exit_code
        )
    }
}

/// 序列器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerState {
    phase: Phase,
    queue: VecDeque<String>,
    awaiting_prompt: bool,
    in_flight: bool,
    last_dispatched: Option<String>,
    total_in_batch: usize,
    /// 定时派发代数，加载、派发和停止时递增，使旧定时器失效
    generation: u64,
}

impl SequencerState {
    /// 创建空闲状态
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            queue: VecDeque::new(),
            awaiting_prompt: false,
            in_flight: false,
            last_dispatched: None,
            total_in_batch: 0,
            generation: 0,
        }
    }

    /// 当前阶段
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// 状态快照
    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            executing: self.in_flight,
            remaining: self.queue.len(),
            total: self.total_in_batch,
        }
    }

    /// 当前定时派发代数
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 最近派发的命令
    pub fn last_dispatched(&self) -> Option<&str> {
        self.last_dispatched.as_deref()
    }

    /// 是否在等待提示符
    pub fn is_awaiting_prompt(&self) -> bool {
        self.awaiting_prompt
    }

    /// 是否还有未完成的批次
    pub fn is_busy(&self) -> bool {
        self.in_flight || !self.queue.is_empty()
    }

    /// 应用一个事件，返回需要执行的副作用
    pub fn apply(&mut self, event: Event, config: &SequencerConfig) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            Event::Load { commands, title } => {
                self.begin_batch(StoredBatch::new(commands, title), false, &mut effects);
            }
            Event::LoadStored {
                commands_json,
                title,
            } => match StoredBatch::from_json(&commands_json, title) {
                Ok(batch) => self.begin_batch(batch, true, &mut effects),
                Err(e) => {
                    tracing::error!("解析存储的命令失败: {}", e);
                    effects.push(Effect::Display(banner::PARSE_ERROR.to_string()));
                    effects.push(Effect::Notify(LifecycleEvent::Error {
                        message: e.to_string(),
                    }));
                }
            },
            Event::Marker(marker) => self.on_marker(marker, config, &mut effects),
            Event::DispatchDue { generation } => {
                if generation == self.generation {
                    self.dispatch_next(&mut effects);
                } else {
                    tracing::debug!(
                        "忽略过期的定时派发: {} != {}",
                        generation,
                        self.generation
                    );
                }
            }
            Event::Stop => {
                self.clear();
                tracing::info!("命令执行已停止");
                effects.push(Effect::Display(banner::STOPPED.to_string()));
            }
            Event::Shutdown => {
                self.clear();
                tracing::debug!("序列器已关闭");
            }
        }

        effects
    }

    fn begin_batch(&mut self, batch: StoredBatch, stored: bool, effects: &mut Vec<Effect>) {
        if batch.is_empty() {
            return;
        }

        if self.is_busy() {
            let err = SequencerError::BatchInProgress;
            tracing::warn!("拒绝加载新批次: {}", err);
            effects.push(Effect::Notify(LifecycleEvent::Error {
                message: err.to_string(),
            }));
            return;
        }

        if let Some(title) = &batch.title {
            effects.extend(banner::title(title).into_iter().map(Effect::Display));
        }
        if stored {
            effects.push(Effect::Display(banner::AUTO_EXECUTING.to_string()));
        }

        self.generation += 1;
        self.total_in_batch = batch.len();
        self.queue = batch.commands.into();
        self.awaiting_prompt = true;
        self.in_flight = false;
        self.last_dispatched = None;
        self.phase = Phase::AwaitingPrompt;

        tracing::info!("加载命令批次: {} 条命令", self.total_in_batch);
        effects.push(Effect::Display(banner::WAITING.to_string()));
    }

    fn on_marker(&mut self, marker: Marker, config: &SequencerConfig, effects: &mut Vec<Effect>) {
        match marker {
            Marker::PromptStart => {
                if !self.awaiting_prompt {
                    return;
                }
                tracing::debug!("终端提示符就绪");
                self.awaiting_prompt = false;
                if !self.dispatch_next(effects) {
                    self.phase = Phase::Idle;
                }
            }
            Marker::CommandStart => {}
            Marker::OutputStart => {
                if self.awaiting_prompt || self.in_flight {
                    return;
                }
                if !self.queue.is_empty() {
                    self.phase = Phase::Ready;
                    effects.push(Effect::Schedule {
                        delay: config.fallback_delay,
                        generation: self.generation,
                    });
                }
            }
            Marker::CommandEnd { exit_code } => {
                if self.awaiting_prompt || !self.in_flight {
                    tracing::debug!("忽略无在途命令的结束标记: exit={}", exit_code);
                    return;
                }
                self.in_flight = false;

                if exit_code != 0 {
                    self.fail(exit_code, effects);
                } else if !self.queue.is_empty() {
                    self.phase = Phase::Ready;
                    effects.push(Effect::Schedule {
                        delay: config.settle_delay,
                        generation: self.generation,
                    });
                } else {
                    if let Some(command) = &self.last_dispatched {
                        effects.push(Effect::Notify(LifecycleEvent::CommandCompleted {
                            command: command.clone(),
                            exit_code,
                        }));
                    }
                    self.check_batch_done(config, effects);
                }
            }
        }
    }

    /// 派发队首命令，返回是否派发
    fn dispatch_next(&mut self, effects: &mut Vec<Effect>) -> bool {
        if self.awaiting_prompt || self.in_flight {
            return false;
        }
        let Some(command) = self.queue.pop_front() else {
            return false;
        };

        tracing::info!("派发命令: {}", command);
        effects.push(Effect::Display(banner::executing(&command)));
        effects.push(Effect::Notify(LifecycleEvent::CommandStarted {
            command: command.clone(),
        }));
        effects.push(Effect::Send(encode_command(&command)));

        self.last_dispatched = Some(command);
        self.in_flight = true;
        self.generation += 1;
        self.phase = Phase::Dispatched;
        true
    }

    fn fail(&mut self, exit_code: i32, effects: &mut Vec<Effect>) {
        let dropped = self.queue.len();
        self.queue.clear();
        let command = self.last_dispatched.clone().unwrap_or_default();

        tracing::warn!(
            "命令失败: {} (exit={})，丢弃剩余 {} 条命令",
            command,
            exit_code,
            dropped
        );
        effects.push(Effect::Display(banner::failed(exit_code)));
        effects.push(Effect::Notify(LifecycleEvent::CommandFailed {
            command: command.clone(),
            exit_code,
        }));
        self.phase = Phase::BatchDone(BatchOutcome::Failed { command, exit_code });
    }

    fn check_batch_done(&mut self, config: &SequencerConfig, effects: &mut Vec<Effect>) {
        if self.total_in_batch == 0 || self.is_busy() {
            return;
        }

        tracing::info!("命令批次全部完成: {} 条命令", self.total_in_batch);
        effects.push(Effect::Display(banner::FINISHED.to_string()));
        effects.push(Effect::Display(banner::CONTINUE.to_string()));
        effects.push(Effect::Notify(LifecycleEvent::AllCompleted));
        if config.exit_on_complete {
            effects.push(Effect::Notify(LifecycleEvent::AllCompletedAndExit {
                should_close: true,
            }));
        }

        self.total_in_batch = 0;
        self.phase = Phase::BatchDone(BatchOutcome::Completed);
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.in_flight = false;
        self.awaiting_prompt = false;
        self.total_in_batch = 0;
        self.generation += 1;
        self.phase = Phase::Idle;
    }
}

impl Default for SequencerState {
    fn default() -> Self {
        Self::new()
    }
}

/// 纯转换函数
pub fn transition(
    mut state: SequencerState,
    event: Event,
    config: &SequencerConfig,
) -> (SequencerState, Vec<Effect>) {
    let effects = state.apply(event, config);
    (state, effects)
}


/// Property-based tests for the sequencer state machine
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// 运行一个批次：每条命令派发后返回对应退出码，定时派发立即触发
    fn run_batch(commands: &[String], exit_codes: &[i32]) -> (Vec<String>, Vec<LifecycleEvent>) {
        let config = SequencerConfig::default();
        let mut state = SequencerState::new();
        let mut dispatched = Vec::new();
        let mut events = Vec::new();

        let mut pending = state.apply(
            Event::Load {
                commands: commands.to_vec(),
                title: None,
            },
            &config,
        );
        pending.extend(state.apply(Event::Marker(Marker::PromptStart), &config));

        let mut codes = exit_codes.iter();
        loop {
            let mut next = Vec::new();
            let mut sent_now = false;
            for effect in pending.drain(..) {
                match effect {
                    Effect::Send(payload) => {
                        dispatched.push(payload);
                        sent_now = true;
                    }
                    Effect::Notify(event) => events.push(event),
                    Effect::Schedule { generation, .. } => {
                        next.extend(state.apply(Event::DispatchDue { generation }, &config));
                    }
                    Effect::Display(_) => {}
                }
            }
            if sent_now {
                let code = codes.next().copied().unwrap_or(0);
                next.extend(state.apply(
                    Event::Marker(Marker::CommandEnd { exit_code: code }),
                    &config,
                ));
            }
            if next.is_empty() {
                break;
            }
            pending = next;
        }

        (dispatched, events)
    }

    fn commands_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,8}( -[a-z])?", 1..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 全部成功时按顺序各派发一次，且只有一次全部完成事件
        #[test]
        fn prop_all_success_dispatches_in_order(commands in commands_strategy()) {
            let (dispatched, events) = run_batch(&commands, &[]);

            let expected: Vec<String> = commands.iter().map(|c| encode_command(c)).collect();
            prop_assert_eq!(dispatched, expected);
            prop_assert_eq!(
                events.iter().filter(|e| **e == LifecycleEvent::AllCompleted).count(),
                1
            );
            let failed = events
                .iter()
                .any(|e| matches!(e, LifecycleEvent::CommandFailed { .. }));
            prop_assert!(!failed, "全部成功时不应出现失败事件");
        }

        /// 第 k 条失败时只派发前 k 条，且只有一次失败回调、没有完成事件
        #[test]
        fn prop_failure_stops_batch(
            commands in commands_strategy(),
            fail_index in 0usize..8,
            exit_code in 1i32..256,
        ) {
            let k = fail_index % commands.len();
            let mut codes = vec![0; k];
            codes.push(exit_code);

            let (dispatched, events) = run_batch(&commands, &codes);

            let expected: Vec<String> = commands[..=k].iter().map(|c| encode_command(c)).collect();
            prop_assert_eq!(dispatched, expected);

            let failures: Vec<&LifecycleEvent> = events
                .iter()
                .filter(|e| matches!(e, LifecycleEvent::CommandFailed { .. }))
                .collect();
            prop_assert_eq!(failures.len(), 1);
            prop_assert_eq!(
                failures[0],
                &LifecycleEvent::CommandFailed { command: commands[k].clone(), exit_code }
            );
            let completed = events.iter().any(|e| {
                matches!(
                    e,
                    LifecycleEvent::AllCompleted | LifecycleEvent::AllCompletedAndExit { .. }
                )
            });
            prop_assert!(!completed, "失败后不应出现完成事件");
        }
    }
}
