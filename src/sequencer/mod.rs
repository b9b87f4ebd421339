//! 命令序列器模块
//!
//! 把一批 shell 命令逐条注入远程终端，完全依据 OSC 133 标记推进队列。

pub mod batch;
pub mod config;
pub mod driver;
pub mod frame;
pub mod state;

pub use batch::StoredBatch;
pub use config::SequencerConfig;
pub use driver::{CommandSequencer, SequencerOutput};
pub use frame::encode_command;
pub use state::{
    transition, BatchOutcome, BatchStatus, Effect, Event, LifecycleEvent, Phase, SequencerState,
};
