//! Shell 集成模块
//!
//! 负责 OSC 133 Shell Integration 标记的识别。

pub mod osc;

pub use osc::{extract_markers, parse_exit_code, Marker, MarkerScanner};
