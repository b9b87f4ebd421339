//! FluteNAS 终端命令序列器库
//!
//! 把一批命令逐条注入远程 shell，依据 OSC 133 Shell Integration 标记判断
//! 每条命令的结束和退出码。

pub mod rpc;
pub mod sequencer;
pub mod session;
pub mod shell;
pub mod utils;
