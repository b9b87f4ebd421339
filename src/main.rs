//! FluteNAS 终端命令序列器 CLI 入口点
//!
//! 该程序作为独立进程运行，通过 stdin/stdout 与页面进行 JSON-RPC 通信。
//! 主要功能：
//! - 按终端会话管理命令序列器
//! - 解析终端输出中的 OSC 133 标记并推进命令队列
//! - 通过通知输出待发送的通道帧和命令生命周期事件

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flute_terminal::rpc::RpcServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统，输出到 stderr 避免干扰 JSON-RPC 通信
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    tracing::info!("FluteNAS 终端命令序列器启动");

    let server = RpcServer::new();
    server.run().await?;

    Ok(())
}
