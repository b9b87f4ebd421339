//! 通道输入帧
//!
//! 远程 shell 桥的终端输入帧格式为 `0:<字节长度>:<数据>`。
//! 长度是数据的 UTF-8 字节数，而不是字符数。

/// 终端输入帧标记
pub const INPUT_TAG: char = '0';

/// 编码一条命令的输入帧，命令后追加换行
pub fn encode_command(command: &str) -> String {
    let data = format!("{}\n", command);
    format!("{}:{}:{}", INPUT_TAG, data.len(), data)
}
