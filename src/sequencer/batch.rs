//! 存储的命令批次
//!
//! 页面把待执行命令以 JSON 数组形式交给终端，标题单独传递。

use serde::{Deserialize, Serialize};

use crate::utils::error::SequencerError;

/// 命令批次
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    /// 按顺序执行的命令
    pub commands: Vec<String>,
    /// 批次标题
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl StoredBatch {
    /// 创建批次，空标题视为无标题
    pub fn new(commands: Vec<String>, title: Option<String>) -> Self {
        Self {
            commands,
            title: title.filter(|t| !t.is_empty()),
        }
    }

    /// 解析存储的命令 JSON
    ///
    /// `null` 视为空批次；其他非字符串数组的内容均为无效批次。
    pub fn from_json(commands_json: &str, title: Option<String>) -> Result<Self, SequencerError> {
        let commands: Option<Vec<String>> = serde_json::from_str(commands_json)
            .map_err(|e| SequencerError::InvalidBatch(e.to_string()))?;

        Ok(Self::new(commands.unwrap_or_default(), title))
    }

    /// 批次是否为空
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 命令数量
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}
