//! OSC 133 序列处理
//!
//! 从远程终端输出流中识别 Shell Integration 标记，驱动命令序列器。
//!
//! ## OSC 序列格式
//!
//! OSC (Operating System Command) 序列的格式为:
//! - `ESC ] Ps ; Pt BEL` 或 `ESC ] Ps ; Pt ST`
//! - ESC = 0x1B, BEL = 0x07, ST = ESC \
//!
//! ## 支持的标记
//!
//! - `133;A`: 提示符开始
//! - `133;B`: 命令输入开始（序列器不使用）
//! - `133;C`: 命令输出开始
//! - `133;D;<exit>`: 命令结束，携带退出码

/// BEL 字符 (终止符)
const BEL: char = '\x07';
/// OSC 起始序列
const OSC_START: &str = "\x1b]";
/// ST 终止序列 (ESC \)
const ST: &str = "\x1b\\";
/// OSC 133 载荷前缀
const SHELL_INTEGRATION: &str = "133;";
/// 命令结束序列前缀，后面紧跟退出码
const COMMAND_END_PREFIX: &str = "\x1b]133;D;";

/// 未完成序列的默认缓冲上限（字节）
const DEFAULT_MAX_PENDING: usize = 4096;

/// Shell Integration 标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// A: 提示符开始
    PromptStart,
    /// B: 命令输入开始
    CommandStart,
    /// C: 命令输出开始
    OutputStart,
    /// D: 命令结束
    CommandEnd { exit_code: i32 },
}

impl Marker {
    /// 从原始标记文本解析
    ///
    /// 输出层按子串约定投递标记：包含 `133;A` 即为提示符开始，以此类推。
    /// 无法识别时返回 `None`。
    ///
    /// # 示例
    ///
    /// ```
    /// use flute_terminal::shell::osc::Marker;
    ///
    /// let marker = Marker::parse("\x1b]133;D;2\x07");
    /// assert_eq!(marker, Some(Marker::CommandEnd { exit_code: 2 }));
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.contains("133;A") {
            Some(Self::PromptStart)
        } else if raw.contains("133;D") {
            Some(Self::CommandEnd {
                exit_code: parse_exit_code(raw),
            })
        } else if raw.contains("133;C") {
            Some(Self::OutputStart)
        } else if raw.contains("133;B") {
            Some(Self::CommandStart)
        } else {
            None
        }
    }

    /// 标记字母
    pub fn letter(&self) -> char {
        match self {
            Self::PromptStart => 'A',
            Self::CommandStart => 'B',
            Self::OutputStart => 'C',
            Self::CommandEnd { .. } => 'D',
        }
    }

    /// 生成 BEL 结尾的完整序列
    pub fn to_sequence(&self) -> String {
        match self {
            Self::CommandEnd { exit_code } => format!("\x1b]133;D;{}\x07", exit_code),
            other => format!("\x1b]133;{}\x07", other.letter()),
        }
    }
}

/// 提取命令结束序列中的退出码
///
/// 期望格式为 `ESC ] 133 ; D ; <数字> BEL`（也接受 ST 结尾）。
/// 找不到可解析的退出码时视为成功 (0)，损坏的标记不能卡住队列。
/// 数字超出 `i32` 范围时饱和为 `i32::MAX`，仍按失败处理。
pub fn parse_exit_code(raw: &str) -> i32 {
    for (pos, _) in raw.match_indices(COMMAND_END_PREFIX) {
        let rest = &raw[pos + COMMAND_END_PREFIX.len()..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            continue;
        }

        let tail = &rest[digits..];
        if !(tail.starts_with(BEL) || tail.starts_with(ST)) {
            continue;
        }

        return match rest[..digits].parse::<i32>() {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("退出码超出范围，按 i32::MAX 处理: {}", e);
                i32::MAX
            }
        };
    }

    0
}

/// 从一段完整输出中提取所有 OSC 133 标记
pub fn extract_markers(data: &str) -> Vec<Marker> {
    let mut scanner = MarkerScanner::new();
    scanner
        .feed(data)
        .iter()
        .filter_map(|raw| Marker::parse(raw))
        .collect()
}

/// 标记扫描器
///
/// 终端输出按块到达，序列可能被切断在两块之间。
/// 扫描器缓存未终止的尾部，与下一块拼接后继续识别。
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    /// 上一块遗留的未完成序列
    pending: String,
    /// 遗留缓冲上限
    max_pending: usize,
}

impl MarkerScanner {
    /// 创建新的扫描器
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// 设置遗留缓冲上限
    pub fn with_max_pending(mut self, size: usize) -> Self {
        self.max_pending = size;
        self
    }

    /// 当前遗留的字节数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 输入一块输出，返回其中完整的 OSC 133 原始序列
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let data = if self.pending.is_empty() {
            chunk.to_string()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.push_str(chunk);
            joined
        };

        let mut found = Vec::new();
        let mut search_start = 0;

        while let Some(osc_start) = data[search_start..].find(OSC_START) {
            let absolute_start = search_start + osc_start;
            let content_start = absolute_start + OSC_START.len();
            let remaining = &data[content_start..];

            let bel_pos = remaining.find(BEL);
            let st_pos = remaining.find(ST);

            // 选择最近的终止符
            let (end_offset, terminator_len) = match (bel_pos, st_pos) {
                (Some(b), Some(s)) if b <= s => (b, 1),
                (Some(_), Some(s)) => (s, ST.len()),
                (Some(b), None) => (b, 1),
                (None, Some(s)) => (s, ST.len()),
                (None, None) => {
                    self.keep_pending(&data[absolute_start..]);
                    return found;
                }
            };

            let content = &remaining[..end_offset];

            // 未终止的序列后面又开始了新序列，从新序列重新扫描
            if let Some(inner) = content.find(OSC_START) {
                search_start = content_start + inner;
                continue;
            }

            let absolute_end = content_start + end_offset + terminator_len;
            if content.starts_with(SHELL_INTEGRATION) {
                found.push(data[absolute_start..absolute_end].to_string());
            }

            search_start = absolute_end;
        }

        // 块尾单独的 ESC 可能是下一个序列的开头
        if data.ends_with('\x1b') {
            self.keep_pending("\x1b");
        }

        found
    }

    /// 丢弃遗留数据
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn keep_pending(&mut self, tail: &str) {
        if tail.len() > self.max_pending {
            tracing::warn!(
                "未终止的 OSC 序列超过缓冲上限，已丢弃: {} > {}",
                tail.len(),
                self.max_pending
            );
            return;
        }
        self.pending = tail.to_string();
    }
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt_start() {
        assert_eq!(Marker::parse("\x1b]133;A\x07"), Some(Marker::PromptStart));
    }

    #[test]
    fn test_parse_command_start_and_output_start() {
        assert_eq!(Marker::parse("\x1b]133;B\x07"), Some(Marker::CommandStart));
        assert_eq!(Marker::parse("\x1b]133;C\x07"), Some(Marker::OutputStart));
    }

    #[test]
    fn test_parse_command_end_with_exit_code() {
        assert_eq!(
            Marker::parse("\x1b]133;D;127\x07"),
            Some(Marker::CommandEnd { exit_code: 127 })
        );
    }

    #[test]
    fn test_parse_command_end_st_terminator() {
        assert_eq!(
            Marker::parse("\x1b]133;D;1\x1b\\"),
            Some(Marker::CommandEnd { exit_code: 1 })
        );
    }

    #[test]
    fn test_parse_command_end_without_code_defaults_to_success() {
        assert_eq!(
            Marker::parse("\x1b]133;D\x07"),
            Some(Marker::CommandEnd { exit_code: 0 })
        );
        // 缺少终止符
        assert_eq!(
            Marker::parse("\x1b]133;D;5"),
            Some(Marker::CommandEnd { exit_code: 0 })
        );
        // 非数字
        assert_eq!(
            Marker::parse("\x1b]133;D;abc\x07"),
            Some(Marker::CommandEnd { exit_code: 0 })
        );
    }

    #[test]
    fn test_parse_exit_code_overflow_is_failure() {
        assert_eq!(parse_exit_code("\x1b]133;D;99999999999\x07"), i32::MAX);
        assert_eq!(
            Marker::parse("\x1b]133;D;4294967296\x1b\\"),
            Some(Marker::CommandEnd { exit_code: i32::MAX })
        );
    }

    #[test]
    fn test_parse_exit_code_skips_malformed_occurrence() {
        assert_eq!(parse_exit_code("\x1b]133;D;x\x07\x1b]133;D;3\x07"), 3);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Marker::parse("\x1b]7;file:///home\x07"), None);
        assert_eq!(Marker::parse(""), None);
    }

    #[test]
    fn test_to_sequence() {
        assert_eq!(Marker::PromptStart.to_sequence(), "\x1b]133;A\x07");
        assert_eq!(
            Marker::CommandEnd { exit_code: 2 }.to_sequence(),
            "\x1b]133;D;2\x07"
        );
    }

    #[test]
    fn test_extract_markers_from_output() {
        let output = "\x1b]133;A\x07$ ls\r\n\x1b]133;C\x07file.txt\r\n\x1b]133;D;0\x07";
        assert_eq!(
            extract_markers(output),
            vec![
                Marker::PromptStart,
                Marker::OutputStart,
                Marker::CommandEnd { exit_code: 0 }
            ]
        );
    }

    #[test]
    fn test_scanner_ignores_other_osc() {
        let mut scanner = MarkerScanner::new();
        let found = scanner.feed("\x1b]0;title\x07\x1b]7;file:///tmp\x07\x1b]133;A\x07");
        assert_eq!(found, vec!["\x1b]133;A\x07".to_string()]);
    }

    #[test]
    fn test_scanner_joins_split_sequence() {
        let mut scanner = MarkerScanner::new();
        assert!(scanner.feed("output\x1b]133;D;").is_empty());
        assert!(scanner.pending_len() > 0);

        let found = scanner.feed("1\x07$ ");
        assert_eq!(found, vec!["\x1b]133;D;1\x07".to_string()]);
        assert_eq!(scanner.pending_len(), 0);
    }

    #[test]
    fn test_scanner_joins_split_escape() {
        let mut scanner = MarkerScanner::new();
        assert!(scanner.feed("text\x1b").is_empty());
        let found = scanner.feed("]133;A\x07");
        assert_eq!(found, vec!["\x1b]133;A\x07".to_string()]);
    }

    #[test]
    fn test_scanner_split_st_terminator() {
        let mut scanner = MarkerScanner::new();
        assert!(scanner.feed("\x1b]133;D;4\x1b").is_empty());
        let found = scanner.feed("\\");
        assert_eq!(found, vec!["\x1b]133;D;4\x1b\\".to_string()]);
    }

    #[test]
    fn test_scanner_restarts_after_unterminated_sequence() {
        let mut scanner = MarkerScanner::new();
        let found = scanner.feed("\x1b]2;broken \x1b]133;A\x07");
        assert_eq!(found, vec!["\x1b]133;A\x07".to_string()]);
    }

    #[test]
    fn test_scanner_pending_limit() {
        let mut scanner = MarkerScanner::new().with_max_pending(8);
        assert!(scanner.feed("\x1b]133;D;0000000000000").is_empty());
        assert_eq!(scanner.pending_len(), 0);
    }

    #[test]
    fn test_scanner_reset() {
        let mut scanner = MarkerScanner::new();
        scanner.feed("\x1b]133;");
        scanner.reset();
        assert_eq!(scanner.pending_len(), 0);
    }
}
