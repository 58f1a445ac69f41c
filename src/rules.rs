//! 替换规则模块
//!
//! # 设计思路
//!
//! 规则是有序的 (pattern, replacement) 对，按插入顺序组成一条流水线：
//! 第 N 条规则作用于第 N-1 条规则的输出。
//!
//! - `engine`：把规则集应用到一段文本上（正则编译缓存 + 严格 / 宽松两种模式）
//! - `store`：规则集的内存容器与 `rules.txt` 持久化（每次变更立即写盘）
//!
//! # 文件格式
//!
//! 每行一条规则：`<pattern> -> <replacement>`，按首个 `->` 切分并去除两侧空白。
//! 不支持转义，pattern 中含 `->` 的规则重新加载后会被错误切分。

mod engine;
mod store;

pub use engine::{Applied, LenientApplied, RuleEngine};
pub use store::{RuleStore, load_rules, parse_rules, render_rules, save_rules};

use std::fmt;

use serde::{Deserialize, Serialize};

/// 规则文件中 pattern 与 replacement 之间的分隔符
pub const SEPARATOR: &str = "->";

/// 默认规则文件（相对当前工作目录）
pub const DEFAULT_RULES_FILE: &str = "rules.txt";

/// 单条替换规则
///
/// replacement 支持 `$1`、`${1}`、`${name}` 引用捕获组，`$$` 表示字面量 `$`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub replacement: String,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// 与规则文件中的行格式一致：`pattern -> replacement`
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.pattern, SEPARATOR, self.replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::Rule;

    #[test]
    fn display_matches_file_line_format() {
        assert_eq!(Rule::new("cat", "dog").to_string(), "cat -> dog");
    }
}
