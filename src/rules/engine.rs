//! # 规则引擎
//!
//! ## 设计思路
//!
//! 规则按存储顺序依次执行，每条规则的 `replace_all` 作用于上一条规则的结果。
//! `changed` 表示「至少执行了一条规则」，而不是「文本确实发生了变化」；
//! 是否回写剪贴板由调用方再做一次文本相等比较来决定，两道检查都保留。
//!
//! ## 实现思路
//!
//! - 正则按 pattern 字符串缓存在引擎实例中，每次调用前裁剪掉已不在规则集里的条目。
//! - `apply`：严格模式，遇到无效正则立即返回 `PatternError`。
//! - `apply_lenient`：宽松模式，跳过无效规则继续执行后续规则，并收集错误供上层报告。

use std::collections::HashMap;

use regex::Regex;

use super::Rule;
use crate::error::PatternError;

/// 严格模式的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub output: String,
    pub changed: bool,
}

/// 宽松模式的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LenientApplied {
    pub output: String,
    /// 至少有一条规则被成功执行
    pub changed: bool,
    /// 被跳过的规则
    pub errors: Vec<PatternError>,
}

#[derive(Debug, Default)]
pub struct RuleEngine {
    cache: HashMap<String, Regex>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预先编译一条 pattern，用于添加规则时的即时校验
    pub fn validate(index: usize, pattern: &str) -> Result<(), PatternError> {
        Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| PatternError::new(index, pattern, &e))
    }

    /// 按顺序执行全部规则；任一 pattern 无效则整体失败
    pub fn apply(&mut self, rules: &[Rule], input: &str) -> Result<Applied, PatternError> {
        self.prune(rules);

        if rules.is_empty() {
            return Ok(Applied {
                output: input.to_string(),
                changed: false,
            });
        }

        let mut text = input.to_string();
        for (index, rule) in rules.iter().enumerate() {
            let regex = self.compiled(index, &rule.pattern)?;
            text = regex
                .replace_all(&text, rule.replacement.as_str())
                .into_owned();
        }

        Ok(Applied {
            output: text,
            changed: true,
        })
    }

    /// 按顺序执行规则，跳过无法编译的规则
    pub fn apply_lenient(&mut self, rules: &[Rule], input: &str) -> LenientApplied {
        self.prune(rules);

        let mut text = input.to_string();
        let mut changed = false;
        let mut errors = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            match self.compiled(index, &rule.pattern) {
                Ok(regex) => {
                    text = regex
                        .replace_all(&text, rule.replacement.as_str())
                        .into_owned();
                    changed = true;
                }
                Err(err) => {
                    log::warn!("⚠️ 跳过无效规则: {}", err);
                    errors.push(err);
                }
            }
        }

        LenientApplied {
            output: text,
            changed,
            errors,
        }
    }

    fn compiled(&mut self, index: usize, pattern: &str) -> Result<&Regex, PatternError> {
        if !self.cache.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|e| PatternError::new(index, pattern, &e))?;
            self.cache.insert(pattern.to_string(), regex);
        }
        Ok(&self.cache[pattern])
    }

    fn prune(&mut self, rules: &[Rule]) {
        self.cache
            .retain(|pattern, _| rules.iter().any(|rule| &rule.pattern == pattern));
    }

    #[cfg(test)]
    fn cached_patterns(&self) -> usize {
        self.cache.len()
    }
}
