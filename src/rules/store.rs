//! # 规则存储
//!
//! ## 设计思路
//!
//! `RuleStore` 是规则集的唯一内存容器，所有变更都立即整体写回规则文件（write-through）。
//! 写盘失败时回滚本次内存变更并上抛错误，保证内存与文件始终一致。
//!
//! ## 实现思路
//!
//! - 读取：文件不存在视为空规则集；无法切分的行静默丢弃（文件可能被手工编辑或部分损坏）。
//!   非法 UTF-8 字节按替换字符解码，只影响所在行。
//! - 文件存在但读取失败（权限等）时记住失败原因，之后拒绝写盘，避免空规则集覆盖用户文件。
//! - 写入：按顺序每条规则一行，`fs::write` 整体覆盖。
//!   只接受写入后能原样读回的规则：不含换行、首尾无空白、pattern 不含 `->`。
//! - 越界删除为空操作，不写盘。

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use super::{Rule, SEPARATOR};
use crate::error::AppError;

fn parse_line(line: &str) -> Option<Rule> {
    let (pattern, replacement) = line.split_once(SEPARATOR)?;
    if pattern.is_empty() || replacement.is_empty() {
        return None;
    }
    Some(Rule::new(pattern.trim(), replacement.trim()))
}

/// 解析规则文件内容，跳过格式不正确的行
pub fn parse_rules(content: &str) -> Vec<Rule> {
    content.lines().filter_map(parse_line).collect()
}

/// 渲染为规则文件内容，每条规则一行
pub fn render_rules(rules: &[Rule]) -> String {
    rules.iter().map(|rule| format!("{rule}\n")).collect()
}

/// 检查规则写入文件后能否被原样读回
pub fn check_persistable(rule: &Rule) -> Result<(), AppError> {
    for (field, value) in [("pattern", &rule.pattern), ("replacement", &rule.replacement)] {
        if value.contains(['\n', '\r']) {
            return Err(AppError::InvalidRule(format!("{field} 不能包含换行")));
        }
        if value.trim() != value.as_str() {
            return Err(AppError::InvalidRule(format!("{field} 首尾不能有空白")));
        }
    }
    if rule.pattern.contains(SEPARATOR) {
        return Err(AppError::InvalidRule(format!("pattern 不能包含 `{SEPARATOR}`")));
    }
    Ok(())
}

/// 读取规则文件；文件不存在时为空规则集，其他 I/O 错误上抛
fn read_rules(path: &Path) -> io::Result<Vec<Rule>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::debug!("📄 规则文件 {} 不存在，使用空规则集", path.display());
            return Ok(Vec::new());
        }
        Err(err) => return Err(err),
    };

    if std::str::from_utf8(&bytes).is_err() {
        log::warn!("规则文件 {} 含有非法 UTF-8 字节，已按替换字符解码", path.display());
    }
    let rules = parse_rules(&String::from_utf8_lossy(&bytes));
    log::debug!("📄 从 {} 加载了 {} 条规则", path.display(), rules.len());
    Ok(rules)
}

/// 从文件加载规则
///
/// 文件缺失或不可读时返回空规则集，不视为错误。
pub fn load_rules(path: &Path) -> Vec<Rule> {
    read_rules(path).unwrap_or_else(|err| {
        log::warn!("读取规则文件 {} 失败，使用空规则集: {}", path.display(), err);
        Vec::new()
    })
}

/// 覆盖写入规则文件
pub fn save_rules(path: &Path, rules: &[Rule]) -> Result<(), AppError> {
    fs::write(path, render_rules(rules))?;
    Ok(())
}

/// 有序规则集 + 写穿透持久化
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    rules: Vec<Rule>,
    /// 加载失败的原因；存在时拒绝写盘
    load_failure: Option<(ErrorKind, String)>,
}

impl RuleStore {
    /// 从 `path` 加载规则集（文件缺失时为空）
    ///
    /// 文件存在却无法读取时同样得到空规则集，但之后的变更会返回 `AppError::Io`。
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (rules, load_failure) = match read_rules(&path) {
            Ok(rules) => (rules, None),
            Err(err) => {
                log::warn!(
                    "读取规则文件 {} 失败，使用空规则集且禁止写盘: {}",
                    path.display(),
                    err
                );
                (Vec::new(), Some((err.kind(), err.to_string())))
            }
        };
        Self {
            path,
            rules,
            load_failure,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 加载阶段是否失败（此时规则集只读）
    pub fn is_read_only(&self) -> bool {
        self.load_failure.is_some()
    }

    fn ensure_writable(&self) -> Result<(), AppError> {
        match &self.load_failure {
            Some((kind, reason)) => Err(AppError::Io(io::Error::new(
                *kind,
                format!(
                    "规则文件 {} 加载失败，拒绝覆盖写入: {}",
                    self.path.display(),
                    reason
                ),
            ))),
            None => Ok(()),
        }
    }

    /// 追加一条规则并立即写盘
    pub fn append(&mut self, rule: Rule) -> Result<(), AppError> {
        check_persistable(&rule)?;
        self.ensure_writable()?;

        self.rules.push(rule);
        if let Err(err) = save_rules(&self.path, &self.rules) {
            self.rules.pop();
            return Err(err);
        }
        Ok(())
    }

    /// 删除指定位置的规则并立即写盘
    ///
    /// 越界时返回 `Ok(None)`，既不修改规则集也不写盘。
    pub fn remove_at(&mut self, index: usize) -> Result<Option<Rule>, AppError> {
        if index >= self.rules.len() {
            log::debug!("忽略越界的删除请求: index={}, len={}", index, self.rules.len());
            return Ok(None);
        }
        self.ensure_writable()?;

        let removed = self.rules.remove(index);
        if let Err(err) = save_rules(&self.path, &self.rules) {
            self.rules.insert(index, removed);
            return Err(err);
        }
        Ok(Some(removed))
    }
}
