//! # 引擎
//!
//! ## 设计思路
//!
//! 一个显式构造的 `Engine` 实例持有唯一的规则集与剪贴板监听器，
//! 作为展示层（命令行或任何 UI）调用的全部入口，避免隐式全局单例：
//! - 命令：`add_rule` / `remove_rule` / `list_rules`
//! - 生命周期：`start` / `stop`
//!
//! 规则集放在 `Arc<Mutex<_>>` 中，与监听线程共享；命令与反应周期互斥执行。

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clipboard::{
    ChangeNotifier, ClipboardBackend, ClipboardWatcher, ReactionReport, WatcherState,
};
use crate::error::AppError;
use crate::rules::{LenientApplied, Rule, RuleEngine, RuleStore, SEPARATOR};
use crate::settings::Settings;

pub struct Engine {
    rules: Arc<Mutex<RuleStore>>,
    watcher: Option<ClipboardWatcher>,
    settings: Settings,
}

impl Engine {
    /// 仅用于规则管理的引擎；需要监听剪贴板时再调用 [`Engine::with_clipboard`]
    pub fn new(store: RuleStore, settings: Settings) -> Self {
        Self {
            rules: Arc::new(Mutex::new(store)),
            watcher: None,
            settings,
        }
    }

    /// 按设置中的规则文件路径加载规则集
    pub fn open(settings: Settings) -> Self {
        let store = RuleStore::open(settings.rules_path.clone());
        Self::new(store, settings)
    }

    /// 挂载剪贴板读写与变化通知能力
    pub fn with_clipboard(
        mut self,
        backend: Box<dyn ClipboardBackend>,
        notifier: Box<dyn ChangeNotifier>,
    ) -> Self {
        self.stop();
        self.watcher = Some(ClipboardWatcher::new(
            backend,
            notifier,
            Arc::clone(&self.rules),
            self.settings.retry_delay(),
        ));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn store(&self) -> MutexGuard<'_, RuleStore> {
        match self.rules.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("规则集锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 添加规则：先校验正则，再追加并写盘
    ///
    /// 无法原样写入规则文件的规则（含换行、首尾空白、pattern 含 `->`）
    /// 以 `AppError::InvalidRule` 拒绝，规则集与文件均不变。
    pub fn add_rule(&self, pattern: &str, replacement: &str) -> Result<(), AppError> {
        let mut store = self.store();
        RuleEngine::validate(store.len(), pattern)?;
        store.append(Rule::new(pattern, replacement))?;
        log::info!("➕ 已添加规则 #{}: {} {} {}", store.len() - 1, pattern, SEPARATOR, replacement);
        Ok(())
    }

    /// 删除规则；越界时返回 `Ok(None)`
    pub fn remove_rule(&self, index: usize) -> Result<Option<Rule>, AppError> {
        let removed = self.store().remove_at(index)?;
        if let Some(rule) = &removed {
            log::info!("➖ 已删除规则 #{}: {}", index, rule);
        }
        Ok(removed)
    }

    pub fn list_rules(&self) -> Vec<Rule> {
        self.store().rules().to_vec()
    }

    /// 对任意文本试运行当前规则集，不触碰剪贴板
    pub fn preview(&self, text: &str) -> LenientApplied {
        let store = self.store();
        RuleEngine::new().apply_lenient(store.rules(), text)
    }

    pub fn start(&mut self) -> Result<(), AppError> {
        match self.watcher.as_mut() {
            Some(watcher) => watcher.start(),
            None => Err(AppError::NoClipboard),
        }
    }

    pub fn stop(&mut self) {
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.as_ref().is_some_and(ClipboardWatcher::is_running)
    }

    pub fn state(&self) -> WatcherState {
        self.watcher
            .as_ref()
            .map_or(WatcherState::Idle, ClipboardWatcher::state)
    }

    pub fn last_report(&self) -> Option<ReactionReport> {
        self.watcher.as_ref().and_then(ClipboardWatcher::last_report)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "postclip-engine-test-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn engine_in(dir: &PathBuf) -> Engine {
        Engine::open(Settings {
            rules_path: dir.join("rules.txt"),
            ..Settings::default()
        })
    }

    #[test]
    fn add_list_remove_persist_through_rule_file() {
        let dir = unique_temp_dir();
        let engine = engine_in(&dir);

        engine.add_rule("cat", "dog").expect("add cat");
        engine.add_rule(r"(\d+)", "#$1").expect("add digits");
        assert_eq!(
            engine.list_rules(),
            vec![Rule::new("cat", "dog"), Rule::new(r"(\d+)", "#$1")]
        );

        let reopened = engine_in(&dir);
        assert_eq!(reopened.list_rules(), engine.list_rules());

        assert_eq!(engine.remove_rule(0).expect("remove"), Some(Rule::new("cat", "dog")));
        assert_eq!(engine.remove_rule(5).expect("remove out of range"), None);
        assert_eq!(
            fs::read_to_string(dir.join("rules.txt")).expect("read"),
            "(\\d+) -> #$1\n"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn invalid_pattern_is_rejected_at_add_time() {
        let dir = unique_temp_dir();
        let engine = engine_in(&dir);
        engine.add_rule("a", "b").expect("add valid");

        let err = engine.add_rule("(unclosed", "x").unwrap_err();
        match err {
            AppError::Pattern(pattern) => assert_eq!(pattern.index, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.list_rules().len(), 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rejected_rules_keep_memory_and_file_in_sync() {
        let dir = unique_temp_dir();
        let engine = engine_in(&dir);
        engine.add_rule("cat", "dog").expect("add valid");
        engine.add_rule("=>", "->").expect("add arrow replacement");

        for (pattern, replacement) in [(", ", "\n"), (" x ", "y"), ("a", "b\r\nc"), ("a -> b", "c")] {
            let err = engine.add_rule(pattern, replacement).unwrap_err();
            assert!(matches!(err, AppError::InvalidRule(_)), "{pattern:?}: {err}");
        }

        assert_eq!(
            engine.list_rules(),
            vec![Rule::new("cat", "dog"), Rule::new("=>", "->")]
        );
        assert_eq!(engine_in(&dir).list_rules(), engine.list_rules());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn preview_runs_pipeline_without_clipboard() {
        let dir = unique_temp_dir();
        let engine = engine_in(&dir);
        engine.add_rule("a", "b").expect("add");
        engine.add_rule("b", "c").expect("add");

        let applied = engine.preview("a");
        assert_eq!(applied.output, "c");
        assert!(applied.changed);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn lifecycle_without_clipboard_is_an_error_but_stop_is_safe() {
        let dir = unique_temp_dir();
        let mut engine = engine_in(&dir);
        engine.stop();
        let err = engine.start().unwrap_err();
        assert!(matches!(err, AppError::NoClipboard));
        assert!(!err.is_retryable());
        assert!(!engine.is_running());
        assert_eq!(engine.state(), WatcherState::Idle);
        assert!(engine.last_report().is_none());
        let _ = fs::remove_dir_all(dir);
    }
}
