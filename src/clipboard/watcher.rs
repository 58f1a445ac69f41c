//! # 剪贴板监听器
//!
//! ## 设计思路
//!
//! 两态状态机：`Idle`（无待处理反应）与 `Reacting`（正在处理一次变化）。
//! 一次反应周期：读取剪贴板文本 → 应用规则 → 结果与原文不同则回写。
//!
//! 回写本身会再触发一次剪贴板变化通知。这里不依赖规则的幂等性，
//! 而是由 `SelfWriteGuard` 记住刚写入的文本：下一次通知读到的内容与之相同即跳过。
//! 因此即便是 `.* -> X$0` 这类每次都会改变文本的规则，一次外部复制也只产生一次回写。
//! 守卫按内容匹配而不是「忽略下一次事件」，丢失的自触发通知不会吞掉之后的外部变化。
//!
//! ## 实现思路
//!
//! - 反应逻辑放在 `Arc<Mutex<Reactor>>` 中，读-比较-写整体是一个临界区。
//! - `Reacting` 状态由 `ReactingGuard`（RAII）维护，周期结束或提前返回时自动回到 `Idle`；
//!   若通知在反应期间重入（同线程同步投递），直接丢弃而不是死锁。
//! - 剪贴板读写失败重试一次，仍失败则丢弃本次通知；任何错误都不会注销监听。
//! - 整个进程同一时刻只允许一个监听器处于运行状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{ChangeNotifier, ClipboardBackend, SubscriptionHandle};
use crate::error::{AppError, PatternError};
use crate::rules::{RuleEngine, RuleStore};

/// 进程级标志：是否已有监听器在运行
static WATCHER_ACTIVE: AtomicBool = AtomicBool::new(false);

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("监听器状态锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Reacting,
}

/// 一次反应周期的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// 剪贴板已被改写
    Rewritten,
    /// 规则未改变文本（或规则集为空）
    Unchanged,
    /// 剪贴板中没有纯文本
    NoText,
    /// 本次通知来自监听器自己的回写
    SelfWrite,
    /// 剪贴板访问失败，放弃本次通知
    Dropped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionReport {
    pub reaction: Reaction,
    /// 本周期被跳过的无效规则
    pub pattern_errors: Vec<PatternError>,
}

impl ReactionReport {
    fn new(reaction: Reaction) -> Self {
        Self {
            reaction,
            pattern_errors: Vec::new(),
        }
    }
}

/// 记录监听器最近一次写入的文本，用于识别自触发通知
#[derive(Debug, Default)]
struct SelfWriteGuard {
    expected: Option<String>,
}

impl SelfWriteGuard {
    fn arm(&mut self, written: String) {
        self.expected = Some(written);
    }

    fn disarm(&mut self) {
        self.expected = None;
    }

    /// 当前文本是自己写入的则消费守卫并返回 `true`；否则同样清除守卫
    fn consume(&mut self, text: &str) -> bool {
        self.expected.take().is_some_and(|expected| expected == text)
    }
}

/// `Reacting` 状态的 RAII 守卫
struct ReactingGuard<'a>(&'a AtomicBool);

impl<'a> ReactingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ReactingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 失败且可重试时等待 `delay` 后再试一次
fn retry_once<T>(
    delay: Duration,
    what: &str,
    mut op: impl FnMut() -> Result<T, AppError>,
) -> Result<T, AppError> {
    match op() {
        Err(err) if err.is_retryable() => {
            log::debug!("🔁 {}失败，{}ms 后重试: {}", what, delay.as_millis(), err);
            thread::sleep(delay);
            op()
        }
        other => other,
    }
}

struct Reactor {
    backend: Box<dyn ClipboardBackend>,
    rules: Arc<Mutex<RuleStore>>,
    engine: RuleEngine,
    guard: SelfWriteGuard,
    retry_delay: Duration,
    last_report: Option<ReactionReport>,
}

impl Reactor {
    fn react(&mut self) -> ReactionReport {
        let report = self.cycle();
        match &report.reaction {
            Reaction::Rewritten => log::info!("✏️ 剪贴板文本已按规则改写"),
            Reaction::Dropped(reason) => log::warn!("⏭️ 放弃本次剪贴板通知: {}", reason),
            other => log::debug!("📋 剪贴板变化处理完成: {:?}", other),
        }
        self.last_report = Some(report.clone());
        report
    }

    fn cycle(&mut self) -> ReactionReport {
        let retry_delay = self.retry_delay;
        let backend = &mut self.backend;
        let text = match retry_once(retry_delay, "读取剪贴板", || backend.read_text()) {
            Ok(Some(text)) => text,
            Ok(None) => return ReactionReport::new(Reaction::NoText),
            Err(err) => return ReactionReport::new(Reaction::Dropped(err.to_string())),
        };

        if self.guard.consume(&text) {
            return ReactionReport::new(Reaction::SelfWrite);
        }

        let applied = {
            let store = lock_recover(&self.rules);
            self.engine.apply_lenient(store.rules(), &text)
        };
        let pattern_errors = applied.errors;

        if !applied.changed || applied.output == text {
            return ReactionReport {
                reaction: Reaction::Unchanged,
                pattern_errors,
            };
        }

        self.guard.arm(applied.output.clone());
        let backend = &mut self.backend;
        let output = applied.output;
        let reaction = match retry_once(retry_delay, "写入剪贴板", || backend.write_text(&output)) {
            Ok(()) => Reaction::Rewritten,
            Err(err) => {
                self.guard.disarm();
                Reaction::Dropped(err.to_string())
            }
        };

        ReactionReport {
            reaction,
            pattern_errors,
        }
    }
}

fn handle_notification(reactor: &Mutex<Reactor>, reacting: &AtomicBool) -> Option<ReactionReport> {
    let Some(_reacting) = ReactingGuard::enter(reacting) else {
        log::debug!("⏭️ 反应周期进行中，忽略重入的剪贴板通知");
        return None;
    };
    let report = lock_recover(reactor).react();
    Some(report)
}

pub struct ClipboardWatcher {
    notifier: Box<dyn ChangeNotifier>,
    reactor: Arc<Mutex<Reactor>>,
    reacting: Arc<AtomicBool>,
    subscription: Option<SubscriptionHandle>,
}

impl ClipboardWatcher {
    /// `rules` 与命令层共享；`retry_delay` 为剪贴板访问失败后的重试间隔
    pub fn new(
        backend: Box<dyn ClipboardBackend>,
        notifier: Box<dyn ChangeNotifier>,
        rules: Arc<Mutex<RuleStore>>,
        retry_delay: Duration,
    ) -> Self {
        let reactor = Reactor {
            backend,
            rules,
            engine: RuleEngine::new(),
            guard: SelfWriteGuard::default(),
            retry_delay,
            last_report: None,
        };
        Self {
            notifier,
            reactor: Arc::new(Mutex::new(reactor)),
            reacting: Arc::new(AtomicBool::new(false)),
            subscription: None,
        }
    }

    /// 注册剪贴板变化监听；重复调用为空操作
    ///
    /// 本进程已有其他监听器运行时返回 [`AppError::WatcherBusy`]。
    pub fn start(&mut self) -> Result<(), AppError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        if WATCHER_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::WatcherBusy);
        }

        let reactor = Arc::clone(&self.reactor);
        let reacting = Arc::clone(&self.reacting);
        let subscribed = self.notifier.subscribe(Box::new(move || {
            handle_notification(&reactor, &reacting);
        }));

        match subscribed {
            Ok(handle) => {
                self.subscription = Some(handle);
                log::info!("👀 剪贴板监听器已启动");
                Ok(())
            }
            Err(err) => {
                WATCHER_ACTIVE.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// 注销监听；未启动或已停止时为空操作
    pub fn stop(&mut self) {
        let Some(handle) = self.subscription.take() else {
            return;
        };
        self.notifier.unsubscribe(handle);
        WATCHER_ACTIVE.store(false, Ordering::SeqCst);
        log::info!("👀 剪贴板监听器已停止");
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> WatcherState {
        if self.reacting.load(Ordering::SeqCst) {
            WatcherState::Reacting
        } else {
            WatcherState::Idle
        }
    }

    /// 不等待通知，立即执行一次反应周期
    pub fn react_now(&self) -> Option<ReactionReport> {
        handle_notification(&self.reactor, &self.reacting)
    }

    pub fn last_report(&self) -> Option<ReactionReport> {
        lock_recover(&self.reactor).last_report.clone()
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
