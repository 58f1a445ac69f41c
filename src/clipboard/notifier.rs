//! # 剪贴板变化监听
//!
//! ## 设计思路
//!
//! 两种实现共享同一个 [`ChangeNotifier`] 接口：
//! - [`MasterNotifier`]：`clipboard-master` 推送式监听（Windows `AddClipboardFormatListener`、
//!   X11 XFixes、macOS 轮询 changeCount），运行在独立线程上，异常退出后指数退避重启。
//! - [`PollingNotifier`]：没有推送能力时的兜底方案，固定间隔比较剪贴板文本的哈希。
//!
//! 两者都只支持同一时刻一个订阅，回调在各自的后台线程上串行执行。

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clipboard_master::{CallbackResult, ClipboardHandler, Master, Shutdown};

use super::{ChangeCallback, ChangeNotifier, ClipboardBackend, SubscriptionHandle};
use crate::error::AppError;

const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;
const STOP_CHECK_SLICE: Duration = Duration::from_millis(25);

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("剪贴板监听状态锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

/// 分片睡眠，期间收到停止信号立即返回 `false`
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_CHECK_SLICE.min(deadline - now));
    }
}

/// 正在运行的订阅：后台线程 + 停止标志
struct Running {
    handle: SubscriptionHandle,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

fn ensure_idle(running: &Option<Running>) -> Result<(), AppError> {
    if running.is_some() {
        return Err(AppError::Clipboard("剪贴板监听已有订阅".to_string()));
    }
    Ok(())
}

// ============================================================================
// 推送式监听（clipboard-master）
// ============================================================================

struct Handler {
    on_change: Arc<Mutex<ChangeCallback>>,
    stop: Arc<AtomicBool>,
}

impl ClipboardHandler for Handler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if self.stop.load(Ordering::SeqCst) {
            return CallbackResult::Stop;
        }
        let mut on_change = lock_recover(&self.on_change);
        (*on_change)();
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: std::io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

#[derive(Default)]
pub struct MasterNotifier {
    running: Option<Running>,
    shutdown: Arc<Mutex<Option<Shutdown>>>,
}

impl MasterNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

fn run_master_loop(
    on_change: Arc<Mutex<ChangeCallback>>,
    stop: Arc<AtomicBool>,
    shutdown: Arc<Mutex<Option<Shutdown>>>,
) {
    let mut restart_attempt: u32 = 0;
    while !stop.load(Ordering::SeqCst) {
        let handler = Handler {
            on_change: Arc::clone(&on_change),
            stop: Arc::clone(&stop),
        };
        match Master::new(handler) {
            Ok(mut master) => {
                *lock_recover(&shutdown) = Some(master.shutdown_channel());
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                restart_attempt = 0;
                log::info!("📋 剪贴板监听已启动");
                if let Err(err) = master.run() {
                    log::warn!("📋 剪贴板监听异常退出: {}", err);
                }
                lock_recover(&shutdown).take();
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!("📋 剪贴板监听已退出，将尝试重启");
            }
            Err(err) => {
                log::error!("📋 创建剪贴板监听失败: {}", err);
            }
        }

        restart_attempt = restart_attempt.saturating_add(1);
        let backoff_ms = compute_restart_backoff_ms(restart_attempt);
        log::warn!("📋 剪贴板监听 {}ms 后重试（attempt={}）", backoff_ms, restart_attempt);
        if !sleep_unless_stopped(&stop, Duration::from_millis(backoff_ms)) {
            break;
        }
    }
    log::info!("📋 剪贴板监听已停止");
}

impl ChangeNotifier for MasterNotifier {
    fn subscribe(&mut self, on_change: ChangeCallback) -> Result<SubscriptionHandle, AppError> {
        ensure_idle(&self.running)?;

        let handle = SubscriptionHandle::next();
        let stop = Arc::new(AtomicBool::new(false));
        let on_change = Arc::new(Mutex::new(on_change));
        let thread = {
            let stop = Arc::clone(&stop);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("postclip-listener".to_string())
                .spawn(move || run_master_loop(on_change, stop, shutdown))
                .map_err(|e| AppError::Clipboard(format!("启动剪贴板监听线程失败: {}", e)))?
        };

        self.running = Some(Running { handle, stop, thread });
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let Some(running) = self.running.take_if(|r| r.handle == handle) else {
            return;
        };

        running.stop.store(true, Ordering::SeqCst);
        if let Some(shutdown) = lock_recover(&self.shutdown).take() {
            shutdown.signal();
        }
        if running.thread.join().is_err() {
            log::error!("📋 剪贴板监听线程异常结束");
        }
    }
}

// ============================================================================
// 轮询监听
// ============================================================================

pub const POLL_INTERVAL_DEFAULT_MS: u64 = 250;
pub const POLL_INTERVAL_MIN_MS: u64 = 50;
pub const POLL_INTERVAL_MAX_MS: u64 = 5_000;

pub fn normalize_poll_interval_ms(value_ms: u64) -> u64 {
    value_ms.clamp(POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS)
}

fn content_hash(text: Option<&str>) -> Option<u64> {
    text.map(|t| {
        let mut hasher = DefaultHasher::new();
        t.hash(&mut hasher);
        hasher.finish()
    })
}

/// 比较上次与本次的内容哈希，返回是否视为一次变化并更新基线
fn observe(last: &mut Option<Option<u64>>, current: Option<u64>) -> bool {
    match last.replace(current) {
        None => false,
        Some(previous) => previous != current,
    }
}

pub struct PollingNotifier {
    backend: Arc<Mutex<Box<dyn ClipboardBackend>>>,
    interval: Duration,
    running: Option<Running>,
}

impl PollingNotifier {
    /// `backend` 为轮询专用的读句柄；间隔会被限制在 50..=5000ms
    pub fn new(backend: Box<dyn ClipboardBackend>, interval_ms: u64) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            interval: Duration::from_millis(normalize_poll_interval_ms(interval_ms)),
            running: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn run_poll_loop(
    backend: Arc<Mutex<Box<dyn ClipboardBackend>>>,
    mut on_change: ChangeCallback,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    log::info!("📋 剪贴板轮询已启动（间隔 {}ms）", interval.as_millis());
    let mut last: Option<Option<u64>> = None;
    loop {
        let read = lock_recover(&backend).read_text();
        match read {
            Ok(text) => {
                if observe(&mut last, content_hash(text.as_deref())) {
                    on_change();
                }
            }
            Err(err) => log::debug!("📋 轮询读取剪贴板失败: {}", err),
        }

        if !sleep_unless_stopped(&stop, interval) {
            break;
        }
    }
    log::info!("📋 剪贴板轮询已停止");
}

impl ChangeNotifier for PollingNotifier {
    fn subscribe(&mut self, on_change: ChangeCallback) -> Result<SubscriptionHandle, AppError> {
        ensure_idle(&self.running)?;

        let handle = SubscriptionHandle::next();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            let backend = Arc::clone(&self.backend);
            let interval = self.interval;
            thread::Builder::new()
                .name("postclip-poller".to_string())
                .spawn(move || run_poll_loop(backend, on_change, stop, interval))
                .map_err(|e| AppError::Clipboard(format!("启动剪贴板轮询线程失败: {}", e)))?
        };

        self.running = Some(Running { handle, stop, thread });
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let Some(running) = self.running.take_if(|r| r.handle == handle) else {
            return;
        };

        running.stop.store(true, Ordering::SeqCst);
        if running.thread.join().is_err() {
            log::error!("📋 剪贴板轮询线程异常结束");
        }
    }
}

impl Drop for PollingNotifier {
    fn drop(&mut self) {
        if let Some(handle) = self.running.as_ref().map(|r| r.handle) {
            self.unsubscribe(handle);
        }
    }
}

impl Drop for MasterNotifier {
    fn drop(&mut self) {
        if let Some(handle) = self.running.as_ref().map(|r| r.handle) {
            self.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::clipboard::MemoryClipboard;

    #[test]
    fn restart_backoff_grows_then_caps() {
        assert_eq!(compute_restart_backoff_ms(1), 100);
        assert_eq!(compute_restart_backoff_ms(2), 200);
        assert_eq!(compute_restart_backoff_ms(3), 400);
        assert_eq!(compute_restart_backoff_ms(7), 5_000);
        assert_eq!(compute_restart_backoff_ms(20), 5_000);
    }

    #[test]
    fn poll_interval_is_clamped() {
        assert_eq!(normalize_poll_interval_ms(5), 50);
        assert_eq!(normalize_poll_interval_ms(250), 250);
        assert_eq!(normalize_poll_interval_ms(60_000), 5_000);
    }

    #[test]
    fn first_observation_only_sets_baseline() {
        let mut last = None;
        assert!(!observe(&mut last, Some(1)));
        assert!(!observe(&mut last, Some(1)));
        assert!(observe(&mut last, Some(2)));
        assert!(observe(&mut last, None));
        assert!(!observe(&mut last, None));
    }

    #[test]
    fn content_hash_distinguishes_text_and_absence() {
        assert_eq!(content_hash(None), None);
        assert_eq!(content_hash(Some("a")), content_hash(Some("a")));
        assert_ne!(content_hash(Some("a")), content_hash(Some("b")));
    }

    #[test]
    fn sleep_returns_early_when_stopped() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!sleep_unless_stopped(&stop, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn polling_notifier_fires_on_content_change_and_stops() {
        let clipboard = MemoryClipboard::with_text("first");
        let mut notifier = PollingNotifier::new(Box::new(clipboard.clone()), 50);
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let handle = notifier
            .subscribe(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("subscribe");
        assert!(notifier.subscribe(Box::new(|| {})).is_err(), "second subscription rejected");

        thread::sleep(Duration::from_millis(120));
        assert_eq!(hits.load(Ordering::SeqCst), 0, "baseline read must not fire");

        clipboard.set_external("second");
        let deadline = Instant::now() + Duration::from_secs(2);
        while hits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        notifier.unsubscribe(handle);
        notifier.unsubscribe(handle);
        clipboard.set_external("third");
        thread::sleep(Duration::from_millis(150));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "no callbacks after unsubscribe");
    }
}
