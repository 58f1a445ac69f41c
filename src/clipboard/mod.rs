//! 剪贴板管理模块
//!
//! # 设计思路
//!
//! 核心逻辑只依赖两个抽象能力，不直接依赖任何操作系统 API：
//! - [`ClipboardBackend`]：读写纯文本（`ReadText` / `WriteText`）
//! - [`ChangeNotifier`]：订阅 / 取消订阅剪贴板变化（`SubscribeToChanges` / `Unsubscribe`）
//!
//! 具体实现按职责拆分：
//! - `backend`：基于 `arboard` 的系统剪贴板读写
//! - `notifier`：基于 `clipboard-master` 的推送监听，以及无推送平台上的轮询监听
//! - `memory`：进程内剪贴板，供测试与演示使用
//! - `watcher`：监听器状态机，负责「读取 → 应用规则 → 回写」并避免自触发循环

pub mod backend;
pub mod memory;
pub mod notifier;
pub mod watcher;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;

pub use backend::ArboardClipboard;
pub use memory::MemoryClipboard;
pub use notifier::{MasterNotifier, PollingNotifier};
pub use watcher::{ClipboardWatcher, Reaction, ReactionReport, WatcherState};

/// 剪贴板文本读写能力
pub trait ClipboardBackend: Send {
    /// 读取当前剪贴板文本；剪贴板中没有纯文本（图片、文件列表、空）时返回 `Ok(None)`
    fn read_text(&mut self) -> Result<Option<String>, AppError>;

    fn write_text(&mut self, text: &str) -> Result<(), AppError>;
}

/// 剪贴板变化回调，由监听实现在其事件线程上串行调用
pub type ChangeCallback = Box<dyn FnMut() + Send + 'static>;

/// 订阅句柄，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

impl SubscriptionHandle {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 剪贴板变化订阅能力
pub trait ChangeNotifier: Send {
    fn subscribe(&mut self, on_change: ChangeCallback) -> Result<SubscriptionHandle, AppError>;

    /// 取消订阅；对未知或已取消的句柄为空操作
    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}
