//! # 进程内剪贴板
//!
//! 同时实现 [`ClipboardBackend`] 与 [`ChangeNotifier`]，克隆出的句柄共享同一份状态。
//! 每次内容变化（外部写入或本身的 `write_text`）都会记一次待投递通知，
//! 由 [`MemoryClipboard::pump`] 逐条串行投递，模拟操作系统的事件源。

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChangeCallback, ChangeNotifier, ClipboardBackend, SubscriptionHandle};
use crate::error::AppError;

/// 单次 `pump` 最多投递的通知数，防止自触发死循环拖死调用方
pub const PUMP_LIMIT: usize = 64;

#[derive(Default)]
struct State {
    content: Option<String>,
    writes: Vec<String>,
    pending: usize,
    subscribers: Vec<(SubscriptionHandle, ChangeCallback)>,
    failing_reads: u32,
    failing_writes: u32,
}

#[derive(Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<State>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初始内容为 `text`，不产生通知
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::new();
        clipboard.lock().content = Some(text.to_string());
        clipboard
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 模拟其他程序复制了一段文本
    pub fn set_external(&self, text: &str) {
        let mut state = self.lock();
        state.content = Some(text.to_string());
        state.pending += 1;
    }

    /// 模拟其他程序复制了非文本内容（图片、文件列表等）
    pub fn set_non_text(&self) {
        let mut state = self.lock();
        state.content = None;
        state.pending += 1;
    }

    pub fn text(&self) -> Option<String> {
        self.lock().content.clone()
    }

    /// 通过 `write_text` 写入的全部内容（按时间顺序）
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn pending_notifications(&self) -> usize {
        self.lock().pending
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// 接下来 `count` 次读取返回剪贴板占用错误
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// 接下来 `count` 次写入返回剪贴板占用错误
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    /// 逐条投递待处理通知，返回实际投递的条数
    ///
    /// 回调执行期间不持有内部锁，回调中的读写会产生新的待投递通知，
    /// 在同一次 `pump` 中继续投递，直到队列为空或达到 [`PUMP_LIMIT`]。
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        while delivered < PUMP_LIMIT {
            let mut subscribers = {
                let mut state = self.lock();
                if state.pending == 0 {
                    break;
                }
                state.pending -= 1;
                mem::take(&mut state.subscribers)
            };

            for (_, on_change) in subscribers.iter_mut() {
                on_change();
            }
            delivered += 1;

            let mut state = self.lock();
            subscribers.append(&mut state.subscribers);
            state.subscribers = subscribers;
        }
        delivered
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&mut self) -> Result<Option<String>, AppError> {
        let mut state = self.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(AppError::Clipboard("剪贴板被占用".to_string()));
        }
        Ok(state.content.clone().filter(|text| !text.is_empty()))
    }

    fn write_text(&mut self, text: &str) -> Result<(), AppError> {
        let mut state = self.lock();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(AppError::Clipboard("剪贴板被占用".to_string()));
        }
        state.content = Some(text.to_string());
        state.writes.push(text.to_string());
        state.pending += 1;
        Ok(())
    }
}

impl ChangeNotifier for MemoryClipboard {
    fn subscribe(&mut self, on_change: ChangeCallback) -> Result<SubscriptionHandle, AppError> {
        let handle = SubscriptionHandle::next();
        self.lock().subscribers.push((handle, on_change));
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        self.lock().subscribers.retain(|(h, _)| *h != handle);
    }
}
