//! # 系统剪贴板读写
//!
//! ## 实现思路
//!
//! - 使用 `arboard` 读写纯文本，句柄延迟创建并长期持有
//!   （Linux 上剪贴板内容由持有句柄的进程提供，提前释放会丢失写入内容）。
//! - 任何读写失败后丢弃句柄，下一次操作重新打开，避免卡在失效的连接上。
//! - `ContentNotAvailable` / `ConversionFailure` 表示剪贴板里不是纯文本，返回 `Ok(None)`。

use super::ClipboardBackend;
use crate::error::AppError;

#[derive(Default)]
pub struct ArboardClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ArboardClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, AppError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| AppError::Clipboard(format!("无法访问剪贴板: {}", e)))?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| AppError::Clipboard("剪贴板句柄不可用".to_string()))
    }
}

impl ClipboardBackend for ArboardClipboard {
    fn read_text(&mut self) -> Result<Option<String>, AppError> {
        let result = self.handle()?.get_text();
        match result {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) | Err(arboard::Error::ConversionFailure) => {
                Ok(None)
            }
            Err(err) => {
                self.inner = None;
                Err(AppError::Clipboard(format!("读取剪贴板文本失败: {}", err)))
            }
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), AppError> {
        let result = self.handle()?.set_text(text);
        result.map_err(|err| {
            self.inner = None;
            AppError::Clipboard(format!("写入剪贴板文本失败: {}", err))
        })
    }
}
