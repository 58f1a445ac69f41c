//! 应用设置
//!
//! 可选的 JSON 设置文件，字段缺失时取默认值；文件不存在或无法解析时整体回退为默认设置。
//! 命令行参数（以及 `POSTCLIP_RULES` 环境变量）在此基础上覆盖。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clipboard::notifier::{POLL_INTERVAL_DEFAULT_MS, normalize_poll_interval_ms};
use crate::error::AppError;
use crate::rules::DEFAULT_RULES_FILE;

pub const DEFAULT_SETTINGS_FILE: &str = "postclip.json";

const CLIPBOARD_RETRY_DELAY_DEFAULT_MS: u64 = 50;
const CLIPBOARD_RETRY_DELAY_MAX_MS: u64 = 1_000;

/// 剪贴板变化的检测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// 操作系统推送通知
    #[default]
    Push,
    /// 固定间隔轮询
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub rules_path: PathBuf,
    pub watch_mode: WatchMode,
    pub poll_interval_ms: u64,
    pub clipboard_retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_FILE),
            watch_mode: WatchMode::Push,
            poll_interval_ms: POLL_INTERVAL_DEFAULT_MS,
            clipboard_retry_delay_ms: CLIPBOARD_RETRY_DELAY_DEFAULT_MS,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(normalize_poll_interval_ms(self.poll_interval_ms))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.clipboard_retry_delay_ms.min(CLIPBOARD_RETRY_DELAY_MAX_MS))
    }
}

/// 读取设置文件，失败时回退为默认设置
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            log::warn!("读取设置文件 {} 失败，使用默认设置: {}", path.display(), err);
            return Settings::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("解析设置文件 {} 失败，使用默认设置: {}", path.display(), err);
            Settings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Serialization(format!("序列化设置失败: {}", e)))?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "postclip-settings-test-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn save_and_load_settings_roundtrip() {
        let dir = unique_temp_dir();
        let path = dir.join(DEFAULT_SETTINGS_FILE);
        let settings = Settings {
            rules_path: PathBuf::from("custom/rules.txt"),
            watch_mode: WatchMode::Poll,
            poll_interval_ms: 500,
            clipboard_retry_delay_ms: 20,
        };

        save_settings(&path, &settings).expect("save settings");
        assert_eq!(load_settings(&path), settings);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_or_bad_settings_fall_back_to_default() {
        let dir = unique_temp_dir();
        let path = dir.join(DEFAULT_SETTINGS_FILE);
        assert_eq!(load_settings(&path), Settings::default());

        fs::write(&path, "not-json").expect("write invalid settings");
        assert_eq!(load_settings(&path), Settings::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn partial_settings_keep_defaults_for_missing_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{ "watchMode": "poll" }"#).expect("parse partial");
        assert_eq!(settings.watch_mode, WatchMode::Poll);
        assert_eq!(settings.rules_path, PathBuf::from(DEFAULT_RULES_FILE));
        assert_eq!(settings.poll_interval_ms, POLL_INTERVAL_DEFAULT_MS);
    }

    #[test]
    fn durations_are_bounded() {
        let settings = Settings {
            poll_interval_ms: 1,
            clipboard_retry_delay_ms: 60_000,
            ..Settings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(50));
        assert_eq!(settings.retry_delay(), Duration::from_millis(1_000));
    }
}
