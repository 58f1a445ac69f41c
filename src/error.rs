//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，规则引擎、规则存储、剪贴板监听与命令层
//! 统一返回 `Result<T, AppError>`，调用方按分支决定「跳过并报告」还是「上抛」。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `PatternError` 单独成型：携带出错规则的下标，便于展示层定位。
//! - 为 `std::io::Error` 与 `PatternError` 提供 `From` 转换，`?` 直接可用。

/// 规则的正则表达式无法编译
///
/// `index` 为规则在有序规则集中的位置（从 0 开始）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("规则 #{index} 的正则无效 ({pattern}): {message}")]
pub struct PatternError {
    pub index: usize,
    pub pattern: String,
    pub message: String,
}

impl PatternError {
    pub(crate) fn new(index: usize, pattern: &str, err: &regex::Error) -> Self {
        Self {
            index,
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 用户提供的正则无效
    #[error("{0}")]
    Pattern(#[from] PatternError),

    /// 规则文件 / 设置文件 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 剪贴板读写或监听失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 设置 / 规则列表无法序列化
    #[error("序列化失败: {0}")]
    Serialization(String),

    /// 规则写入规则文件后无法原样读回（换行、首尾空白、pattern 含分隔符）
    #[error("规则无法保存: {0}")]
    InvalidRule(String),

    /// 本进程内已有另一个监听器在运行
    #[error("剪贴板监听器已在本进程中运行")]
    WatcherBusy,

    /// 引擎未挂载剪贴板读写与通知能力
    #[error("未配置剪贴板访问能力")]
    NoClipboard,
}

impl AppError {
    /// 是否值得在短暂等待后重试（剪贴板被其他进程短暂占用等）
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Clipboard(_))
    }
}
