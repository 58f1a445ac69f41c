//! # postclip — 剪贴板文本规则改写 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │        展示层（cli：list / add / remove / apply / watch） │
//! └───────────────────────────┬──────────────────────────────┘
//!                             ↕ Result<T, AppError>
//! ┌───────────────────────────┼──────────────────────────────┐
//! │  engine ── Engine（命令接口 + start / stop）              │
//! │    │                                                     │
//! │    ├─ rules                                              │
//! │    │   ├─ store    RuleStore 有序规则集 + 写穿透持久化    │
//! │    │   └─ engine   RuleEngine 顺序流水线替换              │
//! │    │                                                     │
//! │    └─ clipboard                                          │
//! │        ├─ watcher  Idle / Reacting 状态机 + 自触发守卫    │
//! │        ├─ backend  arboard 文本读写                       │
//! │        ├─ notifier clipboard-master 推送 / 轮询兜底       │
//! │        └─ memory   进程内剪贴板（测试）                   │
//! │                                                          │
//! │  settings ── JSON 设置   error ── AppError               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! 数据流：系统剪贴板变化 → watcher 读取文本 → RuleEngine 依次应用规则
//! → 结果与原文不同则回写 → 回写引起的通知被自触发守卫识别并跳过。
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` 与 `PatternError` |
//! | [`rules`] | 规则模型、文件格式、规则引擎 |
//! | [`clipboard`] | 剪贴板能力抽象、推送 / 轮询监听、监听器状态机 |
//! | [`engine`] | 面向展示层的命令接口与监听生命周期 |
//! | [`settings`] | 设置文件读写 |
//! | [`cli`] | 命令行展示层 |

pub mod cli;
pub mod clipboard;
pub mod engine;
pub mod error;
pub mod rules;
pub mod settings;

pub use engine::Engine;
pub use error::{AppError, PatternError};
pub use rules::{Rule, RuleEngine, RuleStore};
