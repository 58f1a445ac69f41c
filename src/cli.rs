//! # 命令行展示层
//!
//! 把 [`Engine`] 的命令接口映射为子命令：
//!
//! | 子命令 | 作用 |
//! |--------|------|
//! | `list` | 列出规则（`--json` 输出 JSON） |
//! | `add <PATTERN> <REPLACEMENT>` | 添加规则（即时校验正则） |
//! | `remove <INDEX>` | 按 `list` 中的序号删除规则 |
//! | `apply [TEXT]` | 对参数或标准输入试运行规则，不触碰剪贴板 |
//! | `watch` | 监听剪贴板并按规则改写，输入 `q` 回车退出 |
//! | `settings` | 输出当前生效的设置，`--write` 保存到设置文件 |

use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::thread;

use clap::{Parser, Subcommand};

use crate::clipboard::{ArboardClipboard, ChangeNotifier, MasterNotifier, PollingNotifier};
use crate::engine::Engine;
use crate::error::AppError;
use crate::settings::{DEFAULT_SETTINGS_FILE, Settings, WatchMode, load_settings, save_settings};

#[derive(Debug, Parser)]
#[command(name = "postclip")]
#[command(version, about = "Rewrites clipboard text with an ordered list of regex rules")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Rule file (one `pattern -> replacement` per line)
    #[arg(long, global = true, env = "POSTCLIP_RULES")]
    pub rules: Option<PathBuf>,

    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List rules in application order
    List {
        /// Print rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a rule
    Add {
        /// Regular expression
        pattern: String,
        /// Replacement text ($1, ${name} refer to capture groups)
        replacement: String,
    },

    /// Remove the rule at INDEX (as shown by `list`)
    Remove { index: usize },

    /// Run the rules over TEXT (or stdin) and print the result
    Apply { text: Option<String> },

    /// Watch the clipboard and rewrite text as it is copied
    ///
    /// Type `q` and Enter to stop. When stdin is closed (for example when run in the
    /// background) the watcher runs until the process is killed; the OS clipboard
    /// listener is then released at process exit, not by an explicit stop.
    Watch {
        /// Poll the clipboard instead of using OS notifications
        #[arg(long)]
        poll: bool,

        /// Polling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Show effective settings
    Settings {
        /// Save the effective settings to the settings file
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    /// 默认设置 → 设置文件 → 命令行 / 环境变量
    pub fn resolve_settings(&self) -> Settings {
        let mut settings = load_settings(&self.settings_path());
        if let Some(rules) = &self.rules {
            settings.rules_path = rules.clone();
        }
        if let Commands::Watch { poll, interval_ms } = &self.command {
            if *poll {
                settings.watch_mode = WatchMode::Poll;
            }
            if let Some(ms) = interval_ms {
                settings.poll_interval_ms = *ms;
            }
        }
        settings
    }
}

pub fn run(cli: Cli) -> Result<(), AppError> {
    let settings = cli.resolve_settings();
    log::debug!("生效设置: {:?}", settings);

    match cli.command {
        Commands::List { json } => list(&Engine::open(settings), json),
        Commands::Add { pattern, replacement } => {
            let engine = Engine::open(settings);
            engine.add_rule(&pattern, &replacement)?;
            println!("Added rule #{}", engine.list_rules().len() - 1);
            Ok(())
        }
        Commands::Remove { index } => match Engine::open(settings).remove_rule(index)? {
            Some(rule) => {
                println!("Removed rule #{index}: {rule}");
                Ok(())
            }
            None => {
                println!("No rule at index {index}");
                Ok(())
            }
        },
        Commands::Apply { text } => apply(&Engine::open(settings), text),
        Commands::Watch { .. } => watch(settings),
        Commands::Settings { write } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
            if write {
                save_settings(&path, &settings)?;
                println!("Saved settings to {}", path.display());
            }
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{json}");
            Ok(())
        }
    }
}

fn list(engine: &Engine, json: bool) -> Result<(), AppError> {
    let rules = engine.list_rules();
    if json {
        let out = serde_json::to_string_pretty(&rules)
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }
    if rules.is_empty() {
        println!("No rules in {}", engine.settings().rules_path.display());
    }
    for (index, rule) in rules.iter().enumerate() {
        println!("{index}: {rule}");
    }
    Ok(())
}

fn apply(engine: &Engine, text: Option<String>) -> Result<(), AppError> {
    let input = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let applied = engine.preview(&input);
    for err in &applied.errors {
        eprintln!("warning: {err}");
    }
    print!("{}", applied.output);
    Ok(())
}

fn watch(settings: Settings) -> Result<(), AppError> {
    let notifier: Box<dyn ChangeNotifier> = match settings.watch_mode {
        WatchMode::Push => Box::new(MasterNotifier::new()),
        WatchMode::Poll => {
            log::info!("使用轮询模式（间隔 {}ms）", settings.poll_interval().as_millis());
            Box::new(PollingNotifier::new(
                Box::new(ArboardClipboard::new()),
                settings.poll_interval_ms,
            ))
        }
    };

    let mut engine = Engine::open(settings).with_clipboard(Box::new(ArboardClipboard::new()), notifier);
    engine.start()?;
    eprintln!(
        "Watching clipboard with {} rule(s). Type `q` and Enter to stop.",
        engine.list_rules().len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        match lines.next() {
            Some(Ok(line)) if matches!(line.trim(), "q" | "quit") => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                log::warn!("读取标准输入失败: {}", err);
                park_forever();
            }
            None => park_forever(),
        }
    }

    engine.stop();
    Ok(())
}

/// 标准输入不可用（后台运行）时一直运行到进程被终止
///
/// 此路径不会调用 `Engine::stop`：系统剪贴板监听在进程退出时由操作系统回收。
fn park_forever() -> ! {
    log::info!("标准输入已关闭，监听将持续到进程结束");
    loop {
        thread::park();
    }
}
