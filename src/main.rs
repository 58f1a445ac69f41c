//! # postclip — 应用入口
//!
//! 本文件仅负责日志初始化与命令行解析，业务逻辑详见 `lib.rs` 架构文档。

use std::process::ExitCode;

use clap::Parser;
use postclip::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(err) = cli::run(cli) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
