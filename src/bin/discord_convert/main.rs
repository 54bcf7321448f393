mod budget;
mod config;
mod convert;
mod error;
mod ladder;
mod logger;
mod output;
mod pipeline;
mod planner;
mod probe;
mod process;
mod stats;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::convert::DiscordConvert;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Convert videos to H.264 MP4 files that fit under the Discord upload limit"
)]
pub(crate) struct DiscordConvertArgs {
    /// Input video files
    #[arg(value_hint = clap::ValueHint::FilePath, required_unless_present = "completion")]
    paths: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Print commands without running them
    #[arg(short = 'p', long)]
    print: bool,

    /// Do not write a log file
    #[arg(long)]
    no_log: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, value_name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = DiscordConvertArgs::parse();
    if let Some(ref shell) = args.completion {
        discord_tools::generate_shell_completion(*shell, DiscordConvertArgs::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        DiscordConvert::new(args)?.run().map(|_| ())
    }
}
