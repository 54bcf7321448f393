use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use discord_tools::print_error;
use serde::Deserialize;

use crate::DiscordConvertArgs;
use crate::ladder::{ResolutionLadder, ResolutionTier};
use crate::planner::EncodingPlanner;

/// Working size target in MB, leaving a margin under the hard limit.
const DEFAULT_TARGET_SIZE_MB: f64 = 9.5;

/// Discord upload limit in MB.
const DEFAULT_SIZE_LIMIT_MB: f64 = 10.0;

/// AAC audio bitrate in kbps.
const DEFAULT_AUDIO_KBPS: u32 = 128;

/// x264 preset used for both passes.
const DEFAULT_PRESET: &str = "slow";

/// Default output directory, relative to the working directory.
const DEFAULT_OUTPUT_DIR: &str = "output";

/// User configuration from the config file.
#[derive(Debug, Default, Deserialize)]
pub struct DiscordConvertConfig {
    #[serde(default)]
    audio_kbps: Option<u32>,
    #[serde(default)]
    ladder: Option<Vec<ResolutionTier>>,
    #[serde(default)]
    log: Option<bool>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    size_limit_mb: Option<f64>,
    #[serde(default)]
    target_size_mb: Option<f64>,
    #[serde(default)]
    tool_dir: Option<PathBuf>,
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    work_dir: Option<PathBuf>,
}

/// Final config combined from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) audio_kbps: u32,
    pub(crate) dryrun: bool,
    pub(crate) ffmpeg: PathBuf,
    pub(crate) ffprobe: PathBuf,
    pub(crate) inputs: Vec<PathBuf>,
    pub(crate) ladder: ResolutionLadder,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) output_dir: PathBuf,
    pub(crate) preset: String,
    pub(crate) size_limit_bytes: u64,
    pub(crate) target_size_bytes: u64,
    pub(crate) verbose: bool,
    /// Directory for pass-log files. `None` uses a private temporary directory per run.
    pub(crate) work_dir: Option<PathBuf>,
}

/// Wrapper needed for parsing the config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    discord_convert: DiscordConvertConfig,
}

impl DiscordConvertConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    pub fn get_user_config() -> Self {
        discord_tools::config::CONFIG_PATH
            .as_deref()
            .filter(|path| path.exists())
            .and_then(|path| {
                fs::read_to_string(path)
                    .map_err(|e| {
                        print_error!("Error reading config file {}: {e}", path.display());
                    })
                    .ok()
            })
            .and_then(|config_string| {
                Self::from_toml(&config_string)
                    .map_err(|e| {
                        print_error!("Error reading config file: {e}");
                    })
                    .ok()
            })
            .unwrap_or_default()
    }

    /// Parse the `[discord_convert]` section from a full config file.
    pub fn from_toml(config_string: &str) -> Result<Self> {
        let config = toml::from_str::<UserConfig>(config_string)?;
        Ok(config.discord_convert)
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    pub(crate) fn try_from_args(args: DiscordConvertArgs, user_config: DiscordConvertConfig) -> Result<Self> {
        let defaults = Self::default();

        let target_size_mb = user_config.target_size_mb.unwrap_or(DEFAULT_TARGET_SIZE_MB);
        let size_limit_mb = user_config.size_limit_mb.unwrap_or(DEFAULT_SIZE_LIMIT_MB);
        if !(target_size_mb > 0.0 && target_size_mb <= size_limit_mb) {
            anyhow::bail!(
                "Target size must be positive and at most the size limit: target {target_size_mb} MB, limit {size_limit_mb} MB"
            );
        }

        let audio_kbps = user_config.audio_kbps.unwrap_or(DEFAULT_AUDIO_KBPS);
        if audio_kbps == 0 {
            anyhow::bail!("Audio bitrate must be positive");
        }

        let ladder = match user_config.ladder {
            Some(tiers) => ResolutionLadder::new(tiers).context("Invalid ladder in config file")?,
            None => defaults.ladder,
        };

        let output_dir = args
            .output
            .or(user_config.output_dir)
            .unwrap_or(defaults.output_dir);

        let log_dir = if args.no_log || user_config.log == Some(false) {
            None
        } else {
            defaults.log_dir
        };

        let tool_dir = user_config.tool_dir.as_deref();

        Ok(Self {
            audio_kbps,
            dryrun: args.print,
            ffmpeg: tool_path(tool_dir, "ffmpeg"),
            ffprobe: tool_path(tool_dir, "ffprobe"),
            inputs: args.paths,
            ladder,
            log_dir,
            output_dir,
            preset: user_config.preset.unwrap_or(defaults.preset),
            size_limit_bytes: discord_tools::megabytes_to_bytes(size_limit_mb),
            target_size_bytes: discord_tools::megabytes_to_bytes(target_size_mb),
            verbose: args.verbose || user_config.verbose,
            work_dir: user_config.work_dir,
        })
    }

    /// Planner using the configured budget and ladder.
    pub(crate) fn planner(&self) -> EncodingPlanner {
        EncodingPlanner {
            target_size_bytes: self.target_size_bytes,
            size_limit_bytes: self.size_limit_bytes,
            audio_kbps: self.audio_kbps,
            ladder: self.ladder.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_kbps: DEFAULT_AUDIO_KBPS,
            dryrun: false,
            ffmpeg: tool_path(None, "ffmpeg"),
            ffprobe: tool_path(None, "ffprobe"),
            inputs: Vec::new(),
            ladder: ResolutionLadder::default(),
            log_dir: discord_tools::config::LOG_DIR.clone(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            preset: DEFAULT_PRESET.to_string(),
            size_limit_bytes: discord_tools::megabytes_to_bytes(DEFAULT_SIZE_LIMIT_MB),
            target_size_bytes: discord_tools::megabytes_to_bytes(DEFAULT_TARGET_SIZE_MB),
            verbose: false,
            work_dir: None,
        }
    }
}

/// Executable path for a tool, either inside `tool_dir` or looked up from `PATH`.
fn tool_path(tool_dir: Option<&Path>, name: &str) -> PathBuf {
    let file_name = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    tool_dir.map_or_else(|| PathBuf::from(&file_name), |dir| dir.join(&file_name))
}
