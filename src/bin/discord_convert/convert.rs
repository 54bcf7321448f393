use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use discord_tools::{print_error, print_warning};
use tempfile::TempDir;

use crate::DiscordConvertArgs;
use crate::config::{Config, DiscordConvertConfig};
use crate::error::ConvertError;
use crate::logger::FileLogger;
use crate::output::unique_output_path;
use crate::pipeline::TwoPassPipeline;
use crate::planner::{EncodingPlan, PlanDecision};
use crate::probe::{MediaInfo, MediaProbe};
use crate::process::{ProcessRunner, SystemRunner, format_command};
use crate::stats::RunStats;

/// File name prefix for the ffmpeg two-pass statistics files.
const PASSLOG_NAME: &str = "dconvert2pass";

/// Converts video files to H.264 MP4 files that fit under the Discord upload limit.
pub struct DiscordConvert<R: ProcessRunner = SystemRunner> {
    config: Config,
    runner: R,
    logger: Option<RefCell<FileLogger>>,
    /// Directory holding the pass-log files of this run
    work_dir: PathBuf,
    /// Private work directory, removed when the converter is dropped
    _temp_dir: Option<TempDir>,
}

/// Final state of one produced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    /// False if the file ended up above the hard size limit
    pub within_budget: bool,
}

/// Result of processing a single file
#[derive(Debug)]
pub enum ProcessResult {
    /// File was encoded with the two-pass pipeline
    Converted { result: ConversionResult, input_size: u64 },
    /// File already met the constraints and was copied unchanged
    Copied { result: ConversionResult },
    /// Dry run: nothing was written
    Planned { output: PathBuf },
    /// Failed to process file
    Failed { error: String },
}

impl DiscordConvert<SystemRunner> {
    /// Create a new converter from command line arguments.
    pub fn new(args: DiscordConvertArgs) -> Result<Self> {
        let user_config = DiscordConvertConfig::get_user_config();
        let config = Config::try_from_args(args, user_config)?;
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: ProcessRunner> DiscordConvert<R> {
    /// Create a converter that runs external tools through the given runner.
    pub fn with_runner(config: Config, runner: R) -> Result<Self> {
        let logger = match &config.log_dir {
            Some(dir) => Some(RefCell::new(FileLogger::new(dir)?)),
            None => None,
        };

        let (work_dir, temp_dir) = match &config.work_dir {
            Some(dir) => (dir.clone(), None),
            None if config.dryrun => (std::env::temp_dir(), None),
            None => {
                let temp_dir = tempfile::Builder::new()
                    .prefix("dconvert-")
                    .tempdir()
                    .context("Failed to create work directory")?;
                (temp_dir.path().to_path_buf(), Some(temp_dir))
            }
        };

        Ok(Self {
            config,
            runner,
            logger,
            work_dir,
            _temp_dir: temp_dir,
        })
    }

    /// Prefix for the pass-log files shared by both passes of one encode.
    fn passlog_prefix(&self) -> PathBuf {
        self.work_dir.join(PASSLOG_NAME)
    }

    /// Run the conversion for all input files.
    ///
    /// # Errors
    /// Returns an error if ffmpeg or ffprobe can not be executed.
    /// Failures of single files are reported and counted, not returned.
    pub fn run(&self) -> Result<RunStats> {
        self.check_dependencies()?;

        let stats = self.process_files();
        stats.print_summary();

        Ok(stats)
    }

    /// Check that ffprobe and ffmpeg can be executed.
    fn check_dependencies(&self) -> Result<()> {
        for tool in [&self.config.ffprobe, &self.config.ffmpeg] {
            let available = self
                .runner
                .run(tool, &[OsString::from("-version")])
                .is_ok_and(|output| output.success());
            if !available {
                anyhow::bail!(
                    "{} not found. Install ffmpeg and make sure it is in PATH, or set `tool_dir` in the config file",
                    tool.display()
                );
            }
        }
        Ok(())
    }

    /// Process all input files one after another.
    ///
    /// A failing file does not stop the batch.
    pub(crate) fn process_files(&self) -> RunStats {
        let mut stats = RunStats::default();
        let total = self.config.inputs.len();
        let num_digits = total.to_string().chars().count();

        self.log(|logger| logger.log_init(&self.config));

        for (index, input) in self.config.inputs.iter().enumerate() {
            let file_index = format!("[{:>width$}/{total}]", index + 1, width = num_digits);

            let start = Instant::now();
            let result = match self.process_single_file(input, &file_index) {
                Ok(result) => result,
                Err(error) => {
                    print_error!("{error}");
                    self.log(|logger| logger.log_failure(input, &file_index, error.kind(), &error.to_string()));
                    ProcessResult::Failed {
                        error: error.to_string(),
                    }
                }
            };
            let duration = start.elapsed();

            stats.add_result(input.clone(), &result, duration);
        }

        self.log(|logger| logger.log_stats(&stats));
        stats
    }

    /// Probe, plan and then copy or encode a single file.
    pub(crate) fn process_single_file(&self, input: &Path, file_index: &str) -> Result<ProcessResult, ConvertError> {
        let path = discord_tools::resolve_existing_path(input)
            .filter(|path| path.is_file())
            .ok_or_else(|| ConvertError::FileNotFound {
                path: input.to_path_buf(),
            })?;

        let size_bytes = fs::metadata(&path)?.len();

        println!(
            "{}",
            format!("\n{file_index} {}", discord_tools::path_to_filename_string(&path))
                .bold()
                .magenta()
        );

        let report = MediaProbe::new(&self.config.ffprobe, &self.runner).probe(&path)?;
        let info = MediaInfo::from_probe(report, &path, size_bytes)?;
        println!("{info}");

        match self.config.planner().plan(&info)? {
            PlanDecision::PassThrough => self.copy_file(&path, file_index),
            PlanDecision::Encode(plan) => self.encode_file(&path, file_index, &info, &plan),
        }
    }

    /// Copy a file that already satisfies all constraints.
    fn copy_file(&self, input: &Path, file_index: &str) -> Result<ProcessResult, ConvertError> {
        println!(
            "{}",
            format!(
                "Already Discord compatible (<= {}, H.264, .mp4): copying as is",
                discord_tools::format_size(self.config.size_limit_bytes)
            )
            .green()
        );

        let output = unique_output_path(&self.config.output_dir, input);
        if self.config.dryrun {
            println!("[DRYRUN] copy {} -> {}", input.display(), output.display());
            return Ok(ProcessResult::Planned { output });
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let output_size_bytes = fs::copy(input, &output)?;
        self.log(|logger| logger.log_copy(input, file_index, &output));
        println!("-> {}", discord_tools::path_to_string_relative(&output));

        Ok(ProcessResult::Copied {
            result: ConversionResult {
                output_path: output,
                output_size_bytes,
                within_budget: output_size_bytes <= self.config.size_limit_bytes,
            },
        })
    }

    /// Encode a file with the two-pass pipeline.
    fn encode_file(
        &self,
        input: &Path,
        file_index: &str,
        info: &MediaInfo,
        plan: &EncodingPlan,
    ) -> Result<ProcessResult, ConvertError> {
        self.print_strategy(plan);
        if !plan.meets_floor {
            let message = format!(
                "Only {} kbps available for video, below the {} kbps floor of the lowest tier: expect low quality",
                plan.target_video_kbps,
                self.config.ladder.lowest_floor_kbps()
            );
            print_warning!("{message}");
            self.log(|logger| logger.log_warning(file_index, &message));
        }

        let output = unique_output_path(&self.config.output_dir, input);
        let mut pipeline = TwoPassPipeline::new(
            &self.config.ffmpeg,
            &self.config.preset,
            self.passlog_prefix(),
            &self.runner,
        );

        if self.config.dryrun {
            println!("[DRYRUN] {}", format_command(pipeline.ffmpeg(), &pipeline.analysis_args(input, plan)));
            println!(
                "[DRYRUN] {}",
                format_command(pipeline.ffmpeg(), &pipeline.encoding_args(input, &output, plan))
            );
            return Ok(ProcessResult::Planned { output });
        }

        fs::create_dir_all(&self.config.output_dir)?;
        fs::create_dir_all(&self.work_dir)?;
        if self.config.verbose {
            println!("{}", format_command(pipeline.ffmpeg(), &pipeline.analysis_args(input, plan)));
            println!(
                "{}",
                format_command(pipeline.ffmpeg(), &pipeline.encoding_args(input, &output, plan))
            );
        }

        println!(
            "{}",
            format!("Encoding -> {}", discord_tools::path_to_filename_string(&output)).cyan()
        );
        self.log(|logger| logger.log_start(input, file_index, info, plan));

        let start = Instant::now();
        let result = pipeline.run(input, &output, plan);
        for failure in pipeline.cleanup_failures() {
            self.log(|logger| logger.log_warning(file_index, &failure.to_string()));
        }
        result?;

        let output_size_bytes = fs::metadata(&output)?.len();
        let result = ConversionResult {
            within_budget: output_size_bytes <= self.config.size_limit_bytes,
            output_path: output,
            output_size_bytes,
        };
        self.print_result(&result);
        if !result.within_budget {
            let excess = result.output_size_bytes - self.config.size_limit_bytes;
            let message = format!("Output is {} over the size limit", discord_tools::format_size(excess));
            self.log(|logger| logger.log_warning(file_index, &message));
        }
        self.log(|logger| logger.log_success(file_index, start.elapsed(), &result));

        Ok(ProcessResult::Converted {
            result,
            input_size: info.size_bytes,
        })
    }

    fn print_strategy(&self, plan: &EncodingPlan) {
        println!("{}", "Compression strategy:".bold());
        println!("  Target video bitrate: {} kbps", plan.target_video_kbps);
        if plan.include_audio {
            println!("  Audio:                AAC {} kbps", plan.audio_kbps);
        } else {
            println!("  Audio:                none");
        }
        if plan.is_downscaled() {
            println!(
                "  Resolution:           {}p -> {}p (reduced to fit in {})",
                plan.source_height,
                plan.target_height,
                discord_tools::format_size(self.config.size_limit_bytes)
            );
        } else {
            println!(
                "  Resolution:           {}p (kept, only quality reduced)",
                plan.target_height
            );
        }
    }

    fn print_result(&self, result: &ConversionResult) {
        let size = discord_tools::format_size(result.output_size_bytes);
        let limit = discord_tools::format_size(self.config.size_limit_bytes);
        println!("{}", "─".repeat(60));
        if result.within_budget {
            println!("{}", format!("  OK  Final size: {size} (<= {limit})").green());
        } else {
            print_warning!("  !   Final size: {size} (slightly above {limit})");
            print_warning!("      Content too complex for this duration, try trimming the video.");
        }
        println!("  File: {}", discord_tools::path_to_string_relative(&result.output_path));
        println!("{}", "─".repeat(60));
    }

    fn log(&self, write: impl FnOnce(&mut FileLogger)) {
        if let Some(logger) = &self.logger {
            write(&mut *logger.borrow_mut());
        }
    }
}
