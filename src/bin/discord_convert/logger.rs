use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::Config;
use crate::convert::ConversionResult;
use crate::planner::EncodingPlan;
use crate::probe::MediaInfo;
use crate::stats::RunStats;

/// Simple file logger for conversion runs with buffered writes
pub struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    /// Create a new file logger, writing to `<log_dir>/dconvert_<timestamp>.log`
    pub(crate) fn new(log_dir: &Path) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let log_path = log_dir.join(format!("dconvert_{}.log", Local::now().format("%Y-%m-%d_%H-%M-%S")));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log when starting the program
    pub(crate) fn log_init(&mut self, config: &Config) {
        let _ = writeln!(self.writer, "[{}] INIT {} file(s)", Self::timestamp(), config.inputs.len());
        let _ = writeln!(self.writer, "  target_size: {}", discord_tools::format_size(config.target_size_bytes));
        let _ = writeln!(self.writer, "  size_limit: {}", discord_tools::format_size(config.size_limit_bytes));
        let _ = writeln!(self.writer, "  audio_kbps: {}", config.audio_kbps);
        let _ = writeln!(self.writer, "  preset: {}", config.preset);
        let _ = writeln!(self.writer, "  ladder: {}", config.ladder);
        let _ = writeln!(self.writer, "  output_dir: {}", config.output_dir.display());
        let _ = writeln!(self.writer, "  ffmpeg: {}", config.ffmpeg.display());
        let _ = writeln!(self.writer, "  ffprobe: {}", config.ffprobe.display());
        let _ = writeln!(self.writer, "  dryrun: {}", config.dryrun);
        let _ = self.writer.flush();
    }

    /// Log when starting to encode a file
    pub(crate) fn log_start(&mut self, file_path: &Path, file_index: &str, info: &MediaInfo, plan: &EncodingPlan) {
        let _ = writeln!(
            self.writer,
            "[{}] START   {} - \"{}\" | {} {}x{} {:.1}s | -> {}p {} kbps{}",
            Self::timestamp(),
            file_index,
            file_path.display(),
            info.codec,
            info.width,
            info.height,
            info.duration,
            plan.target_height,
            plan.target_video_kbps,
            if plan.include_audio {
                format!(" + {} kbps audio", plan.audio_kbps)
            } else {
                String::new()
            }
        );
        let _ = self.writer.flush();
    }

    /// Log a pass-through copy
    pub(crate) fn log_copy(&mut self, file_path: &Path, file_index: &str, output: &Path) {
        let _ = writeln!(
            self.writer,
            "[{}] COPY    {} - \"{}\" -> \"{}\"",
            Self::timestamp(),
            file_index,
            file_path.display(),
            output.display()
        );
        let _ = self.writer.flush();
    }

    /// Log when an encode finishes successfully
    pub(crate) fn log_success(&mut self, file_index: &str, duration: Duration, result: &ConversionResult) {
        let _ = writeln!(
            self.writer,
            "[{}] SUCCESS {} - \"{}\" | {} | Time: {}",
            Self::timestamp(),
            file_index,
            result.output_path.display(),
            discord_tools::format_size(result.output_size_bytes),
            discord_tools::format_duration(duration)
        );
        let _ = self.writer.flush();
    }

    /// Log a non-fatal problem
    pub(crate) fn log_warning(&mut self, file_index: &str, message: &str) {
        let _ = writeln!(self.writer, "[{}] WARN    {} - {}", Self::timestamp(), file_index, message);
        let _ = self.writer.flush();
    }

    /// Log when processing a file fails
    pub(crate) fn log_failure(&mut self, file_path: &Path, file_index: &str, kind: &str, error: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] ERROR   {} - \"{}\" | {} | {}",
            Self::timestamp(),
            file_index,
            file_path.display(),
            kind,
            error.replace('\n', " | ")
        );
        let _ = self.writer.flush();
    }

    /// Log final statistics
    pub(crate) fn log_stats(&mut self, stats: &RunStats) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Files converted:  {}", stats.files_converted);
        let _ = writeln!(self.writer, "  Files copied:     {}", stats.files_copied);
        let _ = writeln!(self.writer, "  Over size limit:  {}", stats.files_over_limit);
        let _ = writeln!(self.writer, "  Files failed:     {}", stats.files_failed());
        for input in &stats.failed_inputs {
            let _ = writeln!(self.writer, "    - {}", input.display());
        }
        let _ = writeln!(
            self.writer,
            "  Total output size: {}",
            discord_tools::format_size(stats.total_output_size)
        );
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            discord_tools::format_duration(stats.total_duration)
        );
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}
