//! Two-pass H.264 encode driven through ffmpeg.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use discord_tools::print_warning;

use crate::error::ConvertError;
use crate::planner::EncodingPlan;
use crate::process::ProcessRunner;

const FFMPEG_DEFAULT_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-y"];
const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";
const PIXEL_FORMAT: &str = "yuv420p";

#[cfg(windows)]
const NULL_SINK: &str = "NUL";
#[cfg(not(windows))]
const NULL_SINK: &str = "/dev/null";

/// Pipeline progress. `Failed` is reachable from both active states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Analyzing,
    Encoding,
    Done,
    Failed,
}

/// Runs the analysis pass and the encoding pass for one input.
///
/// The pass-log files under `passlog_prefix` are owned by one run
/// and removed afterwards whether the run succeeded or not.
pub struct TwoPassPipeline<'a, R: ProcessRunner> {
    ffmpeg: &'a Path,
    preset: &'a str,
    passlog_prefix: PathBuf,
    runner: &'a R,
    state: PipelineState,
    cleanup_failures: Vec<ConvertError>,
}

impl<'a, R: ProcessRunner> TwoPassPipeline<'a, R> {
    pub fn new(ffmpeg: &'a Path, preset: &'a str, passlog_prefix: PathBuf, runner: &'a R) -> Self {
        Self {
            ffmpeg,
            preset,
            passlog_prefix,
            runner,
            state: PipelineState::Idle,
            cleanup_failures: Vec::new(),
        }
    }

    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Pass-log files that could not be removed during the last run.
    pub fn cleanup_failures(&self) -> &[ConvertError] {
        &self.cleanup_failures
    }

    /// Encode `input` into `output` following the plan.
    ///
    /// Pass 2 only starts after pass 1 exited successfully.
    /// The pipeline does not remove a partial output file itself.
    ///
    /// # Errors
    /// Returns [`ConvertError::EncodeFailure`] with the ffmpeg diagnostic if either pass fails,
    /// or [`ConvertError::ToolNotFound`] if ffmpeg can not be started.
    pub fn run(&mut self, input: &Path, output: &Path, plan: &EncodingPlan) -> Result<(), ConvertError> {
        let result = self.run_passes(input, output, plan);

        self.state = if result.is_ok() {
            PipelineState::Done
        } else {
            PipelineState::Failed
        };

        self.remove_pass_logs();
        result
    }

    fn run_passes(&mut self, input: &Path, output: &Path, plan: &EncodingPlan) -> Result<(), ConvertError> {
        self.state = PipelineState::Analyzing;
        self.run_pass(1, &self.analysis_args(input, plan))?;

        self.state = PipelineState::Encoding;
        self.run_pass(2, &self.encoding_args(input, output, plan))
    }

    /// Arguments for pass 1: statistics only, no audio and no container output.
    pub fn analysis_args(&self, input: &Path, plan: &EncodingPlan) -> Vec<OsString> {
        let mut args = self.common_args(input, plan, 1);
        args.extend(["-an", "-f", "null", NULL_SINK].map(OsString::from));
        args
    }

    /// Arguments for pass 2: the real encode with optional AAC audio and fast start.
    pub fn encoding_args(&self, input: &Path, output: &Path, plan: &EncodingPlan) -> Vec<OsString> {
        let mut args = self.common_args(input, plan, 2);
        args.extend(["-pix_fmt", PIXEL_FORMAT].map(OsString::from));
        if plan.include_audio {
            args.extend(["-c:a".to_string(), AUDIO_CODEC.to_string()].map(OsString::from));
            args.extend(["-b:a".to_string(), format!("{}k", plan.audio_kbps)].map(OsString::from));
        } else {
            args.push("-an".into());
        }
        args.extend(["-movflags", "+faststart"].map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }

    pub fn ffmpeg(&self) -> &Path {
        self.ffmpeg
    }

    fn common_args(&self, input: &Path, plan: &EncodingPlan, pass: u8) -> Vec<OsString> {
        let mut args: Vec<OsString> = FFMPEG_DEFAULT_ARGS.iter().map(OsString::from).collect();
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-vf".to_string(),
                plan.scale_filter(),
                "-c:v".to_string(),
                VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                self.preset.to_string(),
                "-b:v".to_string(),
                format!("{}k", plan.target_video_kbps),
                "-pass".to_string(),
                pass.to_string(),
                "-passlogfile".to_string(),
            ]
            .map(OsString::from),
        );
        args.push(self.passlog_prefix.as_os_str().to_owned());
        args
    }

    fn run_pass(&self, pass: u8, args: &[OsString]) -> Result<(), ConvertError> {
        let output = self.runner.run(self.ffmpeg, args).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                ConvertError::ToolNotFound {
                    tool: discord_tools::path_to_string(self.ffmpeg),
                }
            } else {
                ConvertError::encode_failure(pass, &format!("Failed to execute ffmpeg: {error}"))
            }
        })?;

        if output.success() {
            Ok(())
        } else {
            Err(ConvertError::encode_failure(pass, &output.diagnostic()))
        }
    }

    /// Best-effort removal of every file starting with the pass-log prefix.
    fn remove_pass_logs(&mut self) {
        self.cleanup_failures.clear();

        let Some(prefix) = self.passlog_prefix.file_name().map(discord_tools::os_str_to_string) else {
            return;
        };
        let dir = self
            .passlog_prefix
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let name = discord_tools::os_str_to_string(&entry.file_name());
            if !name.starts_with(&prefix) {
                continue;
            }
            let path = entry.path();
            if let Err(source) = fs::remove_file(&path) {
                let failure = ConvertError::CleanupFailure { path, source };
                print_warning!("{failure}");
                self.cleanup_failures.push(failure);
            }
        }
    }
}
