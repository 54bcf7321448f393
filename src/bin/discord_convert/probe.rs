//! Media probing with ffprobe.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConvertError;
use crate::process::ProcessRunner;

/// Shortest duration accepted from a container, in seconds.
/// Anything shorter is treated as corrupt metadata.
const MIN_DURATION_SECONDS: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// First video stream of a probed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

/// The parts of the ffprobe output the conversion needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub video: Option<VideoStream>,
    pub has_audio: bool,
    pub duration: Option<f64>,
}

/// Information about an input file with a usable video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds, always positive
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Video codec name as reported by ffprobe (e.g. "h264")
    pub codec: String,
    pub has_audio: bool,
    /// Lowercase file extension without the dot
    pub extension: String,
    pub size_bytes: u64,
}

/// ffprobe wrapper.
pub struct MediaProbe<'a, R: ProcessRunner> {
    program: PathBuf,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> MediaProbe<'a, R> {
    pub fn new(program: impl Into<PathBuf>, runner: &'a R) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// Run ffprobe on the given file and parse its JSON output.
    ///
    /// # Errors
    /// Returns [`ConvertError::ToolNotFound`] if ffprobe can not be started,
    /// and [`ConvertError::ProbeFailure`] with the tool diagnostic on a non-zero exit
    /// or unparseable output.
    pub fn probe(&self, path: &Path) -> Result<ProbeReport, ConvertError> {
        let args: Vec<OsString> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ]
        .iter()
        .map(OsString::from)
        .chain(std::iter::once(path.as_os_str().to_owned()))
        .collect();

        let output = self.runner.run(&self.program, &args).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                ConvertError::ToolNotFound {
                    tool: discord_tools::path_to_string(&self.program),
                }
            } else {
                ConvertError::Io(error)
            }
        })?;

        if !output.success() {
            return Err(ConvertError::probe_failure(&output.diagnostic()));
        }

        parse_probe_output(&output.stdout)
    }
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
///
/// # Errors
/// Returns [`ConvertError::ProbeFailure`] for malformed JSON.
pub fn parse_probe_output(json: &str) -> Result<ProbeReport, ConvertError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|error| ConvertError::probe_failure(&format!("Invalid ffprobe output: {error}")))?;

    let video = output
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .map(|stream| VideoStream {
            codec: stream.codec_name.as_deref().unwrap_or("?").to_lowercase(),
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
        });

    let has_audio = output
        .streams
        .iter()
        .any(|stream| stream.codec_type.as_deref() == Some("audio"));

    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok());

    Ok(ProbeReport {
        video,
        has_audio,
        duration,
    })
}

impl MediaInfo {
    /// Combine a probe report with file facts into media info.
    ///
    /// # Errors
    /// Returns [`ConvertError::NoVideoStream`] if the report has no video stream,
    /// and [`ConvertError::ProbeFailure`] if the duration or dimensions are missing or unusable.
    pub fn from_probe(report: ProbeReport, path: &Path, size_bytes: u64) -> Result<Self, ConvertError> {
        let Some(video) = report.video else {
            return Err(ConvertError::NoVideoStream { path: path.to_path_buf() });
        };

        // H.264 with yuv420p needs at least two lines
        if video.width == 0 || video.height < 2 {
            return Err(ConvertError::probe_failure(&format!(
                "Invalid video dimensions {}x{}",
                video.width, video.height
            )));
        }

        let duration = match report.duration {
            Some(duration) if duration.is_finite() && duration >= MIN_DURATION_SECONDS => duration,
            Some(duration) => {
                return Err(ConvertError::probe_failure(&format!("Invalid video duration {duration}s")));
            }
            None => return Err(ConvertError::probe_failure("Could not determine video duration")),
        };

        Ok(Self {
            duration,
            width: video.width,
            height: video.height,
            codec: video.codec,
            has_audio: report.has_audio,
            extension: discord_tools::path_to_file_extension_string(path),
            size_bytes,
        })
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size:       {}", discord_tools::format_size(self.size_bytes))?;
        writeln!(
            f,
            "Duration:   {}",
            discord_tools::format_duration_seconds(self.duration)
        )?;
        writeln!(f, "Resolution: {}x{}", self.width, self.height)?;
        write!(
            f,
            "Codec:      {}{}",
            self.codec,
            if self.has_audio { "" } else { " (no audio)" }
        )
    }
}

#[cfg(test)]
mod probe_tests {
    use super::*;

    use crate::process::fake::{FakeRunner, failed, ok};

    const H264_WITH_AUDIO: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2}
        ],
        "format": {"filename": "clip.mkv", "duration": "63.480000", "size": "48000000"}
    }"#;

    #[test]
    fn parses_video_and_audio_streams() {
        let report = parse_probe_output(H264_WITH_AUDIO).unwrap();
        assert_eq!(
            report.video,
            Some(VideoStream {
                codec: "h264".to_string(),
                width: 1920,
                height: 1080
            })
        );
        assert!(report.has_audio);
        assert_eq!(report.duration, Some(63.48));
    }

    #[test]
    fn audio_only_file_has_no_video() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {"duration": "12.0"}}"#;
        let report = parse_probe_output(json).unwrap();
        assert!(report.video.is_none());

        let error = MediaInfo::from_probe(report, Path::new("song.mp3"), 100).unwrap_err();
        assert!(matches!(error, ConvertError::NoVideoStream { .. }));
    }

    #[test]
    fn first_video_stream_wins() {
        let json = r#"{"streams": [
            {"codec_type": "video", "codec_name": "mjpeg", "width": 320, "height": 240},
            {"codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160}
        ], "format": {"duration": "5"}}"#;
        let report = parse_probe_output(json).unwrap();
        assert_eq!(report.video.unwrap().codec, "mjpeg");
        assert!(!report.has_audio);
    }

    #[test]
    fn malformed_output_is_probe_failure() {
        let error = parse_probe_output("not json").unwrap_err();
        assert!(matches!(error, ConvertError::ProbeFailure { .. }));
    }

    #[test]
    fn media_info_requires_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360}], "format": {}}"#;
        let report = parse_probe_output(json).unwrap();
        let error = MediaInfo::from_probe(report, Path::new("clip.webm"), 100).unwrap_err();
        assert!(matches!(error, ConvertError::ProbeFailure { .. }));
    }

    #[test]
    fn media_info_rejects_single_line_video() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1}], "format": {"duration": "10"}}"#;
        let report = parse_probe_output(json).unwrap();
        let error = MediaInfo::from_probe(report, Path::new("line.mp4"), 100).unwrap_err();
        assert!(error.to_string().contains("Invalid video dimensions 1920x1"));
    }

    #[test]
    fn media_info_rejects_near_zero_duration() {
        for duration in ["0.000001", "0", "-5", "nan"] {
            let json = format!(
                r#"{{"streams": [{{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}}], "format": {{"duration": "{duration}"}}}}"#
            );
            let report = parse_probe_output(&json).unwrap();
            let error = MediaInfo::from_probe(report, Path::new("clip.mkv"), 100).unwrap_err();
            assert!(matches!(error, ConvertError::ProbeFailure { .. }), "accepted duration {duration}");
        }

        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}], "format": {"duration": "0.1"}}"#;
        let report = parse_probe_output(json).unwrap();
        assert!(MediaInfo::from_probe(report, Path::new("clip.mkv"), 100).is_ok());
    }

    #[test]
    fn media_info_from_probe() {
        let report = parse_probe_output(H264_WITH_AUDIO).unwrap();
        let info = MediaInfo::from_probe(report, Path::new("/videos/Clip.MKV"), 48_000_000).unwrap();
        assert_eq!(info.extension, "mkv");
        assert_eq!(info.height, 1080);
        assert_eq!(info.size_bytes, 48_000_000);
        assert!(info.has_audio);
    }

    #[test]
    fn probe_runs_ffprobe_with_json_output() {
        let runner = FakeRunner::default();
        runner.push(Ok(ok(H264_WITH_AUDIO, "")));
        let probe = MediaProbe::new("ffprobe", &runner);

        let report = probe.probe(Path::new("clip.mkv")).unwrap();
        assert!(report.video.is_some());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("ffprobe"));
        assert!(calls[0].has_flag("-print_format", "json"));
        assert_eq!(calls[0].args.last().map(String::as_str), Some("clip.mkv"));
    }

    #[test]
    fn probe_failure_carries_tool_diagnostic() {
        let runner = FakeRunner::default();
        runner.push(Ok(failed(1, "clip.mkv: Invalid data found when processing input")));
        let probe = MediaProbe::new("ffprobe", &runner);

        let error = probe.probe(Path::new("clip.mkv")).unwrap_err();
        assert!(error.to_string().contains("Invalid data found when processing input"));
    }

    #[test]
    fn missing_ffprobe_is_tool_not_found() {
        let runner = FakeRunner::default();
        runner.push(Err(io::Error::new(io::ErrorKind::NotFound, "no such file")));
        let probe = MediaProbe::new("ffprobe", &runner);

        let error = probe.probe(Path::new("clip.mkv")).unwrap_err();
        assert!(matches!(error, ConvertError::ToolNotFound { .. }));
    }
}
