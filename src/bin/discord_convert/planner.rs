use crate::budget::available_video_bits_per_second;
use crate::error::ConvertError;
use crate::ladder::ResolutionLadder;
use crate::probe::MediaInfo;

/// Video codec name of the target format as reported by ffprobe.
pub const TARGET_CODEC: &str = "h264";
/// Target container extension.
pub const TARGET_EXTENSION: &str = "mp4";

/// Encoding parameters computed once per input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPlan {
    /// Even output height, never above the source height
    pub target_height: u32,
    pub target_video_kbps: u32,
    pub include_audio: bool,
    pub audio_kbps: u32,
    pub source_height: u32,
    /// False when the ladder had to fall back below its lowest bitrate floor
    pub meets_floor: bool,
}

/// What to do with one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    /// Input already satisfies the size, codec and container constraints.
    PassThrough,
    /// Input needs a two-pass encode.
    Encode(EncodingPlan),
}

/// Turns media info into an encoding plan under a fixed size budget.
#[derive(Debug, Clone)]
pub struct EncodingPlanner {
    /// Working target for the encoded file
    pub target_size_bytes: u64,
    /// Hard ceiling; inputs at or below it can pass through unchanged
    pub size_limit_bytes: u64,
    pub audio_kbps: u32,
    pub ladder: ResolutionLadder,
}

impl EncodingPlanner {
    /// Decide between pass-through and an encode plan.
    ///
    /// Resolution is reduced before quality: the ladder picks the highest
    /// height the available bitrate can still make legible.
    ///
    /// # Errors
    /// Returns [`ConvertError::BudgetInfeasible`] if the audio reservation leaves
    /// no bitrate for video.
    pub fn plan(&self, info: &MediaInfo) -> Result<PlanDecision, ConvertError> {
        if self.is_pass_through(info) {
            return Ok(PlanDecision::PassThrough);
        }

        let available_bps =
            available_video_bits_per_second(self.target_size_bytes, info.duration, info.has_audio, self.audio_kbps)?;

        let target_video_kbps = (available_bps / 1000.0).round() as u32;
        if target_video_kbps == 0 {
            return Err(ConvertError::BudgetInfeasible {
                duration: info.duration,
                target_bytes: self.target_size_bytes,
                audio_kbps: self.audio_kbps,
            });
        }

        let choice = self.ladder.choose(info.height, target_video_kbps);

        // Never upscale, and H.264 with yuv420p needs an even height.
        // `MediaInfo` guarantees a height of at least 2.
        let target_height = choice.height.min(info.height) & !1;

        Ok(PlanDecision::Encode(EncodingPlan {
            target_height,
            target_video_kbps,
            include_audio: info.has_audio,
            audio_kbps: self.audio_kbps,
            source_height: info.height,
            meets_floor: choice.meets_floor,
        }))
    }

    fn is_pass_through(&self, info: &MediaInfo) -> bool {
        info.size_bytes <= self.size_limit_bytes && info.codec == TARGET_CODEC && info.extension == TARGET_EXTENSION
    }
}

impl EncodingPlan {
    /// Scale filter keeping the aspect ratio with an even width.
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.target_height)
    }

    pub const fn is_downscaled(&self) -> bool {
        self.target_height < self.source_height
    }
}
