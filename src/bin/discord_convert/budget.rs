use crate::error::ConvertError;

/// Bits per second left for the video stream once audio is reserved.
///
/// The whole `target_total_bytes` is spread evenly over `duration_seconds`.
/// With audio, `audio_kbps * 1000 * duration_seconds` bits are reserved first.
///
/// # Errors
/// Returns [`ConvertError::BudgetInfeasible`] if nothing is left for video.
/// The caller must not clamp this to some minimum bitrate instead.
pub fn available_video_bits_per_second(
    target_total_bytes: u64,
    duration_seconds: f64,
    has_audio: bool,
    audio_kbps: u32,
) -> Result<f64, ConvertError> {
    let infeasible = || ConvertError::BudgetInfeasible {
        duration: duration_seconds,
        target_bytes: target_total_bytes,
        audio_kbps,
    };

    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(infeasible());
    }

    let target_bits = target_total_bytes as f64 * 8.0;
    let audio_bits = if has_audio {
        f64::from(audio_kbps) * 1000.0 * duration_seconds
    } else {
        0.0
    };

    let video_bits = target_bits - audio_bits;
    if video_bits <= 0.0 {
        return Err(infeasible());
    }

    Ok(video_bits / duration_seconds)
}
