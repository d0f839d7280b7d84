//! Playback speed computation.
//!
//! Each line plays its clips back to back while its narration runs. The clips
//! are sped up or slowed down by one common factor so that together they last
//! exactly as long as the narration.

use serde::{Deserialize, Serialize};

use crate::{Line, PreviewerError, Result};

/// Default lower bound browsers accept for `playbackRate`.
pub const MIN_MEDIA_RATE: f64 = 0.0625;
/// Default upper bound browsers accept for `playbackRate`.
pub const MAX_MEDIA_RATE: f64 = 16.0;
/// Longest wall-clock time a single clip may occupy. Browser timers take a
/// signed 32-bit millisecond delay.
pub const MAX_CLIP_WALL_SECONDS: f64 = i32::MAX as f64 / 1000.0;

/// Inclusive range of playback rates the media backend honours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            min: MIN_MEDIA_RATE,
            max: MAX_MEDIA_RATE,
        }
    }
}

impl RateLimits {
    /// Places no practical bound on the rate.
    pub fn unbounded() -> Self {
        Self {
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        }
    }

    /// Both bounds must be finite with `0 < min <= max`.
    pub fn validate(&self) -> Result<()> {
        let ordered = self.min.is_finite()
            && self.max.is_finite()
            && self.min > 0.0
            && self.min <= self.max;
        if ordered {
            Ok(())
        } else {
            Err(PreviewerError::InvalidInput(format!(
                "rate limits must satisfy 0 < min <= max, got min = {}, max = {}",
                self.min, self.max
            )))
        }
    }

    pub fn clamp(&self, rate: f64) -> f64 {
        rate.clamp(self.min, self.max)
    }

    pub fn contains(&self, rate: f64) -> bool {
        (self.min..=self.max).contains(&rate)
    }
}

/// Ratio of a line's total clip length to its narration length.
pub fn line_speed(line: &Line) -> Result<f64> {
    if !line.audio_duration.is_finite() || line.audio_duration <= 0.0 {
        return Err(PreviewerError::InvalidInput(format!(
            "cannot derive a playback speed from an audio duration of {}",
            line.audio_duration
        )));
    }
    Ok(line.total_video_duration() / line.audio_duration)
}

/// How one line plays out once the rate has been decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineTiming {
    /// Exact speed that would make the clips span the narration.
    pub speed: f64,
    /// Rate actually handed to the media elements.
    pub rate: f64,
    /// Narration length in seconds.
    pub audio_duration: f64,
    /// Wall-clock length of every clip at `rate`.
    pub clip_durations: Vec<f64>,
}

impl LineTiming {
    pub fn for_line(line: &Line, limits: &RateLimits) -> Result<Self> {
        limits.validate()?;
        let speed = line_speed(line)?;
        let rate = limits.clamp(speed);
        if rate != speed {
            tracing::warn!(
                speed,
                rate,
                "line speed is outside the supported range; clips will not span the narration"
            );
        }

        let clip_durations = line
            .videos
            .iter()
            .map(|clip| clip.video_duration / rate)
            .collect::<Vec<_>>();

        if let Some(index) = clip_durations
            .iter()
            .position(|duration| !duration.is_finite() || *duration > MAX_CLIP_WALL_SECONDS)
        {
            return Err(PreviewerError::InvalidInput(format!(
                "clip {index} would play for {} seconds at rate {rate}, longer than {MAX_CLIP_WALL_SECONDS} seconds",
                clip_durations[index]
            )));
        }

        Ok(Self {
            speed,
            rate,
            audio_duration: line.audio_duration,
            clip_durations,
        })
    }

    /// Total wall-clock time the clips occupy.
    pub fn wall_duration(&self) -> f64 {
        self.clip_durations.iter().sum()
    }

    /// Seconds by which the clips overrun (positive) or fall short of
    /// (negative) the narration. Zero unless the rate was clamped.
    pub fn drift(&self) -> f64 {
        self.wall_duration() - self.audio_duration
    }

    pub fn is_clamped(&self) -> bool {
        self.rate != self.speed
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Clip;

    fn line(durations: &[f64], audio: f64) -> Line {
        let videos = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Clip::new(format!("clip{i}.mp4"), *d))
            .collect();
        Line::new(videos, "narration.mp3", audio)
    }

    #[test]
    fn speed_is_total_video_over_audio() {
        let speed = line_speed(&line(&[3.0, 5.0], 4.0)).unwrap();
        assert!((speed - 2.0).abs() < 1e-12);

        let speed = line_speed(&line(&[1.0], 4.0)).unwrap();
        assert!((speed - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_audio_duration_is_rejected() {
        assert!(line_speed(&line(&[1.0], 0.0)).is_err());
        assert!(line_speed(&line(&[1.0], f64::INFINITY)).is_err());
    }

    #[test]
    fn clips_span_the_narration() {
        let timing = LineTiming::for_line(&line(&[2.0, 6.0, 4.0], 3.0), &RateLimits::default())
            .unwrap();
        assert!((timing.rate - 4.0).abs() < 1e-12);
        assert_eq!(timing.clip_durations, vec![0.5, 1.5, 1.0]);
        assert!(timing.drift().abs() < 1e-9);
        assert!(!timing.is_clamped());
    }

    #[test]
    fn clamped_rate_reports_drift() {
        let limits = RateLimits { min: 0.5, max: 2.0 };
        let timing = LineTiming::for_line(&line(&[10.0], 1.0), &limits).unwrap();
        assert_eq!(timing.rate, 2.0);
        assert!(timing.is_clamped());
        assert!((timing.drift() - 4.0).abs() < 1e-9);

        let timing = LineTiming::for_line(&line(&[1.0], 10.0), &limits).unwrap();
        assert_eq!(timing.rate, 0.5);
        assert!((timing.drift() + 8.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_or_nan_limits_are_rejected() {
        let inverted = RateLimits { min: 4.0, max: 1.0 };
        let err = LineTiming::for_line(&line(&[1.0], 1.0), &inverted).unwrap_err();
        assert!(matches!(err, PreviewerError::InvalidInput(_)));

        assert!(RateLimits { min: f64::NAN, max: 1.0 }.validate().is_err());
        assert!(RateLimits { min: 0.0, max: 1.0 }.validate().is_err());
        assert!(RateLimits::default().validate().is_ok());
        assert!(RateLimits::unbounded().validate().is_ok());
    }

    #[test]
    fn clips_too_long_for_a_timer_are_rejected() {
        let err = LineTiming::for_line(&line(&[1e300], 1e299), &RateLimits::default()).unwrap_err();
        assert!(format!("{err}").contains("clip 0"));

        let longest = MAX_CLIP_WALL_SECONDS;
        assert!(LineTiming::for_line(&line(&[longest], longest), &RateLimits::default()).is_ok());
    }

    proptest! {
        #[test]
        fn unclamped_clips_always_span_the_narration(
            durations in prop::collection::vec(0.05f64..120.0, 1..12),
            audio in 0.5f64..300.0,
        ) {
            let timing = LineTiming::for_line(&line(&durations, audio), &RateLimits::unbounded())
                .unwrap();
            prop_assert!((timing.wall_duration() - audio).abs() < 1e-6 * audio.max(1.0));
        }
    }
}
