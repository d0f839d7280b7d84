use serde::Serialize;

use crate::{sync::LineTiming, PlayerConfig, PreviewParams, Result};

/// Virtual time in seconds. Only ever moves forward.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta.max(0.0)).max(0.0);
    }

    /// Jumps forward to `time`. Earlier times leave the clock untouched.
    pub fn advance_to(&mut self, time: f64) {
        if time > self.time_seconds {
            self.time_seconds = time;
        }
    }

    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEvent<T> {
    pub time_seconds: f64,
    pub label: String,
    pub payload: T,
}

impl<T> ScheduledEvent<T> {
    pub fn new(time_seconds: f64, label: impl Into<String>, payload: T) -> Self {
        Self {
            time_seconds,
            label: label.into(),
            payload,
        }
    }
}

/// Pending wake-ups ordered by time. Events sharing a time fire in the order
/// they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    events: Vec<ScheduledEvent<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, event: ScheduledEvent<T>) {
        let position = self
            .events
            .partition_point(|queued| queued.time_seconds <= event.time_seconds);
        self.events.insert(position, event);
    }

    /// Time of the earliest pending event.
    pub fn next_due(&self) -> Option<f64> {
        self.events.first().map(|event| event.time_seconds)
    }

    /// Removes and returns the earliest event if the clock has reached it.
    pub fn pop_due(&mut self, clock: &PlaybackClock) -> Option<ScheduledEvent<T>> {
        match self.events.first() {
            Some(event) if event.time_seconds <= clock.time_seconds => Some(self.events.remove(0)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedClip {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedLine {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub speed: f64,
    pub rate: f64,
    pub audio_duration: f64,
    pub clips: Vec<PlannedClip>,
}

/// Expected wall-clock layout of a preview, measured from the moment the play
/// button is pressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub start_delay: f64,
    pub lines: Vec<PlannedLine>,
}

impl Timeline {
    /// Time at which the last clip of the last line ends.
    pub fn total_seconds(&self) -> f64 {
        self.lines
            .last()
            .map(|line| line.end)
            .unwrap_or(self.start_delay)
    }
}

/// Lays out every line and clip back to back after the start delay.
pub fn plan(params: &PreviewParams, config: &PlayerConfig) -> Result<Timeline> {
    config.validate()?;
    let start_delay = config.start_delay().as_secs_f64();
    let mut cursor = start_delay;
    let mut lines = Vec::with_capacity(params.lines.len());

    for (index, line) in params.lines.iter().enumerate() {
        let timing = LineTiming::for_line(line, &config.rate_limits)?;
        let start = cursor;
        let clips = line
            .videos
            .iter()
            .zip(&timing.clip_durations)
            .enumerate()
            .map(|(clip_index, (clip, duration))| {
                let clip_start = cursor;
                cursor += duration;
                PlannedClip {
                    index: clip_index,
                    start: clip_start,
                    end: cursor,
                    placeholder: clip.is_placeholder(),
                }
            })
            .collect();

        lines.push(PlannedLine {
            index,
            start,
            end: cursor,
            speed: timing.speed,
            rate: timing.rate,
            audio_duration: timing.audio_duration,
            clips,
        });
    }

    Ok(Timeline { start_delay, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clip, Line};

    #[test]
    fn clock_never_runs_backwards() {
        let mut clock = PlaybackClock::default();
        clock.advance(1.5);
        clock.advance(-3.0);
        clock.advance_to(1.0);
        assert_eq!(clock.time_seconds(), 1.5);
        clock.advance_to(2.0);
        assert_eq!(clock.time_seconds(), 2.0);
        clock.reset();
        assert_eq!(clock.time_seconds(), 0.0);
    }

    #[test]
    fn scheduler_pops_in_time_then_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(ScheduledEvent::new(2.0, "late", 'c'));
        scheduler.schedule(ScheduledEvent::new(1.0, "first", 'a'));
        scheduler.schedule(ScheduledEvent::new(1.0, "second", 'b'));
        assert_eq!(scheduler.len(), 3);
        assert_eq!(scheduler.next_due(), Some(1.0));

        let mut clock = PlaybackClock::default();
        assert!(scheduler.pop_due(&clock).is_none());

        clock.advance_to(1.0);
        assert_eq!(scheduler.pop_due(&clock).unwrap().payload, 'a');
        assert_eq!(scheduler.pop_due(&clock).unwrap().payload, 'b');
        assert!(scheduler.pop_due(&clock).is_none());

        clock.advance_to(5.0);
        assert_eq!(scheduler.pop_due(&clock).unwrap().label, "late");
        assert!(scheduler.is_empty());
    }

    #[test]
    fn inverted_rate_limits_fail_planning() {
        let params = PreviewParams::new(vec![Line::new(vec![Clip::new("a", 1.0)], "l0", 1.0)]);
        let config = PlayerConfig {
            rate_limits: crate::RateLimits { min: 4.0, max: 1.0 },
            ..PlayerConfig::default()
        };
        assert!(matches!(
            plan(&params, &config),
            Err(crate::PreviewerError::InvalidInput(_))
        ));
    }

    #[test]
    fn plans_gapless_lines_after_the_start_delay() {
        let params = PreviewParams::new(vec![
            Line::new(vec![Clip::new("a", 2.0), Clip::placeholder(2.0)], "l0", 2.0),
            Line::new(vec![Clip::new("b", 1.0)], "l1", 4.0),
        ]);
        let timeline = plan(&params, &PlayerConfig::default()).unwrap();

        assert_eq!(timeline.start_delay, 1.0);
        let first = &timeline.lines[0];
        assert_eq!((first.start, first.end), (1.0, 3.0));
        assert_eq!(first.rate, 2.0);
        assert_eq!((first.clips[1].start, first.clips[1].end), (2.0, 3.0));
        assert!(first.clips[1].placeholder);

        let second = &timeline.lines[1];
        assert_eq!(second.start, first.end);
        assert_eq!(second.rate, 0.25);
        assert_eq!(timeline.total_seconds(), 7.0);
    }
}
