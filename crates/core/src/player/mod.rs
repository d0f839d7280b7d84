//! Playback state machine.
//!
//! [`Previewer`] never touches media directly. Front ends feed it [`Event`]s
//! as they happen (button clicks, `ended` callbacks, timers) and carry out the
//! [`Command`]s it hands back through a [`CommandSink`].

use std::time::Duration;

use serde::Serialize;

use crate::{sync::LineTiming, PlayerConfig, PreviewParams, Result};

/// Where the previewer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the user to press play.
    Idle,
    /// Play was pressed; the start delay is running.
    Arming,
    /// A clip of a line is on screen.
    Playing { line: usize, clip: usize },
    /// Every line has played out.
    Finished,
}

/// Something that happened outside the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PlayPressed,
    StartDelayElapsed,
    /// A media clip reached its end.
    ClipEnded { line: usize, clip: usize },
    /// The timer standing in for a placeholder clip fired.
    PlaceholderElapsed { line: usize, clip: usize },
}

/// Work for the front end to carry out, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Create a hidden, muted, preloading video element for a clip.
    MountClip {
        line: usize,
        clip: usize,
        src: String,
        rate: f64,
    },
    /// Create a preloading audio element for a line's narration.
    MountLineAudio { line: usize, src: String },
    /// Create the single preloading audio element for the global voice-over.
    MountVoiceOver { src: String },
    ShowPlayButton,
    HidePlayButton,
    /// Deliver [`Event::StartDelayElapsed`] after `delay`.
    ScheduleStart {
        #[serde(with = "duration_secs")]
        delay: Duration,
    },
    PlayVoiceOver,
    PlayLineAudio { line: usize },
    ShowClip { line: usize, clip: usize },
    PlayClip { line: usize, clip: usize },
    /// Deliver [`Event::PlaceholderElapsed`] after `wait`.
    StartPlaceholderTimer {
        line: usize,
        clip: usize,
        #[serde(with = "duration_secs")]
        wait: Duration,
    },
    /// Remove a clip that has finished playing.
    UnmountClip { line: usize, clip: usize },
    /// Switch the canvas into its finished state.
    MarkFinished,
}

/// Receiver for the commands emitted by [`Previewer`].
pub trait CommandSink {
    fn execute(&mut self, command: Command);
}

impl CommandSink for Vec<Command> {
    fn execute(&mut self, command: Command) {
        self.push(command);
    }
}

/// Sequences lines and clips for one set of preview parameters.
#[derive(Debug, Clone)]
pub struct Previewer {
    params: PreviewParams,
    config: PlayerConfig,
    timings: Vec<LineTiming>,
    phase: Phase,
    mounted: bool,
}

impl Previewer {
    pub fn new(params: PreviewParams, config: PlayerConfig) -> Result<Self> {
        params.validate()?;
        config.validate()?;
        let timings = params
            .lines
            .iter()
            .map(|line| LineTiming::for_line(line, &config.rate_limits))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            lines = params.lines.len(),
            global_voice_over = params.has_global_voice_over(),
            "previewer ready"
        );

        Ok(Self {
            params,
            config,
            timings,
            phase: Phase::Idle,
            mounted: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn params(&self) -> &PreviewParams {
        &self.params
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn timings(&self) -> &[LineTiming] {
        &self.timings
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Emits every element the page needs up front so all media can preload
    /// before playback starts.
    pub fn mount(&mut self, sink: &mut impl CommandSink) {
        if self.mounted {
            tracing::debug!("previewer already mounted");
            return;
        }
        self.mounted = true;

        let global = self.params.has_global_voice_over();
        for (line_index, (line, timing)) in self.params.lines.iter().zip(&self.timings).enumerate() {
            for (clip_index, clip) in line.videos.iter().enumerate() {
                if clip.is_placeholder() {
                    continue;
                }
                sink.execute(Command::MountClip {
                    line: line_index,
                    clip: clip_index,
                    src: clip.video.clone(),
                    rate: timing.rate,
                });
            }
            if !global {
                sink.execute(Command::MountLineAudio {
                    line: line_index,
                    src: line.audio.clone(),
                });
            }
        }

        if let Some(src) = &self.params.global_voice_over {
            sink.execute(Command::MountVoiceOver { src: src.clone() });
        }
        sink.execute(Command::ShowPlayButton);
    }

    /// Feeds one event into the state machine.
    pub fn dispatch(&mut self, event: Event, sink: &mut impl CommandSink) {
        match (self.phase, event) {
            (Phase::Idle, Event::PlayPressed) => {
                tracing::info!("play pressed");
                self.phase = Phase::Arming;
                sink.execute(Command::HidePlayButton);
                sink.execute(Command::ScheduleStart {
                    delay: self.config.start_delay(),
                });
            }
            (Phase::Arming, Event::StartDelayElapsed) => {
                if self.params.has_global_voice_over() {
                    sink.execute(Command::PlayVoiceOver);
                }
                self.activate_line(0, sink);
            }
            (
                Phase::Playing { line, clip },
                Event::ClipEnded {
                    line: ended_line,
                    clip: ended_clip,
                },
            ) if (line, clip) == (ended_line, ended_clip) && !self.is_placeholder(line, clip) => {
                sink.execute(Command::UnmountClip { line, clip });
                self.advance(line, clip, sink);
            }
            (
                Phase::Playing { line, clip },
                Event::PlaceholderElapsed {
                    line: ended_line,
                    clip: ended_clip,
                },
            ) if (line, clip) == (ended_line, ended_clip) && self.is_placeholder(line, clip) => {
                self.advance(line, clip, sink);
            }
            (phase, event) => {
                tracing::debug!(?phase, ?event, "ignoring stale event");
            }
        }
    }

    fn is_placeholder(&self, line: usize, clip: usize) -> bool {
        self.params.lines[line].videos[clip].is_placeholder()
    }

    fn advance(&mut self, line: usize, clip: usize, sink: &mut impl CommandSink) {
        if clip + 1 < self.params.lines[line].videos.len() {
            self.activate_clip(line, clip + 1, sink);
        } else if line + 1 < self.params.lines.len() {
            tracing::info!(line = line + 1, "advancing to next line");
            self.activate_line(line + 1, sink);
        } else {
            tracing::info!("preview finished");
            self.phase = Phase::Finished;
            sink.execute(Command::MarkFinished);
        }
    }

    fn activate_line(&mut self, line: usize, sink: &mut impl CommandSink) {
        if !self.params.has_global_voice_over() {
            sink.execute(Command::PlayLineAudio { line });
        }
        self.activate_clip(line, 0, sink);
    }

    fn activate_clip(&mut self, line: usize, clip: usize, sink: &mut impl CommandSink) {
        self.phase = Phase::Playing { line, clip };
        if self.is_placeholder(line, clip) {
            // bounded by MAX_CLIP_WALL_SECONDS when the timing was computed
            let wait = Duration::try_from_secs_f64(self.timings[line].clip_durations[clip])
                .unwrap_or(Duration::MAX);
            sink.execute(Command::StartPlaceholderTimer { line, clip, wait });
        } else {
            sink.execute(Command::ShowClip { line, clip });
            sink.execute(Command::PlayClip { line, clip });
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
