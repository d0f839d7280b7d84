//! Deterministic playback against a virtual clock.
//!
//! The simulator stands in for the browser: media clips end exactly after
//! `video_duration / rate` seconds and timers fire exactly on time. It is used
//! by the command line tool to dry-run a preview URL and by tests to check
//! that lines really do span their narration.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    timeline::{self, PlaybackClock, ScheduledEvent, Scheduler, Timeline},
    Command, CommandSink, Event, PlayerConfig, PreviewParams, Previewer, PreviewerError, Result,
};

/// What happened at a point in virtual time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraceEvent {
    Event(Event),
    Command(Command),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub time: f64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

/// Observed timing of one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineReport {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub audio_duration: f64,
}

impl LineReport {
    /// Seconds the clips overran (positive) or fell short of the narration.
    pub fn drift(&self) -> f64 {
        (self.end - self.start) - self.audio_duration
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub lines: Vec<LineReport>,
    pub finish_time: f64,
    /// Largest gap between an observed line boundary and the planned one.
    pub max_plan_deviation: f64,
    pub steps: usize,
    pub trace: Vec<TraceEntry>,
}

/// Drives a [`Previewer`] from the play button to the finished state.
#[derive(Debug)]
pub struct Simulation {
    previewer: Previewer,
    plan: Timeline,
    clock: PlaybackClock,
    scheduler: Scheduler<Event>,
    mounted_rates: HashMap<(usize, usize), f64>,
    line_starts: Vec<Option<f64>>,
    line_ends: Vec<Option<f64>>,
    finish_time: Option<f64>,
    trace: Vec<TraceEntry>,
}

impl Simulation {
    pub fn new(params: PreviewParams, config: PlayerConfig) -> Result<Self> {
        let plan = timeline::plan(&params, &config)?;
        let line_count = params.lines.len();
        let previewer = Previewer::new(params, config)?;
        Ok(Self {
            previewer,
            plan,
            clock: PlaybackClock::default(),
            scheduler: Scheduler::new(),
            mounted_rates: HashMap::new(),
            line_starts: vec![None; line_count],
            line_ends: vec![None; line_count],
            finish_time: None,
            trace: Vec::new(),
        })
    }

    pub fn plan(&self) -> &Timeline {
        &self.plan
    }

    /// Presses play at t = 0 and runs until the preview finishes.
    pub fn run(mut self) -> Result<SimulationReport> {
        let max_steps = self.previewer.config().max_simulation_steps;

        let mut commands = Vec::new();
        self.previewer.mount(&mut commands);
        self.apply(commands)?;
        self.deliver(Event::PlayPressed)?;

        let mut steps = 1;
        while !self.previewer.is_finished() {
            if steps >= max_steps {
                return Err(PreviewerError::msg(format!(
                    "simulation did not finish within {max_steps} steps"
                )));
            }
            let due = self.scheduler.next_due().ok_or_else(|| {
                PreviewerError::msg(format!(
                    "playback stalled in {:?} with nothing scheduled",
                    self.previewer.phase()
                ))
            })?;
            self.clock.advance_to(due);
            while let Some(scheduled) = self.scheduler.pop_due(&self.clock) {
                tracing::trace!(time = self.clock.time_seconds(), label = %scheduled.label, "firing");
                self.deliver(scheduled.payload)?;
                steps += 1;
            }
        }

        self.into_report(steps)
    }

    fn deliver(&mut self, event: Event) -> Result<()> {
        self.record(TraceEvent::Event(event));
        let mut commands = Vec::new();
        self.previewer.dispatch(event, &mut commands);
        self.apply(commands)
    }

    fn apply(&mut self, commands: Vec<Command>) -> Result<()> {
        let now = self.clock.time_seconds();
        for command in commands {
            match &command {
                Command::MountClip {
                    line, clip, rate, ..
                } => {
                    self.mounted_rates.insert((*line, *clip), *rate);
                }
                Command::ScheduleStart { delay } => {
                    self.scheduler.schedule(ScheduledEvent::new(
                        now + delay.as_secs_f64(),
                        "start delay",
                        Event::StartDelayElapsed,
                    ));
                }
                Command::PlayClip { line, clip } => {
                    let rate = self.mounted_rates.get(&(*line, *clip)).copied().ok_or_else(|| {
                        PreviewerError::msg(format!("clip {clip} of line {line} played before mount"))
                    })?;
                    let natural = self.previewer.params().lines[*line].videos[*clip].video_duration;
                    self.scheduler.schedule(ScheduledEvent::new(
                        now + natural / rate,
                        format!("line {line} clip {clip} ended"),
                        Event::ClipEnded {
                            line: *line,
                            clip: *clip,
                        },
                    ));
                    self.mark_clip_start(*line, *clip, now);
                }
                Command::StartPlaceholderTimer { line, clip, wait } => {
                    self.scheduler.schedule(ScheduledEvent::new(
                        now + wait.as_secs_f64(),
                        format!("line {line} placeholder {clip} elapsed"),
                        Event::PlaceholderElapsed {
                            line: *line,
                            clip: *clip,
                        },
                    ));
                    self.mark_clip_start(*line, *clip, now);
                }
                Command::MarkFinished => {
                    self.close_open_line(now);
                    self.finish_time = Some(now);
                }
                _ => {}
            }
            self.record(TraceEvent::Command(command));
        }
        Ok(())
    }

    fn mark_clip_start(&mut self, line: usize, clip: usize, now: f64) {
        if clip == 0 {
            self.close_open_line(now);
            self.line_starts[line] = Some(now);
        }
    }

    fn close_open_line(&mut self, now: f64) {
        let open = self
            .line_starts
            .iter()
            .zip(&self.line_ends)
            .position(|(start, end)| start.is_some() && end.is_none());
        if let Some(index) = open {
            self.line_ends[index] = Some(now);
        }
    }

    fn record(&mut self, event: TraceEvent) {
        self.trace.push(TraceEntry {
            time: self.clock.time_seconds(),
            event,
        });
    }

    fn into_report(self, steps: usize) -> Result<SimulationReport> {
        let finish_time = self
            .finish_time
            .ok_or_else(|| PreviewerError::msg("simulation ended without finishing"))?;

        let mut lines = Vec::with_capacity(self.plan.lines.len());
        let mut max_plan_deviation: f64 = 0.0;
        for (planned, (start, end)) in self
            .plan
            .lines
            .iter()
            .zip(self.line_starts.iter().zip(&self.line_ends))
        {
            let (Some(start), Some(end)) = (*start, *end) else {
                return Err(PreviewerError::msg(format!(
                    "line {} never played",
                    planned.index
                )));
            };
            max_plan_deviation = max_plan_deviation
                .max((start - planned.start).abs())
                .max((end - planned.end).abs());
            lines.push(LineReport {
                index: planned.index,
                start,
                end,
                audio_duration: planned.audio_duration,
            });
        }

        Ok(SimulationReport {
            lines,
            finish_time,
            max_plan_deviation,
            steps,
            trace: self.trace,
        })
    }
}

/// Sink that discards every command. Handy for driving the state machine when
/// only its phase matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn execute(&mut self, _command: Command) {}
}
