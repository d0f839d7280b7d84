//! Core library for the Clip Sync Previewer.
//!
//! A preview is a sequence of narrated lines. Each line plays a run of video
//! clips while its narration runs, with every clip sped up or slowed down by
//! one shared factor so the clips end exactly when the narration does. Lines
//! follow each other without gaps once the viewer presses play.
//!
//! The crate is split by concern: [`params`] decodes what the page is told to
//! play, [`sync`] derives playback rates, [`timeline`] lays out the expected
//! schedule, [`player`] is the event-driven state machine front ends embed,
//! [`preload`] lists the assets to fetch ahead of time and [`sim`] replays a
//! preview against a virtual clock.

pub mod config;
pub mod error;
pub mod params;
pub mod player;
pub mod preload;
pub mod sim;
pub mod sync;
pub mod timeline;

pub use config::PlayerConfig;
pub use error::{PreviewerError, Result};
pub use params::{Clip, Line, PreviewParams};
pub use player::{Command, CommandSink, Event, Phase, Previewer};
pub use preload::{AssetKind, PreloadEntry, PreloadManifest};
pub use sim::{LineReport, NullSink, Simulation, SimulationReport, TraceEntry, TraceEvent};
pub use sync::{line_speed, LineTiming, RateLimits};
pub use timeline::{plan, PlaybackClock, PlannedClip, PlannedLine, ScheduledEvent, Scheduler, Timeline};
