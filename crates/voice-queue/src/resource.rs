//! Playback resource port.
//!
//! A [`ResourceProvider`] turns a [`ClipReference`] into a live [`PlaybackResource`].
//! Resources report readiness, completion and failure asynchronously through a
//! [`ClipEventSink`], which tags every event with the owning sequence id and the clip
//! generation so the scheduler can drop events from resources it already abandoned.

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::clip::ClipReference;

/// Process-unique id of a clip sequence.
pub type SequenceId = u64;

/// Identifies one clip attempt of one sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClipTicket {
    pub sequence: SequenceId,
    /// Bumped every time the sequence opens its next clip.
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClipEventKind {
    /// The resource has buffered enough to start.
    Ready,
    /// Playback ran to the end of the clip.
    Ended,
    /// Loading, decoding or output failed.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipEvent {
    pub ticket: ClipTicket,
    pub kind: ClipEventKind,
}

/// Sending half handed to a resource when it is opened.
#[derive(Clone, Debug)]
pub struct ClipEventSink {
    ticket: ClipTicket,
    tx: Sender<ClipEvent>,
}

impl ClipEventSink {
    pub fn new(ticket: ClipTicket, tx: Sender<ClipEvent>) -> Self {
        Self { ticket, tx }
    }

    pub fn ticket(&self) -> ClipTicket {
        self.ticket
    }

    pub fn ready(&self) {
        self.send(ClipEventKind::Ready);
    }

    pub fn ended(&self) {
        self.send(ClipEventKind::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(ClipEventKind::Failed(reason.into()));
    }

    fn send(&self, kind: ClipEventKind) {
        let event = ClipEvent {
            ticket: self.ticket,
            kind,
        };
        if self.tx.send(event).is_err() {
            // Scheduler is gone; nobody is listening for this clip anymore.
            tracing::trace!(sequence = self.ticket.sequence, "clip event dropped");
        }
    }
}

/// Synchronous failure to create a resource.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("cannot load clip {locator}: {reason}")]
    Load { locator: String, reason: String },
}

/// Refusal to start playback.
#[derive(Debug, Error)]
pub enum StartError {
    /// The host refused to start output (no usable device, stream could not be built
    /// or played, autoplay-style policy).
    #[error("playback blocked: {0}")]
    Blocked(String),
}

/// One live clip. Dropping it releases the underlying output.
pub trait PlaybackResource {
    fn set_volume(&mut self, volume: f32);

    /// Begin audible playback. Only called after the resource reported `Ready`.
    fn start(&mut self) -> Result<(), StartError>;

    /// Halt output. Must be safe to call at any point, including before `start`.
    fn pause(&mut self);
}

pub trait ResourceProvider: Send + Sync {
    fn open(
        &self,
        clip: &ClipReference,
        events: ClipEventSink,
    ) -> Result<Box<dyn PlaybackResource>, OpenError>;
}
