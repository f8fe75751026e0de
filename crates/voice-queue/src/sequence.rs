//! Chained clip playback.
//!
//! A [`ClipSequencePlayer`] owns an ordered list of clips and plays them one at a
//! time. Each clip goes through open → ready → start → ended/failed; whatever the
//! outcome, the player moves on to the next clip. Once the list is exhausted the
//! single `on_ended` callback fires.
//!
//! The player never blocks. It reacts to [`ClipEvent`]s that the owner feeds into
//! [`ClipSequencePlayer::handle_event`], and it ignores events that do not belong to
//! its current clip.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::clip::ClipReference;
use crate::notify::{InteractionNotifier, InteractionSignal};
use crate::resource::{
    ClipEvent, ClipEventKind, ClipEventSink, ClipTicket, PlaybackResource, ResourceProvider,
    SequenceId, StartError,
};

/// Volume used when the requested value is not a finite number.
pub const DEFAULT_VOLUME: f32 = 0.5;

static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_sequence_id() -> SequenceId {
    NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Clamp to `[0, 1]`, mapping NaN/inf to [`DEFAULT_VOLUME`].
pub fn normalize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        DEFAULT_VOLUME
    }
}

/// Collaborators shared by every sequence of one scheduler.
#[derive(Clone)]
pub struct PlaybackContext {
    provider: Arc<dyn ResourceProvider>,
    notifier: Arc<dyn InteractionNotifier>,
    events: Sender<ClipEvent>,
}

impl PlaybackContext {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        notifier: Arc<dyn InteractionNotifier>,
        events: Sender<ClipEvent>,
    ) -> Self {
        Self {
            provider,
            notifier,
            events,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceState {
    /// Created, `play()` not called yet.
    Idle,
    Playing,
    /// Halted by `pause()`/`stop()`; will not advance or complete.
    Paused,
    /// All clips consumed and `on_ended` fired.
    Ended,
}

struct ActiveClip {
    generation: u64,
    clip: ClipReference,
    resource: Box<dyn PlaybackResource>,
    started: bool,
}

pub struct ClipSequencePlayer {
    id: SequenceId,
    clips: VecDeque<ClipReference>,
    volume: f32,
    on_ended: Option<Box<dyn FnOnce()>>,
    active: Option<ActiveClip>,
    generation: u64,
    state: SequenceState,
    ctx: PlaybackContext,
}

impl ClipSequencePlayer {
    pub fn new<I>(ctx: &PlaybackContext, clips: I, volume: f32) -> Self
    where
        I: IntoIterator<Item = ClipReference>,
    {
        Self {
            id: next_sequence_id(),
            clips: clips.into_iter().collect(),
            volume: normalize_volume(volume),
            on_ended: None,
            active: None,
            generation: 0,
            state: SequenceState::Idle,
            ctx: ctx.clone(),
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Clips not yet opened.
    pub fn remaining(&self) -> usize {
        self.clips.len()
    }

    /// Clip currently owned by the player, if any.
    pub fn current_clip(&self) -> Option<&ClipReference> {
        self.active.as_ref().map(|a| &a.clip)
    }

    /// Register the completion callback. Single slot: a later call replaces an
    /// earlier one that has not fired yet.
    pub fn on_ended<F>(&mut self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.on_ended = Some(Box::new(callback));
    }

    /// Start consuming clips. Only the first call has an effect.
    pub fn play(&mut self) {
        if self.state != SequenceState::Idle {
            tracing::trace!(sequence = self.id, state = ?self.state, "play ignored");
            return;
        }
        self.state = SequenceState::Playing;
        tracing::debug!(sequence = self.id, clips = self.clips.len(), "sequence start");
        self.play_next();
    }

    /// Halt the active clip. No-op when nothing is active.
    pub fn pause(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.resource.pause();
        if self.state == SequenceState::Playing {
            self.state = SequenceState::Paused;
        }
        tracing::debug!(sequence = self.id, clip = %active.clip, "sequence paused");
    }

    /// Pause and release the active resource.
    pub fn stop(&mut self) {
        self.pause();
        self.active = None;
    }

    /// Feed a resource event. Events for another sequence, an older clip, or a
    /// halted sequence are dropped.
    pub fn handle_event(&mut self, event: ClipEvent) {
        if self.state != SequenceState::Playing {
            tracing::trace!(sequence = self.id, state = ?self.state, "late clip event dropped");
            return;
        }
        let current = ClipTicket {
            sequence: self.id,
            generation: self.generation,
        };
        if event.ticket != current || self.active.is_none() {
            tracing::trace!(
                sequence = self.id,
                ticket = ?event.ticket,
                "stale clip event dropped"
            );
            return;
        }

        match event.kind {
            ClipEventKind::Ready => self.start_active(),
            ClipEventKind::Ended => {
                self.signal(InteractionSignal::ClearPromptInteraction);
                self.play_next();
            }
            ClipEventKind::Failed(reason) => {
                if let Some(active) = self.active.as_ref() {
                    tracing::info!(
                        sequence = self.id,
                        clip = %active.clip,
                        reason = %reason,
                        "clip failed; skipping"
                    );
                }
                self.play_next();
            }
        }
    }

    fn start_active(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.started {
            return;
        }
        active.started = true;
        match active.resource.start() {
            Ok(()) => {
                tracing::debug!(sequence = self.id, clip = %active.clip, "clip started");
            }
            Err(StartError::Blocked(reason)) => {
                tracing::info!(
                    sequence = self.id,
                    clip = %active.clip,
                    reason = %reason,
                    "clip start blocked"
                );
                self.signal(InteractionSignal::PromptInteraction);
                self.play_next();
            }
        }
    }

    /// Open clips from the front until one is in flight or the list is empty.
    fn play_next(&mut self) {
        // Release the previous clip before acquiring the next one.
        self.active = None;

        while let Some(clip) = self.clips.pop_front() {
            self.generation += 1;
            let ticket = ClipTicket {
                sequence: self.id,
                generation: self.generation,
            };
            let sink = ClipEventSink::new(ticket, self.ctx.events.clone());
            match self.ctx.provider.open(&clip, sink) {
                Ok(mut resource) => {
                    resource.set_volume(self.volume);
                    tracing::debug!(sequence = self.id, clip = %clip, "clip opened");
                    self.active = Some(ActiveClip {
                        generation: self.generation,
                        clip,
                        resource,
                        started: false,
                    });
                    return;
                }
                Err(e) => {
                    tracing::info!(sequence = self.id, "clip skipped: {e}");
                }
            }
        }

        self.finish();
    }

    fn finish(&mut self) {
        self.state = SequenceState::Ended;
        tracing::debug!(sequence = self.id, "sequence ended");
        if let Some(callback) = self.on_ended.take() {
            callback();
        }
    }

    fn signal(&self, signal: InteractionSignal) {
        if let Err(e) = self.ctx.notifier.notify(signal) {
            tracing::warn!(sequence = self.id, "failed to send {signal:?}: {e:#}");
        }
    }
}

impl std::fmt::Debug for ClipSequencePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipSequencePlayer")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("remaining", &self.clips.len())
            .field("active", &self.active.as_ref().map(|a| (a.generation, &a.clip)))
            .finish()
    }
}
