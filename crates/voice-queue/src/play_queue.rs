//! Priority play queue.
//!
//! Holds pending [`ClipSequencePlayer`]s and makes sure only the head ever plays.
//!
//! ## Policy
//! - **Pre-emption**: `enqueue` pops trailing entries whose priority number is strictly
//!   lower than the new entry's, pausing each one. The head is popped too when it is
//!   the tail and matches. Nothing is ever reordered.
//! - **Backlog collapse**: when the head finishes, every pending entry except the most
//!   recently enqueued one is dropped, so a burst of events only plays the freshest.
//!
//! Completion is wired through each head's single `on_ended` slot: the callback posts the
//! sequence id to an internal channel, and the queue settles that channel at the end of
//! every operation that can complete a sequence.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

use crate::resource::{ClipEvent, SequenceId};
use crate::sequence::ClipSequencePlayer;

/// Priority used when the caller does not pick one.
pub const DEFAULT_PRIORITY: i32 = 5;

#[derive(Debug)]
pub struct QueueEntry {
    pub player: ClipSequencePlayer,
    pub priority: i32,
}

pub struct PriorityPlayQueue {
    entries: VecDeque<QueueEntry>,
    finished_tx: Sender<SequenceId>,
    finished_rx: Receiver<SequenceId>,
}

impl Default for PriorityPlayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityPlayQueue {
    pub fn new() -> Self {
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
        Self {
            entries: VecDeque::new(),
            finished_tx,
            finished_rx,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The head sequence (playing or about to play).
    pub fn current(&self) -> Option<&ClipSequencePlayer> {
        self.entries.front().map(|e| &e.player)
    }

    /// `(sequence id, priority)` for every entry, head first.
    pub fn snapshot(&self) -> Vec<(SequenceId, i32)> {
        self.entries
            .iter()
            .map(|e| (e.player.id(), e.priority))
            .collect()
    }

    /// Schedule `player` at `priority`. Trailing entries with a smaller priority number
    /// are paused and dropped first.
    pub fn enqueue(&mut self, player: ClipSequencePlayer, priority: i32) {
        while let Some(last) = self.entries.back() {
            if last.priority >= priority {
                break;
            }
            if let Some(mut dropped) = self.entries.pop_back() {
                tracing::debug!(
                    dropped = dropped.player.id(),
                    dropped_priority = dropped.priority,
                    priority,
                    "pre-empted queued sequence"
                );
                dropped.player.pause();
            }
        }

        tracing::debug!(sequence = player.id(), priority, "sequence enqueued");
        self.entries.push_back(QueueEntry { player, priority });

        if self.entries.len() == 1 {
            self.dequeue();
        }
        self.settle();
    }

    /// [`enqueue`](Self::enqueue) at [`DEFAULT_PRIORITY`].
    pub fn enqueue_default(&mut self, player: ClipSequencePlayer) {
        self.enqueue(player, DEFAULT_PRIORITY);
    }

    /// Route a resource event to the head. Events for any other sequence belong to a
    /// discarded or finished player and are dropped.
    pub fn handle_clip_event(&mut self, event: ClipEvent) {
        match self.entries.front_mut() {
            Some(head) if head.player.id() == event.ticket.sequence => {
                head.player.handle_event(event);
            }
            _ => {
                tracing::trace!(sequence = event.ticket.sequence, "event for inactive sequence dropped");
            }
        }
        self.settle();
    }

    /// Pause the head sequence and discard it. The next pending entry, if any, becomes
    /// the head and starts.
    pub fn pause(&mut self) {
        let Some(mut head) = self.entries.pop_front() else {
            return;
        };
        head.player.pause();
        tracing::debug!(sequence = head.player.id(), "head paused and discarded");
        self.dequeue();
        self.settle();
    }

    /// Pause every entry and forget them all.
    pub fn stop_all(&mut self) {
        for mut entry in self.entries.drain(..) {
            entry.player.pause();
        }
    }

    /// Forget every entry without pausing. Dropping a player still releases its
    /// active resource.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(dropped = self.entries.len(), "queue cleared");
        }
        self.entries.clear();
    }

    fn dequeue(&mut self) {
        let Some(head) = self.entries.front_mut() else {
            return;
        };
        let tx = self.finished_tx.clone();
        let id = head.player.id();
        head.player.on_ended(move || {
            let _ = tx.send(id);
        });
        head.player.play();
    }

    /// Run completion handlers posted during the current turn.
    fn settle(&mut self) {
        while let Ok(id) = self.finished_rx.try_recv() {
            self.advance(id);
        }
    }

    fn advance(&mut self, finished: SequenceId) {
        match self.entries.front() {
            Some(head) if head.player.id() == finished => {}
            _ => {
                // Head was cleared or replaced before its completion was settled.
                tracing::trace!(sequence = finished, "stale completion ignored");
                return;
            }
        }
        self.entries.pop_front();
        while self.entries.len() >= 2 {
            if let Some(skipped) = self.entries.pop_front() {
                tracing::debug!(sequence = skipped.player.id(), "stale sequence skipped");
            }
        }
        self.dequeue();
    }
}
