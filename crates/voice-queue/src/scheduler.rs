//! Scheduler thread.
//!
//! Owns the [`PriorityPlayQueue`] and runs a single-threaded loop over two channels:
//! commands from [`SchedulerControl`] and clip events from playback resources. Every
//! message is handled to completion before the next one is taken, so the queue and
//! the sequences it holds are never touched concurrently.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::clip::ClipReference;
use crate::notify::InteractionNotifier;
use crate::play_queue::PriorityPlayQueue;
use crate::resource::ResourceProvider;
use crate::sequence::{ClipSequencePlayer, PlaybackContext, normalize_volume};

/// Commands accepted by the scheduler thread.
#[derive(Debug)]
pub(crate) enum SchedulerCommand {
    Enqueue {
        clips: Vec<ClipReference>,
        priority: i32,
    },
    SetVolume {
        value: f32,
    },
    Pause,
    Clear,
    WhenIdle {
        done: Sender<()>,
    },
    Shutdown,
}

/// Cloneable sender side of the scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerControl {
    cmd_tx: Sender<SchedulerCommand>,
}

impl SchedulerControl {
    /// Schedule a new sequence built from `clips` at the current volume.
    pub fn enqueue(&self, clips: Vec<ClipReference>, priority: i32) -> Result<()> {
        self.send(SchedulerCommand::Enqueue { clips, priority })
    }

    /// Volume for sequences enqueued from now on.
    pub fn set_volume(&self, value: f32) -> Result<()> {
        self.send(SchedulerCommand::SetVolume { value })
    }

    /// Pause and discard the sequence that is currently playing; the next pending one starts.
    pub fn pause(&self) -> Result<()> {
        self.send(SchedulerCommand::Pause)
    }

    /// Drop every queued sequence.
    pub fn clear(&self) -> Result<()> {
        self.send(SchedulerCommand::Clear)
    }

    /// Block until the queue is empty.
    pub fn wait_idle(&self) -> Result<()> {
        let (done, rx) = crossbeam_channel::bounded(1);
        self.send(SchedulerCommand::WhenIdle { done })?;
        rx.recv().map_err(|_| anyhow!("scheduler stopped before becoming idle"))
    }

    /// Like [`wait_idle`](Self::wait_idle) with a deadline. Returns `false` on timeout.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> Result<bool> {
        let (done, rx) = crossbeam_channel::bounded(1);
        self.send(SchedulerCommand::WhenIdle { done })?;
        match rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("scheduler stopped before becoming idle"))
            }
        }
    }

    fn send(&self, cmd: SchedulerCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow!("scheduler thread is not running"))
    }
}

/// Owner handle: controls the scheduler and joins its thread on shutdown.
pub struct SchedulerHandle {
    control: SchedulerControl,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn control(&self) -> &SchedulerControl {
        &self.control
    }

    /// Stop all audio, drop the queue and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_thread()
    }

    fn stop_thread(&mut self) -> Result<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        // A send error means the loop already exited; joining still applies.
        let _ = self.control.send(SchedulerCommand::Shutdown);
        join.join()
            .map_err(|_| anyhow!("scheduler thread panicked"))
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_thread() {
            tracing::warn!("scheduler shutdown: {e:#}");
        }
    }
}

/// Spawn the scheduler thread.
///
/// `volume` is the initial volume for new sequences (clamped to `[0, 1]`).
pub fn spawn_scheduler(
    provider: Arc<dyn ResourceProvider>,
    notifier: Arc<dyn InteractionNotifier>,
    volume: f32,
) -> Result<SchedulerHandle> {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let join = std::thread::Builder::new()
        .name("voice-scheduler".to_string())
        .spawn(move || scheduler_thread_main(provider, notifier, volume, cmd_rx))
        .context("spawn scheduler thread")?;
    Ok(SchedulerHandle {
        control: SchedulerControl { cmd_tx },
        join: Some(join),
    })
}

struct SchedulerState {
    ctx: PlaybackContext,
    queue: PriorityPlayQueue,
    volume: f32,
    idle_waiters: Vec<Sender<()>>,
}

impl SchedulerState {
    fn apply(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Enqueue { clips, priority } => {
                let player = ClipSequencePlayer::new(&self.ctx, clips, self.volume);
                tracing::info!(
                    sequence = player.id(),
                    clips = player.remaining(),
                    priority,
                    "event scheduled"
                );
                self.queue.enqueue(player, priority);
            }
            SchedulerCommand::SetVolume { value } => {
                self.volume = normalize_volume(value);
                tracing::info!(volume = self.volume, "volume set");
            }
            SchedulerCommand::Pause => self.queue.pause(),
            SchedulerCommand::Clear => self.queue.clear(),
            SchedulerCommand::WhenIdle { done } => self.idle_waiters.push(done),
            SchedulerCommand::Shutdown => {}
        }
    }

    fn release_idle_waiters(&mut self) {
        if self.queue.is_empty() {
            for done in self.idle_waiters.drain(..) {
                let _ = done.send(());
            }
        }
    }
}

fn scheduler_thread_main(
    provider: Arc<dyn ResourceProvider>,
    notifier: Arc<dyn InteractionNotifier>,
    volume: f32,
    cmd_rx: Receiver<SchedulerCommand>,
) {
    let (clip_tx, clip_rx) = crossbeam_channel::unbounded();
    let mut state = SchedulerState {
        ctx: PlaybackContext::new(provider, notifier, clip_tx),
        queue: PriorityPlayQueue::new(),
        volume: normalize_volume(volume),
        idle_waiters: Vec::new(),
    };
    tracing::debug!(volume = state.volume, "scheduler started");

    loop {
        crossbeam_channel::select! {
            recv(cmd_rx) -> msg => match msg {
                Ok(SchedulerCommand::Shutdown) | Err(_) => break,
                Ok(cmd) => state.apply(cmd),
            },
            recv(clip_rx) -> msg => {
                if let Ok(event) = msg {
                    state.queue.handle_clip_event(event);
                }
            },
        }
        state.release_idle_waiters();
    }

    state.queue.stop_all();
    tracing::debug!("scheduler stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::notify::LogNotifier;
    use crate::resource::{ClipEventSink, OpenError, PlaybackResource, StartError};

    /// Provider whose clips become ready at once and end as soon as they start.
    /// Clips named `held*` keep playing until paused.
    #[derive(Default)]
    struct InstantProvider {
        played: Arc<Mutex<Vec<(String, f32)>>>,
    }

    struct InstantClip {
        locator: String,
        volume: f32,
        sink: ClipEventSink,
        played: Arc<Mutex<Vec<(String, f32)>>>,
    }

    impl ResourceProvider for InstantProvider {
        fn open(
            &self,
            clip: &ClipReference,
            events: ClipEventSink,
        ) -> Result<Box<dyn PlaybackResource>, OpenError> {
            if clip.locator().starts_with("missing") {
                return Err(OpenError::Load {
                    locator: clip.locator().to_string(),
                    reason: "not found".to_string(),
                });
            }
            events.ready();
            Ok(Box::new(InstantClip {
                locator: clip.locator().to_string(),
                volume: 1.0,
                sink: events,
                played: self.played.clone(),
            }))
        }
    }

    impl PlaybackResource for InstantClip {
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn start(&mut self) -> Result<(), StartError> {
            self.played
                .lock()
                .unwrap()
                .push((self.locator.clone(), self.volume));
            if !self.locator.starts_with("held") {
                self.sink.ended();
            }
            Ok(())
        }

        fn pause(&mut self) {}
    }

    fn clips(ids: &[&str]) -> Vec<ClipReference> {
        ids.iter().map(|id| ClipReference::new(*id, "wav")).collect()
    }

    fn spawn(provider: &InstantProvider, volume: f32) -> SchedulerHandle {
        let provider = InstantProvider {
            played: provider.played.clone(),
        };
        spawn_scheduler(Arc::new(provider), Arc::new(LogNotifier), volume).unwrap()
    }

    #[test]
    fn plays_enqueued_clips_in_order() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 0.5);

        handle
            .control()
            .enqueue(clips(&["a", "missing-b", "c"]), 5)
            .unwrap();
        assert!(handle
            .control()
            .wait_idle_timeout(Duration::from_secs(5))
            .unwrap());

        let played = provider.played.lock().unwrap().clone();
        assert_eq!(
            played,
            vec![("a".to_string(), 0.5), ("c".to_string(), 0.5)]
        );
        handle.shutdown().unwrap();
    }

    #[test]
    fn set_volume_applies_to_later_sequences() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 2.0);

        handle.control().enqueue(clips(&["a"]), 5).unwrap();
        handle.control().wait_idle().unwrap();
        handle.control().set_volume(0.2).unwrap();
        handle.control().enqueue(clips(&["b"]), 5).unwrap();
        handle.control().wait_idle().unwrap();

        let played = provider.played.lock().unwrap().clone();
        assert_eq!(
            played,
            vec![("a".to_string(), 1.0), ("b".to_string(), 0.2)]
        );
    }

    #[test]
    fn wait_idle_returns_for_empty_queue() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 0.5);

        handle.control().enqueue(Vec::new(), 5).unwrap();
        assert!(handle
            .control()
            .wait_idle_timeout(Duration::from_secs(5))
            .unwrap());
        assert!(provider.played.lock().unwrap().is_empty());
    }

    #[test]
    fn control_fails_after_shutdown() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 0.5);
        let control = handle.control().clone();

        handle.shutdown().unwrap();

        assert!(control.enqueue(clips(&["a"]), 5).is_err());
        assert!(control.clear().is_err());
    }

    #[test]
    fn pause_releases_head_so_later_events_play() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 0.5);
        let control = handle.control();

        control.enqueue(clips(&["held-a"]), 5).unwrap();
        control.pause().unwrap();
        control.enqueue(clips(&["b"]), 5).unwrap();
        assert!(control.wait_idle_timeout(Duration::from_secs(5)).unwrap());

        let played = provider.played.lock().unwrap().clone();
        assert_eq!(
            played,
            vec![("held-a".to_string(), 0.5), ("b".to_string(), 0.5)]
        );
        handle.shutdown().unwrap();
    }

    #[test]
    fn pause_with_nothing_behind_becomes_idle() {
        let provider = InstantProvider::default();
        let handle = spawn(&provider, 0.5);

        handle.control().enqueue(clips(&["held-a"]), 5).unwrap();
        assert!(!handle
            .control()
            .wait_idle_timeout(Duration::from_millis(100))
            .unwrap());
        handle.control().pause().unwrap();
        assert!(handle
            .control()
            .wait_idle_timeout(Duration::from_secs(5))
            .unwrap());
    }
}
