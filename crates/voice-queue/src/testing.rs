//! Scripted collaborators for unit tests.
//!
//! The fake provider records every open/start/pause and keeps the event sink of each
//! opened clip so a test can fire `ready`/`ended`/`failed` by locator, then pump the
//! event channel into a sequence or queue by hand.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};

use crate::clip::ClipReference;
use crate::notify::{InteractionNotifier, InteractionSignal};
use crate::play_queue::PriorityPlayQueue;
use crate::resource::{ClipEvent, ClipEventSink, OpenError, PlaybackResource, ResourceProvider, StartError};
use crate::sequence::{ClipSequencePlayer, PlaybackContext};

#[derive(Default)]
struct Shared {
    opened: Vec<String>,
    started: Vec<String>,
    paused: Vec<String>,
    volumes: Vec<(String, f32)>,
    sinks: Vec<(String, ClipEventSink)>,
    fail_open: HashSet<String>,
    block_start: HashSet<String>,
    signals: Vec<InteractionSignal>,
    fail_notify: bool,
}

struct FakeProvider {
    shared: Arc<Mutex<Shared>>,
}

impl ResourceProvider for FakeProvider {
    fn open(
        &self,
        clip: &ClipReference,
        events: ClipEventSink,
    ) -> Result<Box<dyn PlaybackResource>, OpenError> {
        let mut s = self.shared.lock().unwrap();
        let locator = clip.locator().to_string();
        s.opened.push(locator.clone());
        if s.fail_open.contains(&locator) {
            return Err(OpenError::Load {
                locator,
                reason: "missing".to_string(),
            });
        }
        s.sinks.push((locator.clone(), events));
        Ok(Box::new(FakeResource {
            locator,
            shared: self.shared.clone(),
        }))
    }
}

struct FakeResource {
    locator: String,
    shared: Arc<Mutex<Shared>>,
}

impl PlaybackResource for FakeResource {
    fn set_volume(&mut self, volume: f32) {
        let mut s = self.shared.lock().unwrap();
        s.volumes.push((self.locator.clone(), volume));
    }

    fn start(&mut self) -> Result<(), StartError> {
        let mut s = self.shared.lock().unwrap();
        if s.block_start.contains(&self.locator) {
            return Err(StartError::Blocked("autoplay refused".to_string()));
        }
        s.started.push(self.locator.clone());
        Ok(())
    }

    fn pause(&mut self) {
        let mut s = self.shared.lock().unwrap();
        s.paused.push(self.locator.clone());
    }
}

struct FakeNotifier {
    shared: Arc<Mutex<Shared>>,
}

impl InteractionNotifier for FakeNotifier {
    fn notify(&self, signal: InteractionSignal) -> Result<()> {
        let mut s = self.shared.lock().unwrap();
        s.signals.push(signal);
        if s.fail_notify {
            return Err(anyhow!("receiving end does not exist"));
        }
        Ok(())
    }
}

pub(crate) struct Harness {
    shared: Arc<Mutex<Shared>>,
    ctx: PlaybackContext,
    events_rx: Receiver<ClipEvent>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (events_tx, events_rx): (Sender<ClipEvent>, Receiver<ClipEvent>) =
            crossbeam_channel::unbounded();
        let ctx = PlaybackContext::new(
            Arc::new(FakeProvider {
                shared: shared.clone(),
            }),
            Arc::new(FakeNotifier {
                shared: shared.clone(),
            }),
            events_tx,
        );
        Self {
            shared,
            ctx,
            events_rx,
        }
    }

    pub(crate) fn context(&self) -> &PlaybackContext {
        &self.ctx
    }

    pub(crate) fn sequence(&self, clips: &[&str]) -> ClipSequencePlayer {
        self.sequence_with_volume(clips, 0.5)
    }

    pub(crate) fn sequence_with_volume(&self, clips: &[&str], volume: f32) -> ClipSequencePlayer {
        let clips = clips.iter().map(|c| ClipReference::new(*c, "mp3"));
        ClipSequencePlayer::new(&self.ctx, clips, volume)
    }

    pub(crate) fn fail_open(&self, locator: &str) {
        self.shared
            .lock()
            .unwrap()
            .fail_open
            .insert(locator.to_string());
    }

    pub(crate) fn block_start(&self, locator: &str) {
        self.shared
            .lock()
            .unwrap()
            .block_start
            .insert(locator.to_string());
    }

    pub(crate) fn fail_notifications(&self) {
        self.shared.lock().unwrap().fail_notify = true;
    }

    pub(crate) fn ready(&self, locator: &str) {
        self.sink(locator).ready();
    }

    pub(crate) fn ended(&self, locator: &str) {
        self.sink(locator).ended();
    }

    pub(crate) fn fail(&self, locator: &str) {
        self.sink(locator).failed("decode error");
    }

    pub(crate) fn pump_player(&self, player: &mut ClipSequencePlayer) {
        while let Ok(event) = self.events_rx.try_recv() {
            player.handle_event(event);
        }
    }

    pub(crate) fn pump_queue(&self, queue: &mut PriorityPlayQueue) {
        while let Ok(event) = self.events_rx.try_recv() {
            queue.handle_clip_event(event);
        }
    }

    /// Ready + ended for `locator`, pumped into a lone player.
    pub(crate) fn play_through(&self, locator: &str, player: &mut ClipSequencePlayer) {
        self.ready(locator);
        self.pump_player(player);
        self.ended(locator);
        self.pump_player(player);
    }

    /// Ready + ended for `locator`, pumped into a queue.
    pub(crate) fn play_through_queue(&self, locator: &str, queue: &mut PriorityPlayQueue) {
        self.ready(locator);
        self.pump_queue(queue);
        self.ended(locator);
        self.pump_queue(queue);
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.shared.lock().unwrap().opened.clone()
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.shared.lock().unwrap().started.clone()
    }

    pub(crate) fn paused(&self) -> Vec<String> {
        self.shared.lock().unwrap().paused.clone()
    }

    pub(crate) fn volumes(&self) -> Vec<(String, f32)> {
        self.shared.lock().unwrap().volumes.clone()
    }

    pub(crate) fn signals(&self) -> Vec<InteractionSignal> {
        self.shared.lock().unwrap().signals.clone()
    }

    /// Most recent sink opened for `locator`.
    fn sink(&self, locator: &str) -> ClipEventSink {
        let s = self.shared.lock().unwrap();
        s.sinks
            .iter()
            .rev()
            .find(|(l, _)| l == locator)
            .map(|(_, sink)| sink.clone())
            .unwrap_or_else(|| panic!("clip {locator} was never opened"))
    }
}
