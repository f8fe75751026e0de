//! Runtime helpers.
//!
//! Provides device enumeration, one-shot `say` playback and the stdin `listen` loop.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use clip_player::CpalProvider;
use clip_player::config::PlaybackConfig;
use clip_player::device;
use voice_queue::notify::{HttpNotifier, InteractionNotifier, LogNotifier};
use voice_queue::resolve_clips;
use voice_queue::scheduler::{SchedulerControl, SchedulerHandle, spawn_scheduler};

use crate::config::VoiceSettings;
use crate::events::{InputLine, parse_line};

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Play one event and return once it has finished.
pub fn run_say(settings: &VoiceSettings, priority: Option<i32>, ids: &[String]) -> Result<()> {
    let scheduler = start_scheduler(settings)?;
    let control = scheduler.control().clone();

    let clips = resolve_clips(ids, &settings.clips_dir, &settings.extension);
    let priority = priority.unwrap_or(settings.default_priority);
    tracing::info!(clips = clips.len(), priority, "say");
    control.enqueue(clips, priority)?;
    control.wait_idle()?;

    scheduler.shutdown()
}

/// Read events from stdin until EOF, then wait for the queue to drain.
pub fn run_listen(settings: &VoiceSettings, install_ctrlc: bool) -> Result<()> {
    let scheduler = start_scheduler(settings)?;
    let control = scheduler.control().clone();

    if install_ctrlc {
        let control_for_signal = control.clone();
        let _ = ctrlc::set_handler(move || {
            let _ = control_for_signal.clear();
            std::process::exit(130);
        });
    }

    tracing::info!(
        clips_dir = %settings.clips_dir,
        extension = %settings.extension,
        "listening on stdin"
    );
    let stdin = std::io::stdin();
    serve_lines(stdin.lock(), &control, settings)?;

    tracing::info!("input closed; waiting for queue to drain");
    control.wait_idle()?;
    scheduler.shutdown()
}

/// Apply each input line to the scheduler. Malformed lines are logged and skipped.
fn serve_lines<R: BufRead>(
    input: R,
    control: &SchedulerControl,
    settings: &VoiceSettings,
) -> Result<()> {
    for (lineno, line) in input.lines().enumerate() {
        let line = line.context("read stdin")?;
        let parsed = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(line = lineno + 1, "ignored input: {e:#}");
                continue;
            }
        };
        match parsed {
            InputLine::Event { priority, ids } => {
                let clips = resolve_clips(&ids, &settings.clips_dir, &settings.extension);
                control.enqueue(clips, priority.unwrap_or(settings.default_priority))?;
            }
            InputLine::Pause => control.pause()?,
            InputLine::Clear => control.clear()?,
            InputLine::Volume(v) => control.set_volume(v)?,
            InputLine::Skip => {}
        }
    }
    Ok(())
}

fn start_scheduler(settings: &VoiceSettings) -> Result<SchedulerHandle> {
    let playback = PlaybackConfig {
        chunk_frames: settings.chunk_frames,
        ..PlaybackConfig::default()
    };
    let provider = Arc::new(CpalProvider::new(settings.device.clone(), playback));
    let notifier = build_notifier(settings);
    if let Some(name) = &settings.device {
        tracing::info!(device = %name, "output device filter");
    }
    spawn_scheduler(provider, notifier, settings.volume)
}

/// HTTP notifier when a URL is configured, otherwise log prompts.
fn build_notifier(settings: &VoiceSettings) -> Arc<dyn InteractionNotifier> {
    match &settings.notify_url {
        Some(url) => {
            tracing::info!(url = %url, "interaction prompts via http");
            Arc::new(HttpNotifier::new(url.clone(), settings.notify_timeout))
        }
        None => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use voice_queue::ClipReference;
    use voice_queue::resource::{
        ClipEventSink, OpenError, PlaybackResource, ResourceProvider, StartError,
    };

    /// Ready on open, ended on start; records every opened locator.
    struct ScriptedProvider {
        opened: crossbeam_channel::Sender<String>,
    }

    struct ScriptedClip {
        sink: ClipEventSink,
    }

    impl PlaybackResource for ScriptedClip {
        fn set_volume(&mut self, _volume: f32) {}

        fn start(&mut self) -> Result<(), StartError> {
            self.sink.ended();
            Ok(())
        }

        fn pause(&mut self) {}
    }

    impl ResourceProvider for ScriptedProvider {
        fn open(
            &self,
            clip: &ClipReference,
            events: ClipEventSink,
        ) -> Result<Box<dyn PlaybackResource>, OpenError> {
            let _ = self.opened.send(clip.locator().to_string());
            events.ready();
            Ok(Box::new(ScriptedClip { sink: events }))
        }
    }

    fn settings() -> VoiceSettings {
        VoiceSettings {
            clips_dir: "mp3/".to_string(),
            extension: "mp3".to_string(),
            volume: 0.5,
            device: None,
            notify_url: None,
            notify_timeout: Duration::from_millis(100),
            default_priority: 5,
            chunk_frames: 1024,
        }
    }

    #[test]
    fn serve_lines_enqueues_events_in_order() {
        let (opened_tx, opened_rx) = crossbeam_channel::unbounded();
        let scheduler = spawn_scheduler(
            Arc::new(ScriptedProvider { opened: opened_tx }),
            Arc::new(LogNotifier),
            0.5,
        )
        .unwrap();
        let control = scheduler.control().clone();

        let input = "# game start\npiece/knight square/f3\n\n!volume 0.3\nbogus: x\n";
        serve_lines(input.as_bytes(), &control, &settings()).unwrap();
        assert!(control.wait_idle_timeout(Duration::from_secs(5)).unwrap());
        scheduler.shutdown().unwrap();

        let opened: Vec<String> = opened_rx.try_iter().collect();
        assert_eq!(opened, vec!["mp3/piece/knight.mp3", "mp3/square/f3.mp3"]);
    }

    #[test]
    fn notifier_defaults_to_log() {
        let notifier = build_notifier(&settings());
        assert!(
            notifier
                .notify(voice_queue::notify::InteractionSignal::PromptInteraction)
                .is_ok()
        );
    }
}
