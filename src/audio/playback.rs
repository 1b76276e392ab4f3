//! Clip playback to system speakers via cpal.
//!
//! [`ClipPlayer`] is the reference speech source for the driver: it reports
//! the clip's lifecycle as [`PlaybackEvent`]s and, optionally, taps the
//! samples it hands to the device so the analysis sequencer sees exactly
//! what the listener hears.

use crate::audio::{AudioClip, AudioFrame, PlaybackEvent};
use crate::config::AudioConfig;
use crate::error::{LipSyncError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Where a [`ClipPlayer`] reports what it is doing.
#[derive(Debug, Clone)]
pub struct PlaybackSink {
    /// Lifecycle events (started, ended, error).
    pub events: mpsc::UnboundedSender<PlaybackEvent>,
    /// Copy of the played samples for live analysis.
    pub tap: Option<mpsc::Sender<AudioFrame>>,
}

/// Plays decoded clips through an output device.
pub struct ClipPlayer {
    device: cpal::Device,
    tap_chunk_frames: usize,
}

impl ClipPlayer {
    /// Open the configured output device (or the system default).
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.output_device {
            host.output_devices()
                .map_err(|e| LipSyncError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| LipSyncError::Audio(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| LipSyncError::Audio("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        Ok(Self {
            device,
            tap_chunk_frames: config.tap_chunk_frames.max(1),
        })
    }

    /// Play `clip` to the end, or until `cancel` fires.
    ///
    /// Blocks the calling thread; run it under `spawn_blocking`. Sends
    /// [`PlaybackEvent::Started`] once the stream is running and exactly one
    /// of [`PlaybackEvent::Ended`] or [`PlaybackEvent::Error`] afterwards,
    /// unless cancelled (the canceller owns teardown in that case).
    ///
    /// # Errors
    ///
    /// Returns an error if the output stream cannot be created or started.
    /// An [`PlaybackEvent::Error`] is sent as well so listeners settle.
    pub fn play(&self, clip: &AudioClip, sink: &PlaybackSink, cancel: &CancellationToken) -> Result<()> {
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: clip.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: clip.samples.clone(),
            position: 0,
            finished: false,
            failed: None,
            tapping: sink.tap.is_some(),
            pending_tap: Vec::with_capacity(self.tap_chunk_frames),
        }));

        let buffer_cb = Arc::clone(&buffer);
        let buffer_err = Arc::clone(&buffer);
        let tap = sink.tap.clone();
        let chunk_frames = self.tap_chunk_frames;
        let sample_rate = clip.sample_rate;

        let built = self.device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let Ok(mut buf) = buffer_cb.lock() else {
                    return;
                };
                buf.fill(data);
                if let Some(ref tap) = tap
                    && let Some(samples) = buf.take_tap_chunk(chunk_frames)
                {
                    let frame = AudioFrame {
                        samples,
                        sample_rate,
                        captured_at: Instant::now(),
                    };
                    if tap.try_send(frame).is_err() {
                        debug!("analysis tap full, dropping frame");
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
                if let Ok(mut buf) = buffer_err.lock() {
                    buf.failed = Some(err.to_string());
                }
            },
            None,
        );

        let stream = match built {
            Ok(s) => s,
            Err(e) => {
                let reason = format!("failed to build output stream: {e}");
                let _ = sink.events.send(PlaybackEvent::Error(reason.clone()));
                return Err(LipSyncError::Audio(reason));
            }
        };

        if let Err(e) = stream.play() {
            let reason = format!("failed to start output stream: {e}");
            let _ = sink.events.send(PlaybackEvent::Error(reason.clone()));
            return Err(LipSyncError::Audio(reason));
        }

        let _ = sink.events.send(PlaybackEvent::Started {
            duration: Some(clip.duration()),
        });

        loop {
            if cancel.is_cancelled() {
                info!("clip playback cancelled");
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            let mut buf = buffer
                .lock()
                .map_err(|e| LipSyncError::Audio(format!("playback buffer lock poisoned: {e}")))?;
            if let Some(reason) = buf.failed.take() {
                let _ = sink.events.send(PlaybackEvent::Error(reason));
                break;
            }
            if buf.finished {
                let _ = sink.events.send(PlaybackEvent::Ended);
                break;
            }
        }

        drop(stream);
        Ok(())
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| LipSyncError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

/// Internal buffer for tracking playback progress.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
    failed: Option<String>,
    tapping: bool,
    pending_tap: Vec<f32>,
}

impl PlaybackBuffer {
    /// Copy the next samples into `out`, padding with silence past the end.
    fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if let Some(&s) = self.samples.get(self.position) {
                *sample = s;
                if self.tapping {
                    self.pending_tap.push(s);
                }
                self.position += 1;
            } else {
                *sample = 0.0;
                self.finished = true;
            }
        }
    }

    /// Tapped samples ready to send: a full chunk, or whatever is left once
    /// the clip has run out.
    fn take_tap_chunk(&mut self, chunk_frames: usize) -> Option<Vec<f32>> {
        let ready = self.pending_tap.len() >= chunk_frames
            || (self.finished && !self.pending_tap.is_empty());
        ready.then(|| std::mem::take(&mut self.pending_tap))
    }
}
