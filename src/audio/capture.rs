//! Microphone capture using cpal.
//!
//! Streams mono frames at the device's native rate straight into the
//! analysis sequencer. No resampling: the analyzer converts bins to hertz
//! with whatever rate each frame carries.

use crate::audio::{AudioFrame, to_mono};
use crate::config::AudioConfig;
use crate::error::{LipSyncError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Audio capture from the system microphone via cpal.
pub struct CpalCapture {
    device: cpal::Device,
    stream_config: StreamConfig,
}

impl CpalCapture {
    /// Open the configured input device (or the system default).
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.input_device {
            host.input_devices()
                .map_err(|e| LipSyncError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| LipSyncError::Audio(format!("input device '{name}' not found")))?
        } else {
            host.default_input_device()
                .ok_or_else(|| LipSyncError::Audio("no default input device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using input device: {device_name}");

        let default_config = device
            .default_input_config()
            .map_err(|e| LipSyncError::Audio(format!("no default input config: {e}")))?;

        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            "input config: {}Hz, {} channels",
            stream_config.sample_rate, stream_config.channels
        );

        Ok(Self {
            device,
            stream_config,
        })
    }

    /// Run the capture loop, sending mono frames to `tx`.
    ///
    /// Returns when `cancel` fires. Dropping `tx` on return closes the
    /// channel, which the analysis sequencer treats as the end of the audio.
    ///
    /// # Errors
    ///
    /// Returns an error if the input stream cannot be created.
    pub async fn run(&self, tx: mpsc::Sender<AudioFrame>, cancel: CancellationToken) -> Result<()> {
        let sample_rate = self.stream_config.sample_rate;
        let channels = self.stream_config.channels;

        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let frame = AudioFrame {
                        samples: to_mono(data, channels),
                        sample_rate,
                        captured_at: Instant::now(),
                    };
                    // Never block the audio thread.
                    if tx.try_send(frame).is_err() {
                        debug!("analysis channel full, dropping frame");
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| LipSyncError::Audio(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| LipSyncError::Audio(format!("failed to start input stream: {e}")))?;

        info!("audio capture started");
        cancel.cancelled().await;

        drop(stream);
        info!("audio capture stopped");
        Ok(())
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
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
