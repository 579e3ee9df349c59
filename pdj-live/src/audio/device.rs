//! Audio output using cpal
//!
//! A dedicated thread owns the cpal stream (streams are not `Send` on every
//! platform). The device callback renders the shared timeline, so the
//! number of frames the device has consumed is the output clock.

use crate::audio::output::{lock_timeline, AudioOutput};
use crate::audio::timeline::{CaptureTap, TapId, Timeline};
use crate::audio::{AudioSegment, GainStage};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info, warn};

enum DeviceCommand {
    Play,
    Shutdown,
}

/// cpal-backed output
pub struct DeviceOutput {
    timeline: Arc<Mutex<Timeline>>,
    frames_played: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    commands: Mutex<mpsc::Sender<DeviceCommand>>,
}

impl DeviceOutput {
    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open a device (default device when `device_name` is None)
    ///
    /// The stream is created paused; `resume()` starts it.
    pub fn open(device_name: Option<String>, sample_rate: u32, channels: u16) -> Result<Self> {
        let timeline = Arc::new(Mutex::new(Timeline::new(sample_rate, channels)));
        let frames_played = Arc::new(AtomicU64::new(0));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let thread_timeline = Arc::clone(&timeline);
        let thread_frames = Arc::clone(&frames_played);
        thread::Builder::new()
            .name("pdj-audio-out".to_string())
            .spawn(move || {
                let stream = match build_stream(
                    device_name,
                    sample_rate,
                    channels,
                    thread_timeline,
                    thread_frames,
                ) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DeviceCommand::Play => {
                            if let Err(e) = stream.play() {
                                error!("Failed to start audio stream: {}", e);
                            }
                        }
                        DeviceCommand::Shutdown => break,
                    }
                }
                debug!("Audio output thread exiting");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during setup".to_string()))??;

        Ok(Self {
            timeline,
            frames_played,
            sample_rate,
            channels,
            commands: Mutex::new(command_tx),
        })
    }

    fn send(&self, command: DeviceCommand) {
        let sender = match self.commands.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sender.send(command).is_err() {
            warn!("Audio output thread is gone");
        }
    }
}

fn build_stream(
    device_name: Option<String>,
    sample_rate: u32,
    channels: u16,
    timeline: Arc<Mutex<Timeline>>,
    frames_played: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = match device_name.as_ref() {
        Some(name) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;
            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(device) => device,
                None => {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                    host.default_output_device()
                        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?
                }
            }
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
    };
    info!(
        "Using audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to query device configs: {}", e)))?
        .any(|range| {
            range.channels() == channels
                && range.sample_format() == SampleFormat::F32
                && range.min_sample_rate().0 <= sample_rate
                && range.max_sample_rate().0 >= sample_rate
        });
    if !supported {
        return Err(Error::AudioOutput(format!(
            "Device does not support f32 output at {} Hz with {} channels",
            sample_rate, channels
        )));
    }

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut timeline = lock_timeline(&timeline);
                timeline.render(data);
                frames_played.store(timeline.frames_rendered(), Ordering::Release);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))?;

    Ok(stream)
}

impl AudioOutput for DeviceOutput {
    fn current_time(&self) -> f64 {
        self.frames_played.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn resume(&self) {
        self.send(DeviceCommand::Play);
    }

    fn schedule(&self, segment: AudioSegment, start_at: f64, stage: &Arc<GainStage>) {
        lock_timeline(&self.timeline).schedule(segment, start_at, Arc::clone(stage));
    }

    fn attach_tap(&self, stage: &Arc<GainStage>) -> CaptureTap {
        lock_timeline(&self.timeline).attach_tap(stage.id())
    }

    fn detach_tap(&self, tap: TapId) {
        lock_timeline(&self.timeline).detach_tap(tap);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.send(DeviceCommand::Shutdown);
    }
}
