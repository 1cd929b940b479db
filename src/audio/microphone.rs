//! Audio capture from microphone
//!
//! Uses cpal for cross-platform capture. cpal streams are not `Send`, so
//! the stream lives on a dedicated thread driven by commands.

use super::assembler::FrameAssembler;
use super::config::AudioConfig;
use super::device::{
    CallbackFlow, CallbackInfo, CaptureDevice, FrameCallback, MicrophoneError, StatusFlags,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

type Reply = mpsc::Sender<Result<(), MicrophoneError>>;

/// Commands to control the audio thread
enum AudioCommand {
    Start(Reply),
    Stop(Reply),
    Close,
}

struct CaptureWorker {
    command_tx: mpsc::Sender<AudioCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

/// Microphone backed by the default cpal host
pub struct CpalDevice {
    device_name: Option<String>,
    worker: Option<CaptureWorker>,
}

impl CpalDevice {
    /// The host's default input device
    pub fn new() -> Self {
        Self {
            device_name: None,
            worker: None,
        }
    }

    /// The input device called `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            worker: None,
        }
    }

    /// Uses `config.device_name` when set
    pub fn from_config(config: &AudioConfig) -> Self {
        match config.device_name {
            Some(ref name) => Self::named(name.clone()),
            None => Self::new(),
        }
    }

    /// List available input devices
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    fn request(
        &self,
        command: impl FnOnce(Reply) -> AudioCommand,
    ) -> Result<(), MicrophoneError> {
        let worker = self.worker.as_ref().ok_or(MicrophoneError::NotStarted)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        worker
            .command_tx
            .send(command(reply_tx))
            .map_err(|_| MicrophoneError::StreamError("audio thread has exited".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| MicrophoneError::StreamError("audio thread has exited".to_string()))?
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalDevice {
    fn open(
        &mut self,
        config: &AudioConfig,
        callback: FrameCallback,
    ) -> Result<(), MicrophoneError> {
        if self.worker.is_some() {
            return Err(MicrophoneError::StreamError(
                "audio device already open".to_string(),
            ));
        }

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let device_name = self.device_name.clone();
        let config = config.clone();

        let thread_handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                run_audio_capture(device_name, config, callback, ready_tx, command_rx);
            })
            .map_err(|e| MicrophoneError::Unavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(CaptureWorker {
                    command_tx,
                    thread_handle: Some(thread_handle),
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(MicrophoneError::Unavailable(
                    "audio thread exited during setup".to_string(),
                ))
            }
        }
    }

    fn start(&mut self) -> Result<(), MicrophoneError> {
        self.request(AudioCommand::Start)
    }

    fn stop(&mut self) -> Result<(), MicrophoneError> {
        self.request(AudioCommand::Stop)
    }

    fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.command_tx.send(AudioCommand::Close);
            if let Some(handle) = worker.thread_handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stream errors reported by cpal, handed over with the next frame
#[derive(Default)]
struct PendingStatus {
    stream_error: AtomicBool,
    device_lost: AtomicBool,
}

impl PendingStatus {
    fn record(&self, err: &cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                self.device_lost.store(true, Ordering::Release)
            }
            _ => self.stream_error.store(true, Ordering::Release),
        }
    }

    fn take(&self) -> StatusFlags {
        StatusFlags {
            stream_error: self.stream_error.swap(false, Ordering::AcqRel),
            device_lost: self.device_lost.swap(false, Ordering::AcqRel),
        }
    }
}

/// Cuts driver periods into frames and forwards them to the callback
struct FrameSink {
    assembler: FrameAssembler,
    callback: FrameCallback,
    bytes_per_frame_sample: usize,
    status: Arc<PendingStatus>,
    /// Flags reported since the last delivered frame
    pending: StatusFlags,
    halted: bool,
}

impl FrameSink {
    fn deliver(&mut self, bytes: &[u8], latency: Option<std::time::Duration>) {
        if self.halted {
            return;
        }

        // Periods that complete no frame keep their flags for the next one.
        let reported = self.status.take();
        self.pending.stream_error |= reported.stream_error;
        self.pending.device_lost |= reported.device_lost;

        let Self {
            assembler,
            callback,
            bytes_per_frame_sample,
            pending,
            halted,
            ..
        } = self;

        assembler.push(bytes, |frame| {
            if *halted {
                return;
            }
            let info = CallbackInfo {
                frame_count: frame.len() / *bytes_per_frame_sample,
                latency,
                status: std::mem::take(pending),
            };
            if callback(&frame, &info) == CallbackFlow::Stop {
                tracing::info!("Frame callback requested stop, halting delivery");
                *halted = true;
            }
        });
    }
}

fn find_device(device_name: Option<&str>) -> Result<cpal::Device, MicrophoneError> {
    let host = cpal::default_host();
    match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| MicrophoneError::Unavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(MicrophoneError::NoDevice),
        None => host
            .default_input_device()
            .ok_or(MicrophoneError::NoDevice),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    mut sink: FrameSink,
    status: Arc<PendingStatus>,
) -> Result<cpal::Stream, MicrophoneError>
where
    T: SizedSample + bytemuck::Pod,
{
    device
        .build_input_stream(
            stream_config,
            move |data: &[T], info: &cpal::InputCallbackInfo| {
                let stamp = info.timestamp();
                let latency = stamp.callback.duration_since(&stamp.capture);
                sink.deliver(bytemuck::cast_slice(data), latency);
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                status.record(&err);
            },
            None,
        )
        .map_err(|e| MicrophoneError::Unavailable(e.to_string()))
}

fn build_stream(
    device_name: Option<&str>,
    config: &AudioConfig,
    callback: FrameCallback,
) -> Result<cpal::Stream, MicrophoneError> {
    config.validate()?;
    let device = find_device(device_name)?;

    tracing::info!("Audio device: {:?}", device.name());
    tracing::info!(
        "Audio config: {}Hz {}ch {}-bit, {} samples per frame",
        config.sample_rate,
        config.channels,
        config.bits_per_sample,
        config.frame_size
    );

    // The backend picks its own period; the assembler re-slices it.
    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let status = Arc::new(PendingStatus::default());
    let sink = FrameSink {
        assembler: FrameAssembler::new(config.frame_bytes()),
        callback,
        bytes_per_frame_sample: config.bytes_per_frame_sample(),
        status: Arc::clone(&status),
        pending: StatusFlags::default(),
        halted: false,
    };

    match config.bits_per_sample {
        8 => build_input::<i8>(&device, &stream_config, sink, status),
        16 => build_input::<i16>(&device, &stream_config, sink, status),
        32 => build_input::<i32>(&device, &stream_config, sink, status),
        bits => Err(MicrophoneError::ConfigError(format!(
            "unsupported sample width: {} bits",
            bits
        ))),
    }
}

/// Run audio capture (in a dedicated thread)
fn run_audio_capture(
    device_name: Option<String>,
    config: AudioConfig,
    callback: FrameCallback,
    ready_tx: mpsc::Sender<Result<(), MicrophoneError>>,
    command_rx: mpsc::Receiver<AudioCommand>,
) {
    let stream = match build_stream(device_name.as_deref(), &config, callback) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            tracing::error!("Failed to open audio input: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    for command in command_rx {
        match command {
            AudioCommand::Start(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| MicrophoneError::StreamError(e.to_string()));
                if result.is_ok() {
                    tracing::info!("Audio capture started");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Stop(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| MicrophoneError::StreamError(e.to_string()));
                if result.is_ok() {
                    tracing::info!("Audio capture stopped");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Close => break,
        }
    }

    drop(stream);
    tracing::debug!("Audio device released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(Vec<u8>, CallbackInfo)>>>;

    fn recording_sink(frame_bytes: usize, stop_after: usize) -> (FrameSink, Seen) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let callback: FrameCallback = Box::new(move |bytes, info| {
            let mut log = log.lock().unwrap();
            log.push((bytes.to_vec(), *info));
            if log.len() >= stop_after {
                CallbackFlow::Stop
            } else {
                CallbackFlow::Continue
            }
        });
        let sink = FrameSink {
            assembler: FrameAssembler::new(frame_bytes),
            callback,
            bytes_per_frame_sample: 2,
            status: Arc::new(PendingStatus::default()),
            pending: StatusFlags::default(),
            halted: false,
        };
        (sink, seen)
    }

    #[test]
    fn sink_reports_frame_count_in_samples() {
        let (mut sink, seen) = recording_sink(4, usize::MAX);
        sink.deliver(&[0, 1, 2, 3, 4, 5, 6, 7, 8], None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, vec![0, 1, 2, 3]);
        assert_eq!(seen[0].1.frame_count, 2);
        assert_eq!(seen[1].0, vec![4, 5, 6, 7]);
    }

    #[test]
    fn sink_halts_after_stop() {
        let (mut sink, seen) = recording_sink(2, 1);
        sink.deliver(&[1, 1, 2, 2, 3, 3], None);
        sink.deliver(&[4, 4], None);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(sink.halted);
    }

    #[test]
    fn status_is_delivered_once() {
        let (mut sink, seen) = recording_sink(2, usize::MAX);
        sink.status.device_lost.store(true, Ordering::Release);
        sink.deliver(&[1, 1, 2, 2], None);

        let seen = seen.lock().unwrap();
        assert!(seen[0].1.status.device_lost);
        assert!(seen[1].1.status.is_clear());
    }

    #[test]
    fn status_survives_periods_without_a_complete_frame() {
        let (mut sink, seen) = recording_sink(4, usize::MAX);
        sink.status.stream_error.store(true, Ordering::Release);
        sink.deliver(&[1, 1], None);
        assert!(seen.lock().unwrap().is_empty());

        sink.deliver(&[2, 2], None);
        sink.deliver(&[3, 3, 4, 4], None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].1.status.stream_error);
        assert!(seen[1].1.status.is_clear());
    }

    #[test]
    fn lost_device_reaches_the_callback_after_a_short_period() {
        let (mut sink, seen) = recording_sink(4, usize::MAX);
        sink.status.record(&cpal::StreamError::DeviceNotAvailable);
        sink.deliver(&[1], None);
        sink.deliver(&[2, 3, 4], None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1.status.device_lost);
    }

    #[test]
    fn stream_errors_map_to_status_flags() {
        let status = PendingStatus::default();
        status.record(&cpal::StreamError::DeviceNotAvailable);
        assert_eq!(
            status.take(),
            StatusFlags {
                stream_error: false,
                device_lost: true,
            }
        );

        status.record(&cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "xrun".to_string(),
            },
        });
        assert_eq!(
            status.take(),
            StatusFlags {
                stream_error: true,
                device_lost: false,
            }
        );
        assert!(status.take().is_clear());
    }

    #[test]
    fn requests_fail_before_open() {
        let mut device = CpalDevice::named("no such device");
        assert!(matches!(device.start(), Err(MicrophoneError::NotStarted)));
        assert!(matches!(device.stop(), Err(MicrophoneError::NotStarted)));
        device.close();
    }
}
