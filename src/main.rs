//! micstream - print live microphone buffers
//!
//! Opens the default input device and prints every coalesced buffer until
//! Ctrl-C, or for the number of seconds given as an argument.
//!
//! Usage: `micstream [--raw] [SECONDS]`. Without `--raw` only buffer sizes
//! are printed; with it, the bytes themselves.

use anyhow::Context;
use micstream::{AudioConfig, CaptureDevice, CpalDevice, MicrophoneStream};
use tokio::time::{sleep, Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    seconds: Option<u64>,
    raw: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--raw" => options.raw = true,
                other => {
                    let seconds = other
                        .parse::<u64>()
                        .with_context(|| format!("invalid duration: {}", other))?;
                    options.seconds = Some(seconds);
                }
            }
        }
        Ok(options)
    }
}

fn render(buffer: &[u8], raw: bool) -> String {
    if raw {
        format!("b'{}'", buffer.escape_ascii())
    } else {
        format!("{} bytes", buffer.len())
    }
}

// Opening and closing wait on the audio thread, so they run on the
// blocking pool.
async fn open_stream<D>(device: D, config: AudioConfig) -> anyhow::Result<MicrophoneStream<D>>
where
    D: CaptureDevice + Send + 'static,
{
    let stream = tokio::task::spawn_blocking(move || MicrophoneStream::open(device, config))
        .await?
        .context("failed to open microphone")?;
    Ok(stream)
}

async fn close_stream<D>(mut stream: MicrophoneStream<D>) -> anyhow::Result<()>
where
    D: CaptureDevice + Send + 'static,
{
    tokio::task::spawn_blocking(move || stream.close()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "micstream=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("micstream v{}", env!("CARGO_PKG_VERSION"));

    let options = Options::parse(std::env::args().skip(1))?;

    let devices = CpalDevice::list_devices();
    tracing::info!("Audio input devices: {:?}", devices);

    let config = AudioConfig::default();
    let stream = open_stream(CpalDevice::from_config(&config), config).await?;

    let chunks = stream.generator();
    let raw = options.raw;
    let reader = tokio::task::spawn_blocking(move || {
        let mut total = 0usize;
        for buffer in chunks {
            total += buffer.len();
            println!("{}", render(&buffer, raw));
        }
        total
    });

    match options.seconds {
        Some(seconds) => {
            tokio::select! {
                _ = sleep(Duration::from_secs(seconds)) => {}
                result = tokio::signal::ctrl_c() => result?,
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    close_stream(stream).await?;
    let total = reader.await?;
    tracing::info!("Received {} bytes in total", total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use micstream::audio::FrameCallback;
    use micstream::MicrophoneError;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, ThreadId};

    /// Records which threads the session drove it from
    #[derive(Default)]
    struct ThreadRecorder {
        seen: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl ThreadRecorder {
        fn record(&self) {
            self.seen.lock().unwrap().push(thread::current().id());
        }
    }

    impl CaptureDevice for ThreadRecorder {
        fn open(&mut self, _: &AudioConfig, _: FrameCallback) -> Result<(), MicrophoneError> {
            self.record();
            Ok(())
        }

        fn start(&mut self) -> Result<(), MicrophoneError> {
            self.record();
            Ok(())
        }

        fn stop(&mut self) -> Result<(), MicrophoneError> {
            self.record();
            Ok(())
        }

        fn close(&mut self) {
            self.record();
        }
    }

    #[test]
    fn parses_duration_and_raw_flag() {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(Options::parse(args(&[])).unwrap(), Options::default());
        assert_eq!(
            Options::parse(args(&["--raw", "5"])).unwrap(),
            Options {
                seconds: Some(5),
                raw: true,
            }
        );
        assert!(Options::parse(args(&["soon"])).is_err());
    }

    #[test]
    fn renders_sizes_or_escaped_bytes() {
        assert_eq!(render(&[0, 65, 255], false), "3 bytes");
        assert_eq!(render(&[0, 65, 255], true), "b'\\x00A\\xff'");
    }

    #[tokio::test]
    async fn device_is_driven_off_the_runtime_thread() {
        let device = ThreadRecorder::default();
        let seen = Arc::clone(&device.seen);

        let stream = open_stream(device, AudioConfig::default()).await.unwrap();
        close_stream(stream).await.unwrap();

        let runtime_thread = thread::current().id();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|id| *id != runtime_thread));
    }
}
