use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use rtrb::{Consumer, Producer, RingBuffer};
use vt_core::config::CaptureConfig;
use vt_core::error::CaptureError;
use vt_core::traits::{CaptureHandle, CaptureSource, Snapshot};

use crate::spectrum::AnalysisWindow;

/// Capture micro via cpal.
///
/// Ne contient que la configuration : le flux est ouvert par `open()`, sur le
/// thread qui pilotera les snapshots.
///
/// # Example
/// ```no_run
/// use vt_audio::capture::MicrophoneSource;
/// use vt_core::config::CaptureConfig;
/// use vt_core::traits::{CaptureHandle, CaptureSource};
///
/// let mut source = MicrophoneSource::new(CaptureConfig::default());
/// let mut handle = source.open().unwrap();
/// let snap = handle.snapshot().unwrap();
/// assert_eq!(snap.samples.len(), 2048);
/// ```
pub struct MicrophoneSource {
    config: CaptureConfig,
    device_name: Option<String>,
}

impl MicrophoneSource {
    #[must_use]
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            device_name: None,
        }
    }

    /// Capture from the input device with this exact name instead of the default one.
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    fn find_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        match self.device_name.as_deref() {
            None => host
                .default_input_device()
                .ok_or(CaptureError::DeviceUnavailable),
            Some(wanted) => host
                .input_devices()
                .map_err(|e| CaptureError::Stream(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == wanted))
                .ok_or(CaptureError::DeviceUnavailable),
        }
    }
}

impl CaptureSource for MicrophoneSource {
    type Handle = MicrophoneHandle;

    fn open(&mut self) -> Result<MicrophoneHandle, CaptureError> {
        // cpal only delivers the raw device signal; it cannot switch on
        // platform echo-cancellation / noise-suppression / AGC.
        if !self.config.constraints.is_raw() {
            return Err(CaptureError::UnsupportedConstraints(format!(
                "{:?}",
                self.config.constraints
            )));
        }

        let host = cpal::default_host();
        let device = self.find_device(&host)?;
        let supported = device
            .default_input_config()
            .map_err(|e| match e {
                cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                    CaptureError::DeviceUnavailable
                }
                cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                    classify_backend(&err.description)
                }
                other => CaptureError::Stream(other.to_string()),
            })?;

        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels().max(1));
        let sample_format = supported.sample_format();
        let stream_config = supported.config();

        // Ring buffer : 1 seconde d'audio, largement plus qu'un tick.
        let ring_size = (sample_rate as usize).max(self.config.fft_size * 4);
        let (producer, consumer) = RingBuffer::new(ring_size);

        let watch = DeviceWatch::new();
        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, producer, &watch)
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, channels, producer, &watch)
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, channels, producer, &watch)
            }
            SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, channels, producer, &watch)
            }
            other => Err(CaptureError::Stream(format!(
                "Format d'échantillon non supporté : {other:?}"
            ))),
        }?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { err } => classify_backend(&err.description),
        })?;

        log::info!(
            "Capture micro ouverte : {} @ {sample_rate}Hz, {channels} canal(aux), {sample_format:?}",
            device.name().unwrap_or_else(|_| "?".to_string())
        );

        Ok(MicrophoneHandle {
            stream: Some(stream),
            consumer,
            window: AnalysisWindow::new(&self.config),
            sample_rate,
            watch,
        })
    }
}

/// Signal « périphérique perdu » partagé entre le callback d'erreur cpal et le handle.
#[derive(Clone, Debug, Default)]
struct DeviceWatch {
    lost: Arc<AtomicBool>,
}

impl DeviceWatch {
    fn new() -> Self {
        Self::default()
    }

    /// Error callback for `build_input_stream`. Only a vanished device ends the capture;
    /// other stream errors are transient and just logged.
    fn error_callback(&self) -> impl FnMut(cpal::StreamError) + Send + 'static {
        let watch = self.clone();
        move |err| watch.report(&err)
    }

    fn report(&self, err: &cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                log::error!("Périphérique d'entrée perdu : {err}");
                self.lost.store(true, Ordering::Release);
            }
            other => log::error!("Audio stream error: {other}"),
        }
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

/// Build an input stream that downmixes to mono and pushes into the ring buffer.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut producer: Producer<f32>,
    watch: &DeviceWatch,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for chunk in data.chunks(channels) {
                    let mono: f32 = chunk.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>()
                        / chunk.len() as f32;
                    // Ring plein : le consommateur rattrape au prochain snapshot.
                    let _ = producer.push(mono);
                }
            },
            watch.error_callback(),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::BuildStreamError::BackendSpecific { err } => classify_backend(&err.description),
            other => CaptureError::Stream(other.to_string()),
        })
}

/// Backends report permission refusal as free text (CoreAudio, WASAPI, ALSA).
fn classify_backend(description: &str) -> CaptureError {
    let lower = description.to_lowercase();
    if ["permission", "denied", "not authorized", "unauthorized", "not permitted"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Stream(description.to_string())
    }
}

/// Handle ouvert sur le micro. Possède le flux cpal et la fenêtre d'analyse.
pub struct MicrophoneHandle {
    stream: Option<cpal::Stream>,
    consumer: Consumer<f32>,
    window: AnalysisWindow,
    sample_rate: u32,
    watch: DeviceWatch,
}

impl MicrophoneHandle {
    /// Move everything the callback produced since the last call into the window.
    fn drain(&mut self) {
        let available = self.consumer.slots();
        if available == 0 {
            return;
        }
        if let Ok(chunk) = self.consumer.read_chunk(available) {
            let (head, tail) = chunk.as_slices();
            self.window.push(head);
            self.window.push(tail);
            chunk.commit_all();
        }
    }
}

impl CaptureHandle for MicrophoneHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn snapshot(&mut self) -> Result<Snapshot<'_>, CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::HandleClosed);
        }
        // Device gone: the ring will never refill, close instead of replaying a frozen window.
        if self.watch.is_lost() {
            self.close();
            return Err(CaptureError::HandleClosed);
        }
        self.drain();
        Ok(self.window.refresh(self.sample_rate))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("Pause du flux à la fermeture : {e}");
            }
            drop(stream);
            self.window.reset();
            log::info!("Capture micro fermée");
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.close();
    }
}
