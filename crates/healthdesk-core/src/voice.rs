//! Microphone capture and audio file uploads for voice consultations.
//!
//! Capture uses cpal on a blocking thread; the recording is encoded to WAV with hound
//! before it is sent for transcription.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

use crate::config::{MAX_RECORD_SECONDS, MIN_RECORD_SECONDS};
use crate::error::{DeskError, DeskResult};

/// Mono PCM captured from the microphone
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Recording {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode as 16-bit PCM mono WAV
    pub fn to_wav(&self) -> DeskResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(sample_i16)?;
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

pub struct Recorder;

impl Recorder {
    pub fn is_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// Record from the default input device for `seconds` (3..=12).
    pub async fn record(seconds: u32) -> DeskResult<Recording> {
        if !(MIN_RECORD_SECONDS..=MAX_RECORD_SECONDS).contains(&seconds) {
            return Err(DeskError::validation(format!(
                "Recording duration must be between {} and {} seconds.",
                MIN_RECORD_SECONDS, MAX_RECORD_SECONDS
            )));
        }

        tokio::task::spawn_blocking(move || Self::record_blocking(Duration::from_secs(seconds as u64)))
            .await
            .map_err(|e| DeskError::Audio(format!("recording task failed: {}", e)))?
    }

    fn record_blocking(duration: Duration) -> DeskResult<Recording> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeskError::Audio("no input device".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| DeskError::Audio(e.to_string()))?;

        let channels = supported.channels() as usize;
        let sample_rate = supported.sample_rate().0;
        let config = supported.config();
        let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, Arc::clone(&buffer), |s| s),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, Arc::clone(&buffer), |s| {
                s as f32 / i16::MAX as f32
            }),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, Arc::clone(&buffer), |s| {
                (s as f32 - 32768.0) / 32768.0
            }),
            other => {
                return Err(DeskError::Audio(format!("unsupported sample format {:?}", other)));
            }
        }?;

        stream.play().map_err(|e| DeskError::Audio(e.to_string()))?;
        info!("Recording {:.0}s at {} Hz", duration.as_secs_f32(), sample_rate);
        std::thread::sleep(duration);
        drop(stream);

        let samples = buffer
            .lock()
            .map_err(|_| DeskError::Audio("capture buffer poisoned".to_string()))?
            .clone();

        Ok(Recording { samples, sample_rate })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    buffer: Arc<Mutex<Vec<f32>>>,
    to_f32: fn(T) -> f32,
) -> DeskResult<cpal::Stream>
where
    T: SizedSample + Send + 'static,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if let Ok(mut out) = buffer.lock() {
                    // Downmix interleaved frames to mono
                    for frame in data.chunks(channels.max(1)) {
                        let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
                        out.push(sum / frame.len() as f32);
                    }
                }
            },
            |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| DeskError::Audio(e.to_string()))
}

/// An audio file chosen by the user in place of a live recording
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn mime_for(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "wav" => Some("audio/wav"),
            "mp3" => Some("audio/mp3"),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> DeskResult<Self> {
        let mime_type = Self::mime_for(path)
            .ok_or_else(|| DeskError::validation("Upload a .wav or .mp3 audio file."))?;
        if !path.is_file() {
            return Err(DeskError::validation(format!("No audio file at {}", path.display())));
        }
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self { file_name, mime_type, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_and_length() {
        let recording = Recording {
            samples: vec![0.0, 0.5, -0.5, 1.0, -1.5],
            sample_rate: 16000,
        };
        let wav = recording.to_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -16383, 32767, -32768]);
    }

    #[test]
    fn test_duration() {
        let recording = Recording { samples: vec![0.0; 8000], sample_rate: 16000 };
        assert!((recording.duration_secs() - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_duration_bounds_checked_before_capture() {
        assert!(matches!(Recorder::record(2).await, Err(DeskError::Validation(_))));
        assert!(matches!(Recorder::record(13).await, Err(DeskError::Validation(_))));
    }

    #[test]
    fn test_upload_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("Question.WAV");
        std::fs::write(&wav, b"RIFF....").unwrap();
        let upload = AudioUpload::from_path(&wav).unwrap();
        assert_eq!(upload.mime_type, "audio/wav");
        assert_eq!(upload.file_name, "Question.WAV");

        let ogg = dir.path().join("q.ogg");
        std::fs::write(&ogg, b"x").unwrap();
        assert!(AudioUpload::from_path(&ogg).is_err());
        assert!(AudioUpload::from_path(&dir.path().join("missing.mp3")).is_err());
    }
}
