//! Feature extraction from decoded audio
//!
//! Decodes the upload with symphonia and measures duration, loudness, a
//! noise-floor SNR and a zero-crossing pitch estimate. Uploads that cannot
//! be decoded fall back to the byte heuristic so extraction stays total.

use super::stub::ByteHeuristicExtractor;
use super::traits::{AudioClip, FeatureExtractor, FeatureVector};
use anyhow::{Context, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Analysis window length in seconds
const WINDOW_SECS: f32 = 0.05;
/// Windows quieter than this are treated as digital silence
const SILENCE_RMS: f32 = 1e-5;
/// Windows below this fraction of the loudest one are not voiced
const VOICED_RATIO: f32 = 0.1;
const MAX_SNR_DB: f32 = 60.0;
const MIN_PITCH_HZ: f32 = 50.0;
const MAX_PITCH_HZ: f32 = 500.0;
/// Energy score offset, maps dBFS onto a positive scale
const ENERGY_OFFSET_DB: f32 = 120.0;

/// Extractor that listens to the audio instead of counting bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodedExtractor {
    fallback: ByteHeuristicExtractor,
}

impl DecodedExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for DecodedExtractor {
    fn extract(&self, clip: &AudioClip<'_>) -> FeatureVector {
        match decode_to_mono(clip) {
            Ok((samples, sample_rate)) if !samples.is_empty() => {
                let features = measure(clip, &samples, sample_rate);
                log::debug!(
                    "Decoded {} samples at {}Hz from {:?}: {:?}",
                    samples.len(),
                    sample_rate,
                    clip.filename,
                    features
                );
                features
            }
            Ok(_) => {
                log::warn!("No samples decoded from {:?}, using byte heuristic", clip.filename);
                self.fallback.extract(clip)
            }
            Err(e) => {
                log::warn!(
                    "Decoding failed for {:?}, using byte heuristic: {:#}",
                    clip.filename,
                    e
                );
                self.fallback.extract(clip)
            }
        }
    }

    fn name(&self) -> &'static str {
        "decoded"
    }
}

fn measure(clip: &AudioClip<'_>, samples: &[f32], sample_rate: u32) -> FeatureVector {
    let duration_secs = (samples.len() as f64 / f64::from(sample_rate)).round() as u64;

    let window = ((sample_rate as f32 * WINDOW_SECS) as usize).max(1);
    let rms: Vec<f32> = samples.chunks(window).map(window_rms).collect();
    let loudest = rms.iter().copied().fold(0.0f32, f32::max);

    let snr_db = rms
        .iter()
        .copied()
        .filter(|&r| r > SILENCE_RMS)
        .fold(None, |quietest: Option<f32>, r| {
            Some(quietest.map_or(r, |q| q.min(r)))
        })
        .map(|quietest| (20.0 * (loudest / quietest).log10()).clamp(0.0, MAX_SNR_DB))
        .unwrap_or(0.0);

    let overall = window_rms(samples);
    let energy = if overall > SILENCE_RMS {
        (ENERGY_OFFSET_DB + 20.0 * overall.log10()).clamp(0.0, ENERGY_OFFSET_DB)
    } else {
        0.0
    };

    FeatureVector {
        byte_len: clip.len(),
        first_byte: clip.first_byte(),
        duration_secs,
        snr_db: snr_db.round() as u32,
        energy: energy.round() as u32,
        pitch_hz: estimate_pitch(samples, sample_rate, window, &rms, loudest).round() as u32,
    }
}

fn window_rms(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = chunk.iter().map(|s| s * s).sum();
    (sum_sq / chunk.len() as f32).sqrt()
}

/// Half the zero-crossing rate over voiced windows
fn estimate_pitch(samples: &[f32], sample_rate: u32, window: usize, rms: &[f32], loudest: f32) -> f32 {
    let threshold = loudest * VOICED_RATIO;
    let voiced = |i: usize| {
        let level = rms[i / window];
        level > threshold && level > SILENCE_RMS
    };

    let mut crossings = 0usize;
    let mut voiced_samples = 0usize;

    for i in 1..samples.len() {
        if !voiced(i) {
            continue;
        }
        voiced_samples += 1;
        if (samples[i - 1] < 0.0) != (samples[i] < 0.0) {
            crossings += 1;
        }
    }

    if voiced_samples == 0 {
        return MIN_PITCH_HZ;
    }

    let crossing_rate = crossings as f32 * sample_rate as f32 / voiced_samples as f32;
    (crossing_rate / 2.0).clamp(MIN_PITCH_HZ, MAX_PITCH_HZ)
}

fn decode_to_mono(clip: &AudioClip<'_>) -> Result<(Vec<f32>, u32)> {
    let source = Cursor::new(clip.bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = clip.extension() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio format: {:?}", clip.filename))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("No sample rate in audio track")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::debug!("Stopped reading packets: {:?}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Skipping undecodable packet: {:?}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        let channels = spec.channels.count();
        if channels > 1 {
            mono.extend(
                buffer
                    .samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        } else {
            mono.extend_from_slice(buffer.samples());
        }
    }

    Ok((mono, sample_rate))
}
