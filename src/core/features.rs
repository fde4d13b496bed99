//! Spectrogram tensor and scalar descriptors for one clip.
//!
//! The tensor is computed from a lightly noised copy of the waveform and a
//! randomly placed window; the scalar features always come from the clean,
//! full-length waveform. The random source is passed in so callers can fix it.

use ndarray::{s, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::trace;

use crate::{
    core::{
        dsp::{
            fft_frequencies, frames_centered, max_value, mel_spectrogram, power_to_db, stft_power,
            HOP, N_FFT, TOP_DB,
        },
        rhythm::{estimate_tempo, onset_envelope},
    },
    error::{AtlasError, Result},
    types::{ScalarFeatures, SpectrogramTensor, N_MELS, TENSOR_FRAMES},
};

const ROLLOFF_PERCENT: f32 = 0.85;
const CHROMA_MIN_HZ: f32 = 27.5;
const EPS: f32 = 1e-10;

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pub noise_factor: f32,
    pub n_mels: usize,
    pub frames: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            noise_factor: 0.005,
            n_mels: N_MELS,
            frames: TENSOR_FRAMES,
        }
    }
}

impl FeatureExtractor {
    pub fn extract<R: Rng>(
        &self,
        samples: &[f32],
        sample_rate: u32,
        rng: &mut R,
    ) -> Result<(SpectrogramTensor, ScalarFeatures)> {
        if samples.is_empty() {
            return Err(AtlasError::FeatureExtraction("empty waveform".into()));
        }
        if sample_rate == 0 {
            return Err(AtlasError::FeatureExtraction("sample rate is zero".into()));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(AtlasError::FeatureExtraction(
                "waveform contains non-finite samples".into(),
            ));
        }

        let tensor = self.spectrogram_tensor(samples, sample_rate, rng)?;
        let scalars = scalar_features(samples, sample_rate, self.n_mels)?;
        Ok((tensor, scalars))
    }

    /// Noised mel spectrogram, windowed to `frames` columns and converted to
    /// dB relative to the window's own peak. Clips shorter than the window are
    /// padded at the end with zero-power frames, which land on the -80 dB floor.
    pub fn spectrogram_tensor<R: Rng>(
        &self,
        samples: &[f32],
        sample_rate: u32,
        rng: &mut R,
    ) -> Result<SpectrogramTensor> {
        let normal = Normal::new(0.0f32, 1.0f32)
            .map_err(|e| AtlasError::FeatureExtraction(e.to_string()))?;
        let noisy: Vec<f32> = samples
            .iter()
            .map(|&x| x + self.noise_factor * normal.sample(rng))
            .collect();

        let mel = mel_spectrogram(&stft_power(&noisy, N_FFT, HOP), sample_rate, self.n_mels);
        let total = mel.ncols();
        let start = if total > self.frames {
            rng.random_range(0..=total - self.frames)
        } else {
            0
        };
        let end = (start + self.frames).min(total);
        trace!(total, start, end, "spectrogram window");

        let mut window = Array2::<f32>::zeros((self.n_mels, self.frames));
        window
            .slice_mut(s![.., ..end - start])
            .assign(&mel.slice(s![.., start..end]));

        let db = power_to_db(&window, max_value(&window), Some(TOP_DB));
        if db.dim() != (self.n_mels, self.frames) || db.iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::FeatureExtraction(format!(
                "malformed spectrogram tensor {:?}",
                db.dim()
            )));
        }
        Ok(SpectrogramTensor(db))
    }
}

pub fn scalar_features(samples: &[f32], sample_rate: u32, n_mels: usize) -> Result<ScalarFeatures> {
    let power = stft_power(samples, N_FFT, HOP);
    let mel = mel_spectrogram(&power, sample_rate, n_mels);
    let mel_db = power_to_db(&mel, 1.0, Some(TOP_DB));

    let envelope = onset_envelope(&mel_db);
    let tempo = estimate_tempo(&envelope, sample_rate, HOP);
    let onset_strength = mean(envelope.iter().copied());

    let framed = frames_centered(samples, N_FFT, HOP);
    let rms = mean(framed.axis_iter(Axis(0)).map(|f| {
        let energy: f32 = f.iter().map(|x| x * x).sum();
        (energy / f.len() as f32).sqrt()
    }));
    let zero_crossing_rate = mean(framed.axis_iter(Axis(0)).map(|f| {
        let crossings = f
            .iter()
            .zip(f.iter().skip(1))
            .filter(|(a, b)| (**a >= 0.0) != (**b >= 0.0))
            .count();
        crossings as f32 / f.len() as f32
    }));

    let freqs = fft_frequencies(sample_rate, N_FFT);
    let magnitude = power.mapv(f32::sqrt);
    let mut centroids = Vec::with_capacity(magnitude.ncols());
    let mut rolloffs = Vec::with_capacity(magnitude.ncols());
    for col in magnitude.axis_iter(Axis(1)) {
        let total: f32 = col.sum();
        if total <= EPS {
            centroids.push(0.0);
            rolloffs.push(0.0);
            continue;
        }
        let weighted: f32 = col.iter().zip(&freqs).map(|(m, f)| m * f).sum();
        centroids.push(weighted / total);

        let threshold = ROLLOFF_PERCENT * total;
        let mut acc = 0.0;
        let mut rolloff = freqs[freqs.len() - 1];
        for (m, &f) in col.iter().zip(&freqs) {
            acc += m;
            if acc >= threshold {
                rolloff = f;
                break;
            }
        }
        rolloffs.push(rolloff);
    }

    let features = ScalarFeatures {
        tempo,
        rms,
        mean_db: mean(mel_db.iter().copied()),
        max_db: max_value(&mel_db) as f64,
        onset_strength,
        spectral_centroid: mean(centroids.into_iter()),
        spectral_rolloff: mean(rolloffs.into_iter()),
        zero_crossing_rate,
        chroma_mean: chroma_mean(&power, &freqs),
    };

    if !features.is_finite() {
        return Err(AtlasError::FeatureExtraction(format!(
            "non-finite scalar features: {features:?}"
        )));
    }
    Ok(features)
}

/// Mean of a 12-bin chroma matrix whose frames are each scaled to a peak of 1.
fn chroma_mean(power: &Array2<f32>, freqs: &[f32]) -> f64 {
    let pitch_class: Vec<Option<usize>> = freqs
        .iter()
        .map(|&f| {
            (f >= CHROMA_MIN_HZ).then(|| {
                let semis = (12.0 * (f / 440.0).log2()).round() as i64;
                // A is pitch class 9 with C at 0.
                (semis + 9).rem_euclid(12) as usize
            })
        })
        .collect();

    let mut total = 0.0f64;
    let frames = power.ncols();
    for col in power.axis_iter(Axis(1)) {
        let mut chroma = [0.0f32; 12];
        for (p, pc) in col.iter().zip(&pitch_class) {
            if let Some(pc) = pc {
                chroma[*pc] += p;
            }
        }
        let peak = chroma.iter().cloned().fold(0.0f32, f32::max);
        if peak > EPS {
            total += chroma.iter().map(|c| (c / peak) as f64).sum::<f64>();
        }
    }

    if frames == 0 {
        0.0
    } else {
        total / (12 * frames) as f64
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f64 {
    let (sum, n) = values.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
