use ndarray::{Array2, Axis};
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

pub const N_FFT: usize = 2048;
pub const HOP: usize = 512;
pub const AMIN: f32 = 1e-10;
pub const TOP_DB: f32 = 80.0;

struct FftCache {
    fft_forward: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

static FFT_CACHE_2048: Lazy<FftCache> = Lazy::new(|| {
    let mut planner = FftPlanner::new();
    FftCache {
        fft_forward: planner.plan_fft_forward(N_FFT),
        hann_window: compute_hann(N_FFT),
    }
});

/// Periodic Hann window (the FFT-friendly variant).
pub fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = n_fft as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

fn plan(n_fft: usize) -> (Arc<dyn Fft<f32>>, Vec<f32>) {
    if n_fft == N_FFT {
        let cache = &*FFT_CACHE_2048;
        (cache.fft_forward.clone(), cache.hann_window.clone())
    } else {
        let mut planner = FftPlanner::new();
        (planner.plan_fft_forward(n_fft), compute_hann(n_fft))
    }
}

/// Number of centered frames for a signal of `len` samples.
pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Splits `signal` into centered, zero-padded frames of `frame_len`.
/// Returns `frame_count(len, hop)` rows.
pub fn frames_centered(signal: &[f32], frame_len: usize, hop: usize) -> Array2<f32> {
    let t = signal.len();
    let pad = frame_len / 2;
    let frames = frame_count(t, hop);

    let mut padded = vec![0.0f32; pad + t + pad];
    padded[pad..pad + t].copy_from_slice(signal);

    let mut out = Array2::<f32>::zeros((frames, frame_len));
    for (fr, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let start = fr * hop;
        let end = (start + frame_len).min(padded.len());
        for (dst, &src) in row.iter_mut().zip(&padded[start..end]) {
            *dst = src;
        }
    }
    out
}

/// Power spectrogram `|X|^2` with center padding and a Hann window.
/// Shape is `(n_fft / 2 + 1, frames)`.
pub fn stft_power(signal: &[f32], n_fft: usize, hop: usize) -> Array2<f32> {
    let (fft, window) = plan(n_fft);
    let framed = frames_centered(signal, n_fft, hop);
    let frames = framed.nrows();
    let f_bins = n_fft / 2 + 1;

    let mut out = Array2::<f32>::zeros((f_bins, frames));
    let mut buf = vec![Complex32::zero(); n_fft];

    for (fr, frame) in framed.axis_iter(Axis(0)).enumerate() {
        for (i, (&x, &w)) in frame.iter().zip(&window).enumerate() {
            buf[i] = Complex32::new(x * w, 0.0);
        }
        fft.process(&mut buf);
        for fi in 0..f_bins {
            out[(fi, fr)] = buf[fi].norm_sqr();
        }
    }

    out
}

/// Centre frequency in Hz of each STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    let f_bins = n_fft / 2 + 1;
    (0..f_bins)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters over `0..sr/2` with Slaney area normalization.
/// Shape is `(n_mels, n_fft / 2 + 1)`. Filter edges stay in Hz rather than
/// snapping to FFT bins.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let f_min = 0.0;
    let f_max = sample_rate as f32 / 2.0;

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);

    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .collect();

    let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();

    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mut filters = Array2::<f32>::zeros((n_mels, fft_freqs.len()));

    for m in 0..n_mels {
        let left = hz_points[m];
        let center = hz_points[m + 1];
        let right = hz_points[m + 2];
        let enorm = 2.0 / (right - left);

        for (k, &f) in fft_freqs.iter().enumerate() {
            let rising = (f - left) / (center - left);
            let falling = (right - f) / (right - center);
            filters[[m, k]] = rising.min(falling).max(0.0) * enorm;
        }
    }

    filters
}

/// Applies the mel filterbank to a power spectrogram.
pub fn mel_spectrogram(power: &Array2<f32>, sample_rate: u32, n_mels: usize) -> Array2<f32> {
    let n_fft = (power.nrows() - 1) * 2;
    mel_filterbank(sample_rate, n_fft, n_mels).dot(power)
}

/// `10 * log10(S / ref)` with an `amin` floor, clipped to `top_db` below the peak.
pub fn power_to_db(power: &Array2<f32>, reference: f32, top_db: Option<f32>) -> Array2<f32> {
    let ref_db = 10.0 * reference.max(AMIN).log10();
    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10() - ref_db);
    if let Some(top) = top_db {
        let peak = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if peak.is_finite() {
            let floor = peak - top;
            db.mapv_inplace(|v| v.max(floor));
        }
    }
    db
}

pub fn max_value(a: &Array2<f32>) -> f32 {
    a.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
}
