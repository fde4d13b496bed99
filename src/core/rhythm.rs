use ndarray::{Array2, Axis};

const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 320.0;
const PRIOR_BPM: f64 = 120.0;
const PRIOR_STD_OCTAVES: f64 = 1.0;

/// Onset strength per frame: half-wave rectified first difference of a dB
/// spectrogram, averaged over bands. Frame 0 has strength 0.
pub fn onset_envelope(spec_db: &Array2<f32>) -> Vec<f32> {
    let frames = spec_db.ncols();
    let bands = spec_db.nrows().max(1) as f32;
    let mut env = vec![0.0f32; frames];

    for t in 1..frames {
        let prev = spec_db.index_axis(Axis(1), t - 1);
        let cur = spec_db.index_axis(Axis(1), t);
        let flux: f32 = cur
            .iter()
            .zip(prev.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        env[t] = flux / bands;
    }
    env
}

/// Global tempo in BPM from an onset envelope sampled every `hop` samples.
///
/// Autocorrelation over the 30-320 BPM lag range, weighted by a log-normal
/// prior around 120 BPM. Returns 0 for envelopes with no energy.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize) -> f64 {
    let n = envelope.len();
    if n < 2 || envelope.iter().all(|&v| v <= 0.0) {
        return 0.0;
    }

    let frame_rate = sample_rate as f64 / hop as f64;
    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(n - 1);
    if min_lag > max_lag {
        return 0.0;
    }

    let mut best: Option<(f64, usize)> = None;
    for lag in min_lag..=max_lag {
        let ac: f64 = envelope[..n - lag]
            .iter()
            .zip(&envelope[lag..])
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum();
        let bpm = 60.0 * frame_rate / lag as f64;
        let octaves = (bpm.log2() - PRIOR_BPM.log2()) / PRIOR_STD_OCTAVES;
        let score = ac * (-0.5 * octaves * octaves).exp();
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, lag));
        }
    }

    match best {
        Some((score, lag)) if score > 0.0 => 60.0 * frame_rate / lag as f64,
        _ => 0.0,
    }
}
