#![allow(dead_code)]

use std::f32::consts::PI;

use genre_atlas::{write_audio, AtlasError, AudioClip, GenreModel, SpectrogramTensor};
use tempfile::tempdir;

pub fn sine(freq: f32, secs: f32, sample_rate: u32, amp: f32) -> Vec<f32> {
    let n = (secs * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Short clicks every `60 / bpm` seconds.
pub fn click_track(bpm: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
    let n = (secs * sample_rate as f32) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let mut out = vec![0.0f32; n];
    for start in (0..n).step_by(period) {
        for (k, s) in out[start..(start + 64).min(n)].iter_mut().enumerate() {
            *s = 0.8 * (1.0 - k as f32 / 64.0) * if k % 2 == 0 { 1.0 } else { -1.0 };
        }
    }
    out
}

/// Mono 16-bit WAV file contents.
pub fn wav_bytes(samples: Vec<f32>, sample_rate: u32) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_audio(
        &path,
        &AudioClip {
            samples,
            sample_rate,
        },
    )
    .unwrap();
    std::fs::read(&path).unwrap()
}

/// Always votes for the same genre index.
pub struct FixedModel(pub usize);

impl GenreModel for FixedModel {
    fn predict(&self, _tensor: &SpectrogramTensor) -> genre_atlas::Result<Vec<f32>> {
        let mut p = vec![0.02f32; 8];
        p[self.0] = 0.86;
        Ok(p)
    }
}

/// Picks a genre from the tensor contents so different songs can differ.
pub struct TensorHashModel;

impl GenreModel for TensorHashModel {
    fn predict(&self, tensor: &SpectrogramTensor) -> genre_atlas::Result<Vec<f32>> {
        let mean = tensor.as_array().mean().unwrap_or(0.0);
        let idx = (mean.abs() as usize) % 8;
        let mut p = vec![0.0f32; 8];
        p[idx] = 1.0;
        Ok(p)
    }
}

/// Mimics a model whose output layer does not match the category list.
pub struct WrongShapeModel;

impl GenreModel for WrongShapeModel {
    fn predict(&self, _tensor: &SpectrogramTensor) -> genre_atlas::Result<Vec<f32>> {
        Ok(vec![0.5, 0.5])
    }
}

pub struct FailingModel;

impl GenreModel for FailingModel {
    fn predict(&self, _tensor: &SpectrogramTensor) -> genre_atlas::Result<Vec<f32>> {
        Err(AtlasError::Classification("weights unavailable".into()))
    }
}
