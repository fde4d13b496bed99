use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::FailureStage;

/// Sample rate every clip is resampled to before analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;
/// Only the head of each track is analysed.
pub const MAX_DURATION_SECS: f32 = 5.0;
pub const N_MELS: usize = 64;
pub const TENSOR_FRAMES: usize = 256;
pub const SCALAR_FEATURE_COUNT: usize = 9;

/// Mono clip at the analysis sample rate.
#[derive(Clone, Debug)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Genre labels in classifier output order. The index of each variant is the
/// contract with the model's output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Rock,
    Pop,
    Classical,
    Hiphop,
    Country,
    Latin,
    EdmDance,
    Jazz,
}

impl Genre {
    pub const ALL: [Genre; 8] = [
        Genre::Rock,
        Genre::Pop,
        Genre::Classical,
        Genre::Hiphop,
        Genre::Country,
        Genre::Latin,
        Genre::EdmDance,
        Genre::Jazz,
    ];

    pub fn from_index(i: usize) -> Option<Genre> {
        Self::ALL.get(i).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Genre::Rock => "rock",
            Genre::Pop => "pop",
            Genre::Classical => "classical",
            Genre::Hiphop => "hiphop",
            Genre::Country => "country",
            Genre::Latin => "latin",
            Genre::EdmDance => "edm_dance",
            Genre::Jazz => "jazz",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Log-power mel window fed to the classifier, `N_MELS x TENSOR_FRAMES`, max 0 dB.
#[derive(Clone, Debug)]
pub struct SpectrogramTensor(pub Array2<f32>);

impl SpectrogramTensor {
    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }
}

/// Rhythm, energy and spectral-shape summary of a clip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScalarFeatures {
    pub tempo: f64,
    pub rms: f64,
    pub mean_db: f64,
    pub max_db: f64,
    pub onset_strength: f64,
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
    pub zero_crossing_rate: f64,
    pub chroma_mean: f64,
}

impl ScalarFeatures {
    /// Fixed column order of the batch feature matrix.
    pub fn to_array(&self) -> [f64; SCALAR_FEATURE_COUNT] {
        [
            self.tempo,
            self.rms,
            self.mean_db,
            self.max_db,
            self.onset_strength,
            self.spectral_centroid,
            self.spectral_rolloff,
            self.zero_crossing_rate,
            self.chroma_mean,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[derive(Clone, Debug)]
pub struct ClassificationResult {
    pub genre: Genre,
    pub probabilities: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutPoint {
    pub x: f64,
    pub z: f64,
}

impl LayoutPoint {
    pub fn distance(&self) -> f64 {
        self.x.hypot(self.z)
    }
}

/// A song that made it through fetch, decode, extraction and classification.
#[derive(Clone, Debug)]
pub struct SongRecord {
    pub index: usize,
    pub url: String,
    pub genre: Genre,
    pub features: ScalarFeatures,
    pub position: Option<LayoutPoint>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorRecord {
    pub index: usize,
    pub url: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// One entry of the batch JSON output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedSong {
    pub url: String,
    pub genre: Genre,
    pub x: f64,
    pub z: f64,
}

/// Output of the single-song mode. `tempo`/`loudness` are only present in
/// the rich variant and never on the fallback object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleSongOutput {
    pub genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub min_distance: f64,
    pub max_distance: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_distance: 200.0,
            max_distance: 1000.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Worker threads for per-song work; `None` uses available parallelism.
    pub jobs: Option<usize>,
    pub fetch_timeout_secs: u64,
    /// Fixes noise and window selection for reproducible runs.
    pub seed: Option<u64>,
    pub layout: LayoutConfig,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            fetch_timeout_secs: 30,
            seed: None,
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub file: String,
    pub url: String,
    pub sha256: String,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub sample_rate: u32,
    pub n_mels: usize,
    pub frames: usize,
    pub input_shape: Vec<usize>,
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    pub categories: Vec<String>,
    pub artifacts: Vec<ModelArtifact>,
}

impl ModelManifest {
    pub fn resolve_primary_artifact(&self) -> Result<&ModelArtifact, String> {
        self.artifacts
            .iter()
            .find(|a| a.file.ends_with(".onnx"))
            .or_else(|| self.artifacts.first())
            .ok_or_else(|| format!("Manifest `{}` lists no artifacts", self.name))
    }

    /// Checks the manifest describes a model this crate can drive.
    pub fn validate(&self) -> Result<(), String> {
        let labels: Vec<&str> = Genre::ALL.iter().map(|g| g.label()).collect();
        if self.categories != labels {
            return Err(format!(
                "categories {:?} do not match expected {:?}",
                self.categories, labels
            ));
        }
        if self.sample_rate != ANALYSIS_SAMPLE_RATE {
            return Err(format!(
                "sample_rate {} (expected {})",
                self.sample_rate, ANALYSIS_SAMPLE_RATE
            ));
        }
        if self.n_mels != N_MELS || self.frames != TENSOR_FRAMES {
            return Err(format!(
                "tensor {}x{} (expected {}x{})",
                self.n_mels, self.frames, N_MELS, TENSOR_FRAMES
            ));
        }
        let product: usize = self.input_shape.iter().product();
        if product != N_MELS * TENSOR_FRAMES {
            return Err(format!(
                "input_shape {:?} does not hold a {}x{} tensor",
                self.input_shape, N_MELS, TENSOR_FRAMES
            ));
        }
        Ok(())
    }
}
