//! Single-track mode.
//!
//! Unlike a batch, this mode never reports failure to the caller: any error is
//! logged and replaced by an object carrying only the fallback genre.

use crate::{
    core::{batch::song_rng, engine::GenreModel, pipeline::SongPipeline},
    error::Result,
    io::{net::http_client, paths::work_dir},
    types::SingleSongOutput,
};

use std::{fs, time::Duration};
use tracing::error;

pub const DEFAULT_FALLBACK_GENRE: &str = "Blues";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleMode {
    /// `{"genre": ...}`
    GenreOnly,
    /// `{"genre": ..., "tempo": ..., "loudness": ...}`
    Rich,
}

#[derive(Debug, Clone)]
pub struct SingleOptions {
    pub mode: SingleMode,
    pub fallback_genre: String,
    pub fetch_timeout_secs: u64,
    pub seed: Option<u64>,
}

impl Default for SingleOptions {
    fn default() -> Self {
        Self {
            mode: SingleMode::GenreOnly,
            fallback_genre: DEFAULT_FALLBACK_GENRE.into(),
            fetch_timeout_secs: 30,
            seed: None,
        }
    }
}

pub fn fallback_output(opts: &SingleOptions) -> SingleSongOutput {
    SingleSongOutput {
        genre: opts.fallback_genre.clone(),
        tempo: None,
        loudness: None,
    }
}

fn try_classify_single(
    url: &str,
    opts: &SingleOptions,
    model: &dyn GenreModel,
) -> Result<SingleSongOutput> {
    let client = http_client(Duration::from_secs(opts.fetch_timeout_secs.max(1)))?;
    let parent = work_dir();
    fs::create_dir_all(&parent)?;
    let scratch = tempfile::Builder::new()
        .prefix("genre-atlas-")
        .tempdir_in(&parent)?;

    let pipeline = SongPipeline::new(&client, model, scratch.path());
    let mut rng = song_rng(opts.seed, 0);
    let analysis = pipeline.analyze(0, url, &mut rng)?;

    let genre = analysis.classification.genre.label().to_string();
    Ok(match opts.mode {
        SingleMode::GenreOnly => SingleSongOutput {
            genre,
            tempo: None,
            loudness: None,
        },
        SingleMode::Rich => SingleSongOutput {
            genre,
            tempo: Some(analysis.features.tempo),
            loudness: Some(analysis.features.rms),
        },
    })
}

/// Classifies one URL; on any failure returns the fallback object instead.
pub fn classify_single(
    url: &str,
    opts: &SingleOptions,
    model: &dyn GenreModel,
) -> SingleSongOutput {
    match try_classify_single(url, opts, model) {
        Ok(out) => out,
        Err(e) => {
            error!(url, error = %e, "single-song classification failed, using fallback genre");
            fallback_output(opts)
        }
    }
}
