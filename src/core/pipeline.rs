use crate::{
    core::{audio::load_clip, engine::classify, engine::GenreModel, features::FeatureExtractor},
    error::{AtlasError, Result},
    io::net::{fetch_to_writer, song_file_name},
    types::{ClassificationResult, ErrorRecord, ScalarFeatures, SongRecord, MAX_DURATION_SECS},
};

use rand::Rng;
use reqwest::blocking::Client;
use std::path::Path;
use tempfile::Builder;
use tracing::{debug, debug_span};

/// Everything learned about one track before layout.
#[derive(Clone, Debug)]
pub struct SongAnalysis {
    pub classification: ClassificationResult,
    pub features: ScalarFeatures,
}

/// Fetch, decode, extract and classify for a single URL.
pub struct SongPipeline<'a> {
    client: &'a Client,
    model: &'a dyn GenreModel,
    extractor: FeatureExtractor,
    scratch_dir: &'a Path,
}

impl<'a> SongPipeline<'a> {
    pub fn new(client: &'a Client, model: &'a dyn GenreModel, scratch_dir: &'a Path) -> Self {
        Self {
            client,
            model,
            extractor: FeatureExtractor::default(),
            scratch_dir,
        }
    }

    /// Runs every stage; the downloaded file is removed on return, whatever
    /// the outcome.
    pub fn analyze<R: Rng>(&self, index: usize, url: &str, rng: &mut R) -> Result<SongAnalysis> {
        let _span = debug_span!("song", index, url).entered();

        let name = song_file_name(url)?;
        // The index prefix plus the random part keep concurrent downloads of
        // the same URL apart.
        let mut download = Builder::new()
            .prefix(&format!("{index:04}-"))
            .suffix(&format!("-{name}"))
            .tempfile_in(self.scratch_dir)
            .map_err(|e| AtlasError::Fetch(format!("{url}: cannot create temp file: {e}")))?;

        let bytes = fetch_to_writer(self.client, url, download.as_file_mut())?;
        debug!(bytes, path = %download.path().display(), "fetched");

        let clip = load_clip(download.path(), MAX_DURATION_SECS)?;
        let (tensor, features) = self.extractor.extract(&clip.samples, clip.sample_rate, rng)?;
        let classification = classify(self.model, &tensor)?;

        Ok(SongAnalysis {
            classification,
            features,
        })
    }

    /// Like [`analyze`](Self::analyze) but folds the outcome into a batch
    /// record.
    pub fn process<R: Rng>(
        &self,
        index: usize,
        url: &str,
        rng: &mut R,
    ) -> std::result::Result<SongRecord, ErrorRecord> {
        match self.analyze(index, url, rng) {
            Ok(a) => Ok(SongRecord {
                index,
                url: url.to_string(),
                genre: a.classification.genre,
                features: a.features,
                position: None,
            }),
            Err(e) => Err(ErrorRecord {
                index,
                url: url.to_string(),
                stage: e.stage(),
                reason: e.to_string(),
            }),
        }
    }
}
