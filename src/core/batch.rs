use crate::{
    core::{assembler::assemble, engine::GenreModel, layout::layout, pipeline::SongPipeline},
    error::Result,
    io::{
        net::http_client,
        paths::work_dir,
        progress::{emit_batch_progress, BatchProgress},
    },
    types::{BatchOptions, ErrorRecord, LayoutConfig, PlacedSong, SongRecord, SCALAR_FEATURE_COUNT},
};

use ndarray::Array2;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use std::{
    fs,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Per-song results of a batch, both lists in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<SongRecord>,
    pub failed: Vec<ErrorRecord>,
}

impl BatchOutcome {
    /// Scalar features of the succeeded songs, one row per song.
    pub fn feature_matrix(&self) -> Array2<f64> {
        let mut m = Array2::<f64>::zeros((self.succeeded.len(), SCALAR_FEATURE_COUNT));
        for (mut row, song) in m.rows_mut().into_iter().zip(&self.succeeded) {
            for (dst, v) in row.iter_mut().zip(song.features.to_array()) {
                *dst = v;
            }
        }
        m
    }

    /// Lays out every succeeded song at once and builds the output rows.
    pub fn into_placed(self, cfg: &LayoutConfig) -> Vec<PlacedSong> {
        if self.succeeded.is_empty() {
            return Vec::new();
        }
        let positions = layout(&self.feature_matrix(), cfg);
        assemble(self.succeeded, &positions)
    }
}

/// Splits a comma-separated URL argument, dropping blanks.
pub fn parse_url_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn song_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(index as u64)),
        None => StdRng::from_os_rng(),
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Processes every URL on a bounded worker pool. A failing song only lands in
/// `failed`; only setup problems (client, scratch dir, pool) are returned as
/// errors.
pub fn run_batch(
    urls: &[String],
    opts: &BatchOptions,
    model: &dyn GenreModel,
) -> Result<BatchOutcome> {
    let t0 = Instant::now();
    let total = urls.len();
    emit_batch_progress(BatchProgress::Stage("analyze"));

    let client = http_client(Duration::from_secs(opts.fetch_timeout_secs.max(1)))?;

    let parent = work_dir();
    fs::create_dir_all(&parent)?;
    let scratch = tempfile::Builder::new()
        .prefix("genre-atlas-")
        .tempdir_in(&parent)?;

    let jobs = opts.jobs.unwrap_or_else(default_jobs).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(anyhow::Error::from)?;
    info!(songs = total, jobs, "batch started");

    let pipeline = SongPipeline::new(&client, model, scratch.path());
    let done = AtomicUsize::new(0);

    let results: Vec<std::result::Result<SongRecord, ErrorRecord>> = pool.install(|| {
        urls.par_iter()
            .enumerate()
            .map(|(index, url)| {
                let mut rng = song_rng(opts.seed, index);
                let result = pipeline.process(index, url, &mut rng);
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                emit_batch_progress(BatchProgress::Songs {
                    done: finished,
                    total,
                });
                result
            })
            .collect()
    });

    let mut outcome = BatchOutcome::default();
    for r in results {
        match r {
            Ok(song) => outcome.succeeded.push(song),
            Err(failure) => {
                warn!(
                    url = %failure.url,
                    stage = ?failure.stage,
                    reason = %failure.reason,
                    "song skipped"
                );
                outcome.failed.push(failure);
            }
        }
    }

    info!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "batch finished"
    );
    emit_batch_progress(BatchProgress::Finished {
        succeeded: outcome.succeeded.len(),
        failed: outcome.failed.len(),
    });

    Ok(outcome)
}

/// Batch plus layout: the JSON rows for every song that made it through.
pub fn classify_and_layout(
    urls: &[String],
    opts: &BatchOptions,
    model: &dyn GenreModel,
) -> Result<(Vec<PlacedSong>, Vec<ErrorRecord>)> {
    let outcome = run_batch(urls, opts, model)?;
    emit_batch_progress(BatchProgress::Stage("layout"));
    let failed = outcome.failed.clone();
    let placed = outcome.into_placed(&opts.layout);
    Ok((placed, failed))
}
