//! # genre-atlas
//!
//! Batch genre classification for remote audio tracks: each URL is fetched,
//! decoded, turned into a mel spectrogram and a handful of scalar features,
//! and classified by a pretrained model. The scalar features of all
//! successful tracks are then laid out on a plane so similar-sounding tracks
//! sit near each other.

pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod types;

pub use crate::{
    core::{
        assembler::{render_report, BatchReport},
        audio::{load_clip, write_audio},
        batch::{classify_and_layout, parse_url_list, run_batch, BatchOutcome},
        engine::{classify, preload, GenreModel, OnnxGenreModel},
        features::FeatureExtractor,
        layout::layout,
        pipeline::{SongAnalysis, SongPipeline},
        single::{classify_single, SingleMode, SingleOptions},
    },
    error::{AtlasError, FailureStage, Result},
    io::progress::{set_batch_progress_callback, set_download_progress_callback, BatchProgress},
    model::{
        model_manager::{ensure_model, prepare_model, ModelHandle},
        registry::load_registry,
    },
    types::*,
};
