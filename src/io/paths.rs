use crate::error::{AtlasError, Result};
use directories::ProjectDirs;
use std::{env, path::PathBuf};

pub fn models_cache_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "GenreAtlas", "genre-atlas")
        .ok_or(AtlasError::CacheDirUnavailable)?;
    let mut p = PathBuf::from(proj.cache_dir());
    p.push("models");
    Ok(p)
}

/// Parent directory for per-batch scratch dirs holding downloaded songs.
pub fn work_dir() -> PathBuf {
    env::var("GENRE_ATLAS_TMP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}
