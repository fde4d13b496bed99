use crate::{
    error::{AtlasError, Result},
    io::{
        crypto::verify_sha256,
        net::{download_with_progress, model_http_client},
        paths::models_cache_dir,
    },
    model::registry::resolve_manifest_url,
    types::{Genre, ModelManifest, ANALYSIS_SAMPLE_RATE, N_MELS, TENSOR_FRAMES},
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

impl ModelHandle {
    /// Wraps a model file already on disk; assumes the standard `[1, 64, 256]`
    /// input and the fixed category order.
    pub fn from_local_file(path: &Path) -> Result<ModelHandle> {
        if !path.is_file() {
            return Err(AtlasError::Manifest(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("local")
            .to_string();
        let manifest = ModelManifest {
            name,
            version: "local".into(),
            backend: "onnx".into(),
            sample_rate: ANALYSIS_SAMPLE_RATE,
            n_mels: N_MELS,
            frames: TENSOR_FRAMES,
            input_shape: vec![1, N_MELS, TENSOR_FRAMES],
            input_name: None,
            output_name: None,
            categories: Genre::ALL.iter().map(|g| g.label().to_string()).collect(),
            artifacts: Vec::new(),
        };
        Ok(ModelHandle {
            manifest,
            local_path: path.to_path_buf(),
        })
    }
}

pub fn ensure_model(model_name: &str, manifest_url_override: Option<&str>) -> Result<ModelHandle> {
    let manifest_url = match manifest_url_override {
        Some(url) => url.to_string(),
        None => resolve_manifest_url(model_name)?,
    };
    debug!(%manifest_url, "fetching model manifest");

    let client = model_http_client()?;
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.json())
        .map_err(|e| {
            AtlasError::Manifest(format!(
                "cannot load manifest {manifest_url}: {e}; a local model file can be used instead"
            ))
        })?;

    manifest
        .validate()
        .map_err(|msg| AtlasError::Manifest(format!("{}: {msg}", manifest.name)))?;

    let a = manifest
        .resolve_primary_artifact()
        .map_err(AtlasError::Manifest)?;

    if a.sha256.len() < 8 {
        return Err(AtlasError::Manifest(format!(
            "artifact `{}` has an invalid sha256",
            a.file
        )));
    }

    let cache_dir = models_cache_dir()?;
    fs::create_dir_all(&cache_dir)?;
    let ext = Path::new(&a.file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| format!(".{s}"))
        .unwrap_or_default();
    let file_name = format!("{}-{}{}", manifest.name, &a.sha256[..8], ext);
    let local_path = cache_dir.join(file_name);

    let need_download = !matches!(verify_sha256(&local_path, &a.sha256), Ok(true));
    if need_download {
        info!(model = %manifest.name, url = %a.url, "downloading model");
        download_with_progress(&client, &a.url, &local_path)?;
        if !verify_sha256(&local_path, &a.sha256)? {
            fs::remove_file(&local_path).ok();
            return Err(AtlasError::Checksum {
                path: local_path.display().to_string(),
            });
        }
        if a.size_bytes > 0 {
            let size = fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            if size != a.size_bytes {
                warn!(
                    path = %local_path.display(),
                    expected = a.size_bytes,
                    got = size,
                    "model size mismatch"
                );
            }
        }
    } else {
        debug!(path = %local_path.display(), "using cached model");
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}

/// Resolves the model to use: an explicit file wins over the registry.
pub fn prepare_model(
    model_name: &str,
    manifest_url_override: Option<&str>,
    model_path: Option<&Path>,
) -> Result<ModelHandle> {
    match model_path {
        Some(p) => ModelHandle::from_local_file(p),
        None => ensure_model(model_name, manifest_url_override),
    }
}
