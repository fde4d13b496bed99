use crate::{
    error::{AtlasError, Result},
    model::model_manager::ModelHandle,
    types::{ClassificationResult, Genre, ModelManifest, SpectrogramTensor},
};

use once_cell::sync::OnceCell;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};
use std::sync::Mutex;
use tracing::{debug, info};

/// Anything that turns a spectrogram tensor into one score per genre.
pub trait GenreModel: Send + Sync {
    fn predict(&self, tensor: &SpectrogramTensor) -> Result<Vec<f32>>;
}

static MODEL: OnceCell<OnnxGenreModel> = OnceCell::new();
static ORT_INIT: OnceCell<()> = OnceCell::new();

fn ort_err(e: impl std::fmt::Display) -> AtlasError {
    AtlasError::Classification(e.to_string())
}

pub struct OnnxGenreModel {
    session: Mutex<Session>,
    manifest: ModelManifest,
    input_name: String,
    output_name: String,
}

/// Loads the model once per process. Later calls return the already loaded
/// instance regardless of `h`.
pub fn preload(h: &ModelHandle) -> Result<&'static OnnxGenreModel> {
    MODEL.get_or_try_init(|| {
        // Pin error type so `?` is unambiguous.
        ORT_INIT.get_or_try_init::<_, AtlasError>(|| {
            ort::init().commit().map_err(ort_err)?;
            Ok(())
        })?;

        h.manifest.validate().map_err(AtlasError::Manifest)?;

        let session = SessionBuilder::new()
            .map_err(ort_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_err)?
            .commit_from_file(&h.local_path)
            .map_err(ort_err)?;

        let input_name = match &h.manifest.input_name {
            Some(name) => session
                .inputs
                .iter()
                .find(|i| &i.name == name)
                .map(|i| i.name.clone())
                .ok_or_else(|| ort_err(format!("Model missing input '{name}'")))?,
            None => session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| ort_err("Model declares no inputs"))?,
        };
        let output_name = match &h.manifest.output_name {
            Some(name) => session
                .outputs
                .iter()
                .find(|o| &o.name == name)
                .map(|o| o.name.clone())
                .ok_or_else(|| ort_err(format!("Model missing output '{name}'")))?,
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| ort_err("Model declares no outputs"))?,
        };

        info!(
            model = %h.manifest.name,
            path = %h.local_path.display(),
            %input_name,
            %output_name,
            "genre model loaded"
        );

        Ok(OnnxGenreModel {
            session: Mutex::new(session),
            manifest: h.manifest.clone(),
            input_name,
            output_name,
        })
    })
}

impl OnnxGenreModel {
    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }
}

impl GenreModel for OnnxGenreModel {
    fn predict(&self, tensor: &SpectrogramTensor) -> Result<Vec<f32>> {
        let data: Vec<f32> = tensor.as_array().iter().copied().collect();
        let expected: usize = self.manifest.input_shape.iter().product();
        if data.len() != expected {
            return Err(ort_err(format!(
                "tensor has {} values, model input {:?} needs {}",
                data.len(),
                self.manifest.input_shape,
                expected
            )));
        }

        let input: Value = Tensor::from_array((self.manifest.input_shape.clone(), data))
            .map_err(ort_err)?
            .into_dyn();

        let mut session = self
            .session
            .lock()
            .map_err(|_| ort_err("session poisoned"))?;

        let outputs = session
            .run(vec![(self.input_name.clone(), input)])
            .map_err(ort_err)?;

        let out: Value = outputs
            .into_iter()
            .find_map(|(name, v)| if name == self.output_name.as_str() { Some(v) } else { None })
            .ok_or_else(|| ort_err(format!("Model did not return '{}'", self.output_name)))?;

        let (_shape, probs) = out.try_extract_tensor::<f32>().map_err(ort_err)?;
        Ok(probs.to_vec())
    }
}

/// Runs the model and maps the highest score to its genre. Ties resolve to the
/// lower index.
pub fn classify(model: &dyn GenreModel, tensor: &SpectrogramTensor) -> Result<ClassificationResult> {
    let probabilities = model.predict(tensor)?;

    if probabilities.len() != Genre::ALL.len() {
        return Err(AtlasError::Classification(format!(
            "expected {} scores, got {}",
            Genre::ALL.len(),
            probabilities.len()
        )));
    }
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(AtlasError::Classification("non-finite score".into()));
    }

    let mut best = 0;
    for (i, &p) in probabilities.iter().enumerate() {
        if p > probabilities[best] {
            best = i;
        }
    }
    let genre = Genre::from_index(best)
        .ok_or_else(|| AtlasError::Classification(format!("no genre at index {best}")))?;

    debug!(%genre, ?probabilities, "classified");
    Ok(ClassificationResult {
        genre,
        probabilities,
    })
}
