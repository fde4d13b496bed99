mod common;

use common::{FailingModel, FixedModel, WrongShapeModel};
use genre_atlas::{
    classify, AtlasError, FailureStage, Genre, GenreModel, SpectrogramTensor, N_MELS,
    TENSOR_FRAMES,
};
use ndarray::Array2;

struct Scores(Vec<f32>);

impl GenreModel for Scores {
    fn predict(&self, _tensor: &SpectrogramTensor) -> genre_atlas::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

fn blank_tensor() -> SpectrogramTensor {
    SpectrogramTensor(Array2::from_elem((N_MELS, TENSOR_FRAMES), -80.0))
}

#[test]
fn picks_highest_score() {
    for (i, genre) in Genre::ALL.iter().enumerate() {
        let r = classify(&FixedModel(i), &blank_tensor()).unwrap();
        assert_eq!(r.genre, *genre);
        assert_eq!(r.probabilities.len(), 8);
    }
}

#[test]
fn ties_go_to_lowest_index() {
    let model = Scores(vec![0.1, 0.3, 0.1, 0.3, 0.1, 0.05, 0.05, 0.0]);
    let r = classify(&model, &blank_tensor()).unwrap();
    assert_eq!(r.genre, Genre::Pop);

    let flat = Scores(vec![0.125; 8]);
    assert_eq!(classify(&flat, &blank_tensor()).unwrap().genre, Genre::Rock);
}

#[test]
fn wrong_output_length_is_a_classification_error() {
    let err = classify(&WrongShapeModel, &blank_tensor()).unwrap_err();
    assert!(matches!(err, AtlasError::Classification(_)), "got {err:?}");
    assert_eq!(err.stage(), FailureStage::Classification);
}

#[test]
fn non_finite_scores_are_rejected() {
    let mut scores = vec![0.1f32; 8];
    scores[4] = f32::NAN;
    let err = classify(&Scores(scores), &blank_tensor()).unwrap_err();
    assert!(matches!(err, AtlasError::Classification(_)));
}

#[test]
fn model_errors_propagate() {
    let err = classify(&FailingModel, &blank_tensor()).unwrap_err();
    assert_eq!(err.stage(), FailureStage::Classification);
}

#[test]
fn genre_labels_match_wire_format() {
    let labels: Vec<String> = Genre::ALL
        .iter()
        .map(|g| serde_json::to_string(g).unwrap())
        .collect();
    assert_eq!(
        labels,
        vec![
            "\"rock\"",
            "\"pop\"",
            "\"classical\"",
            "\"hiphop\"",
            "\"country\"",
            "\"latin\"",
            "\"edm_dance\"",
            "\"jazz\"",
        ]
    );
    for g in Genre::ALL {
        assert_eq!(g.to_string(), g.label());
        let back: Genre = serde_json::from_str(&format!("\"{}\"", g.label())).unwrap();
        assert_eq!(back, g);
    }
    assert_eq!(Genre::from_index(8), None);
}
