use std::sync::OnceLock;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tempfile::{tempdir, TempDir};

use httpmock::prelude::*;

use genre_atlas::{
    ensure_model, load_registry, model::registry::resolve_manifest_url, prepare_model, AtlasError,
};

const LABELS: &str =
    r#"["rock","pop","classical","hiphop","country","latin","edm_dance","jazz"]"#;

// Tests in this binary run on parallel threads, so the cache location is set
// once and every test uses its own model name.
fn isolated_cache() {
    static CACHE: OnceLock<TempDir> = OnceLock::new();
    CACHE.get_or_init(|| {
        let dir = tempdir().unwrap();
        std::env::set_var("XDG_CACHE_HOME", dir.path());
        dir
    });
}

fn make_fake_model_bytes(len: usize, seed: u64) -> (Vec<u8>, String, u64) {
    let mut data = vec![0u8; len];

    let mut rng = StdRng::seed_from_u64(seed);
    rng.fill_bytes(&mut data);

    let mut h = Sha256::new();
    h.update(&data);
    let sha = hex::encode(h.finalize());

    (data, sha, len as u64)
}

fn manifest_json(
    model_name: &str,
    file_name: &str,
    model_url: &str,
    sha256_hex: &str,
    size: u64,
    categories: &str,
) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "version": "1.0.0",
  "backend": "onnx",
  "sample_rate": 22050,
  "n_mels": 64,
  "frames": 256,
  "input_shape": [1, 64, 256],
  "categories": {categories},
  "artifacts": [
    {{
      "file": "{file}",
      "url": "{url}",
      "sha256": "{sha}",
      "size_bytes": {size}
    }}
  ]
}}"#,
        name = model_name,
        file = file_name,
        url = model_url,
        sha = sha256_hex,
        size = size,
        categories = categories
    )
}

#[test]
fn downloads_and_caches_model_then_reuses_cache() {
    isolated_cache();

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(256 * 1024, 42);

    let server = MockServer::start();

    let model_mock = server.mock(|when, then| {
        when.method(GET).path("/genre_cnn_test.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let model_name = "genre_cnn_test";
    let file_name = "genre_cnn_test.onnx";
    let model_url = format!("{}/{}", server.base_url(), file_name);

    let manifest_body = manifest_json(model_name, file_name, &model_url, &sha_hex, size, LABELS);

    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/genre_cnn_test.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let manifest_url = format!("{}/genre_cnn_test.json", server.base_url());

    let handle = ensure_model("ignored", Some(&manifest_url)).expect("first ensure_model failed");
    assert!(handle.local_path.exists(), "cached model should exist");
    let cached_name = handle.local_path.file_name().unwrap().to_string_lossy();
    assert_eq!(cached_name, format!("genre_cnn_test-{}.onnx", &sha_hex[..8]));
    assert_eq!(handle.manifest.categories.len(), 8);

    assert!(manifest_mock.hits() >= 1);
    model_mock.assert_hits(1);

    let handle2 = ensure_model("ignored", Some(&manifest_url)).expect("second ensure_model failed");
    assert_eq!(
        handle.local_path, handle2.local_path,
        "cache path should be stable"
    );

    model_mock.assert_hits(1);
}

#[test]
fn checksum_mismatch_returns_error() {
    isolated_cache();

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(64 * 1024, 7);
    let mut bad_sha = sha_hex.clone();
    let first = &bad_sha[0..1];
    bad_sha.replace_range(0..1, if first == "a" { "b" } else { "a" });

    let server = MockServer::start();

    let _model_mock = server.mock(|when, then| {
        when.method(GET).path("/bad.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let file_name = "bad.onnx";
    let model_url = format!("{}/{}", server.base_url(), file_name);
    let manifest_body = manifest_json("bad_model", file_name, &model_url, &bad_sha, size, LABELS);

    let _manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/bad.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let manifest_url = format!("{}/bad.json", server.base_url());

    match ensure_model("ignored", Some(&manifest_url)) {
        Ok(_) => panic!("expected checksum error, but got Ok"),
        Err(e) => {
            assert!(matches!(e, AtlasError::Checksum { .. }), "got: {e}");
            let msg = e.to_string().to_lowercase();
            assert!(msg.contains("checksum"), "expected checksum error, got: {msg}");
        }
    }
}

#[test]
fn category_mismatch_is_rejected_before_download() {
    isolated_cache();

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(1024, 9);
    let server = MockServer::start();

    let model_mock = server.mock(|when, then| {
        when.method(GET).path("/other.onnx");
        then.status(200).body(model_bytes.clone());
    });

    let model_url = format!("{}/other.onnx", server.base_url());
    let reordered =
        r#"["pop","rock","classical","hiphop","country","latin","edm_dance","jazz"]"#;
    let manifest_body =
        manifest_json("other_model", "other.onnx", &model_url, &sha_hex, size, reordered);

    server.mock(|when, then| {
        when.method(GET).path("/other.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let err = ensure_model("ignored", Some(&format!("{}/other.json", server.base_url())))
        .err()
        .expect("expected manifest error");
    assert!(matches!(err, AtlasError::Manifest(_)), "got: {err}");
    model_mock.assert_hits(0);
}

#[test]
fn unreachable_manifest_is_a_manifest_error() {
    isolated_cache();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.json");
        then.status(404);
    });

    let err = ensure_model("ignored", Some(&format!("{}/missing.json", server.base_url())))
        .err()
        .expect("expected manifest error");
    assert!(matches!(err, AtlasError::Manifest(_)), "got: {err}");
    assert!(err.to_string().contains("local model file"));
}

#[test]
fn replaced_download_overwrites_stale_cache_file() {
    isolated_cache();

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(32 * 1024, 11);
    let server = MockServer::start();
    let model_mock = server.mock(|when, then| {
        when.method(GET).path("/stale.onnx");
        then.status(200).body(model_bytes.clone());
    });

    let model_url = format!("{}/stale.onnx", server.base_url());
    let manifest_body = manifest_json("stale_model", "stale.onnx", &model_url, &sha_hex, size, LABELS);
    server.mock(|when, then| {
        when.method(GET).path("/stale.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });
    let manifest_url = format!("{}/stale.json", server.base_url());

    let handle = ensure_model("ignored", Some(&manifest_url)).unwrap();
    std::fs::write(&handle.local_path, b"corrupted").unwrap();

    let again = ensure_model("ignored", Some(&manifest_url)).unwrap();
    model_mock.assert_hits(2);
    assert_eq!(std::fs::read(&again.local_path).unwrap(), model_bytes);
}

#[test]
fn local_model_file_skips_registry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("my_genre_model.onnx");
    std::fs::write(&path, b"onnx bytes").unwrap();

    let handle = prepare_model("does-not-exist", None, Some(path.as_path())).unwrap();
    assert_eq!(handle.local_path, path);
    assert_eq!(handle.manifest.name, "my_genre_model");
    assert_eq!(handle.manifest.input_shape, vec![1, 64, 256]);
    assert!(handle.manifest.validate().is_ok());

    let missing = prepare_model("x", None, Some(dir.path().join("nope.onnx").as_path()));
    assert!(matches!(missing, Err(AtlasError::Manifest(_))));
}

#[test]
fn registry_resolves_default_and_rejects_unknown() {
    let reg = load_registry().unwrap();
    assert!(reg.models.iter().any(|m| m.name == reg.default_model));

    let url = resolve_manifest_url("").unwrap();
    assert!(url.starts_with("https://"));
    assert_eq!(resolve_manifest_url(&reg.default_model).unwrap(), url);

    let err = resolve_manifest_url("no_such_model").unwrap_err();
    assert!(matches!(err, AtlasError::Registry(_)));
}
