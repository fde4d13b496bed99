mod common;

use std::fs;

use common::{sine, wav_bytes, FixedModel};
use genre_atlas::{classify_and_layout, BatchOptions};
use httpmock::prelude::*;
use tempfile::tempdir;

// Own test binary: it points the scratch directory at a private location
// through the environment.
#[test]
fn downloads_are_removed_after_batch() {
    let work = tempdir().unwrap();
    std::env::set_var("GENRE_ATLAS_TMP_DIR", work.path());

    let server = MockServer::start();
    let body = wav_bytes(sine(440.0, 1.0, 22_050, 0.5), 22_050);
    server.mock(|when, then| {
        when.method(GET).path("/ok.wav");
        then.status(200).body(body);
    });
    server.mock(|when, then| {
        when.method(GET).path("/bad.mp3");
        then.status(200).body("garbage");
    });

    let urls = vec![server.url("/ok.wav"), server.url("/bad.mp3"), server.url("/ok.wav")];
    let opts = BatchOptions {
        jobs: Some(3),
        seed: Some(0),
        ..BatchOptions::default()
    };
    let (placed, failed) = classify_and_layout(&urls, &opts, &FixedModel(4)).unwrap();
    assert_eq!(placed.len(), 2);
    assert_eq!(failed.len(), 1);

    let leftovers: Vec<_> = fs::read_dir(work.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}
