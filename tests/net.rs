use std::time::Duration;

use genre_atlas::{
    io::net::{fetch_to_writer, http_client, song_file_name},
    AtlasError,
};
use httpmock::prelude::*;

#[test]
fn file_name_from_last_segment() {
    assert_eq!(
        song_file_name("https://cdn.test/albums/7/intro.mp3").unwrap(),
        "intro.mp3"
    );
    assert_eq!(
        song_file_name("http://cdn.test/a/song.wav?token=abc#t=3").unwrap(),
        "song.wav"
    );
}

#[test]
fn file_name_gets_mp3_when_extensionless() {
    assert_eq!(
        song_file_name("https://cdn.test/stream/0042?sig=xyz").unwrap(),
        "0042.mp3"
    );
    assert_eq!(song_file_name("https://cdn.test/").unwrap(), "track.mp3");
}

#[test]
fn file_name_is_sanitized() {
    let name = song_file_name("https://cdn.test/x/a%20b;c.mp3").unwrap();
    assert!(name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
    assert!(name.ends_with(".mp3"));
}

#[test]
fn long_segments_are_shortened() {
    let long = "a".repeat(300);
    let name = song_file_name(&format!("https://cdn.test/signed/{long}?exp=1")).unwrap();
    assert_eq!(name, format!("{}.mp3", "a".repeat(64)));

    let name = song_file_name(&format!("https://cdn.test/{long}.wav")).unwrap();
    assert_eq!(name, format!("{}.wav", "a".repeat(64)));
}

#[test]
fn bad_urls_are_fetch_errors() {
    for url in ["not a url", "ftp://cdn.test/a.mp3", "file:///etc/passwd"] {
        let err = song_file_name(url).unwrap_err();
        assert!(matches!(err, AtlasError::Fetch(_)), "{url}: {err:?}");
    }
}

#[test]
fn fetch_streams_body() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET).path("/a.mp3");
        then.status(200).body(vec![7u8; 100_000]);
    });

    let client = http_client(Duration::from_secs(5)).unwrap();
    let mut out = Vec::new();
    let n = fetch_to_writer(&client, &server.url("/a.mp3"), &mut out).unwrap();
    m.assert_hits(1);
    assert_eq!(n, 100_000);
    assert_eq!(out.len(), 100_000);
}

#[test]
fn http_error_status_is_fetch_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.mp3");
        then.status(404);
    });

    let client = http_client(Duration::from_secs(5)).unwrap();
    let mut out = Vec::new();
    let err = fetch_to_writer(&client, &server.url("/missing.mp3"), &mut out).unwrap_err();
    assert!(matches!(err, AtlasError::Fetch(_)), "got {err:?}");
}

#[test]
fn empty_body_is_fetch_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/empty.mp3");
        then.status(200);
    });

    let client = http_client(Duration::from_secs(5)).unwrap();
    let mut out = Vec::new();
    let err = fetch_to_writer(&client, &server.url("/empty.mp3"), &mut out).unwrap_err();
    assert!(matches!(err, AtlasError::Fetch(_)));
}

#[test]
fn slow_host_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/slow.mp3");
        then.status(200)
            .delay(Duration::from_secs(3))
            .body("late");
    });

    let client = http_client(Duration::from_secs(1)).unwrap();
    let mut out = Vec::new();
    let err = fetch_to_writer(&client, &server.url("/slow.mp3"), &mut out).unwrap_err();
    assert!(matches!(err, AtlasError::Fetch(_)));
}
