use crate::{
    error::{AtlasError, Result},
    io::progress::emit_download_progress,
};
use reqwest::{
    blocking::{Client, Response},
    Url,
};
use std::{
    io::{Read, Write},
    path::Path,
    time::Duration,
};

/// Blocking client shared by every worker of a batch. `timeout` bounds the
/// whole request so a stalled host only costs one song.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(AtlasError::from)
}

pub fn model_http_client() -> Result<Client> {
    http_client(Duration::from_secs(60 * 60))
}

/// Copies a response body into `out`, reporting the running byte count after
/// every chunk.
fn stream_body<W: Write>(
    resp: &mut Response,
    out: &mut W,
    mut on_chunk: impl FnMut(u64),
) -> std::io::Result<u64> {
    let mut written: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = resp.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        written += n as u64;
        on_chunk(written);
    }
    out.flush()?;
    Ok(written)
}

/// Downloads a model artifact. `dest` only appears once the full body is on
/// disk.
pub fn download_with_progress(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let mut resp = client.get(url).send()?.error_for_status()?;
    let total = resp.content_length().unwrap_or(0);
    emit_download_progress(0, total);

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .suffix(".part")
        .tempfile_in(dir)?;
    let downloaded = stream_body(&mut resp, staged.as_file_mut(), |done| {
        emit_download_progress(done, total)
    })?;

    if total > 0 && downloaded != total {
        return Err(AtlasError::Fetch(format!(
            "{url}: body ended after {downloaded} of {total} bytes"
        )));
    }

    staged.persist(dest).map_err(|e| AtlasError::from(e.error))?;
    emit_download_progress(downloaded, downloaded);
    Ok(())
}

/// Streams `url` into `out`. Every failure, including an empty body, is a
/// `Fetch` error.
pub fn fetch_to_writer<W: Write>(client: &Client, url: &str, out: &mut W) -> Result<u64> {
    let fetch_err = |e: &dyn std::fmt::Display| AtlasError::Fetch(format!("{url}: {e}"));

    let mut resp = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_err(&e))?;

    let written = stream_body(&mut resp, out, |_| {}).map_err(|e| fetch_err(&e))?;
    if written == 0 {
        return Err(fetch_err(&"empty response body"));
    }
    Ok(written)
}

const MAX_STEM_CHARS: usize = 64;
const MAX_EXT_CHARS: usize = 8;

/// Local file name for a remote track: the last path segment with the query
/// dropped, restricted to `[A-Za-z0-9._-]`, with `.mp3` appended when the
/// segment has no extension. The stem is cut to 64 characters.
pub fn song_file_name(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| AtlasError::Fetch(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AtlasError::Fetch(format!(
            "{url}: unsupported scheme `{}`",
            parsed.scheme()
        )));
    }

    let segment = parsed
        .path_segments()
        .and_then(|s| s.last())
        .unwrap_or("");

    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = match sanitized.trim_matches('.') {
        "" => "track",
        trimmed => trimmed,
    };

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXT_CHARS => {
            (stem, ext)
        }
        _ => (name, "mp3"),
    };
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    Ok(format!("{stem}.{ext}"))
}
