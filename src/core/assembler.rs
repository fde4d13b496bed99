use crate::{
    error::Result,
    types::{LayoutPoint, PlacedSong, SongRecord},
};

/// Attaches layout positions to songs (same order) and produces the output
/// rows. Songs left without a position are dropped.
pub fn assemble(mut songs: Vec<SongRecord>, positions: &[LayoutPoint]) -> Vec<PlacedSong> {
    for (song, pos) in songs.iter_mut().zip(positions) {
        song.position = Some(*pos);
    }

    songs
        .into_iter()
        .filter_map(|song| {
            song.position.map(|p| PlacedSong {
                url: song.url,
                genre: song.genre,
                x: p.x,
                z: p.z,
            })
        })
        .collect()
}

/// What the batch command prints on stdout, and the status it exits with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub text: String,
    pub exit_code: i32,
}

/// JSON rows when at least one song was placed; otherwise a one-line
/// diagnostic and a failing status.
pub fn render_report(placed: &[PlacedSong], failed: usize) -> Result<BatchReport> {
    if placed.is_empty() {
        return Ok(BatchReport {
            text: format!("No songs could be processed ({failed} failed)"),
            exit_code: 1,
        });
    }
    Ok(BatchReport {
        text: serde_json::to_string(placed)?,
        exit_code: 0,
    })
}
