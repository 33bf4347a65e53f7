//! Orchestration glue: read a replay file, run the decoder and analysis
//! pipeline, optionally render a playback animation, and hand back a
//! `RunOutput` the CLI binary can report on.

pub mod collaborators;
pub mod render;
pub mod reporting;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use analysis::Analysis;
use decoder::{CancellationToken, Game};
use filetime::FileTime;
use thiserror::Error;

use collaborators::{
    AnimationEncoder, BackgroundMapSource, CollaboratorError, FileUnitCatalog,
    GifAnimationEncoder, UnitCatalog,
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode replay: {0}")]
    Decode(#[from] decoder::Error),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("analysis was cancelled")]
    Cancelled,
}

pub struct FileInfo {
    pub created_at: SystemTime,
    pub name: String,
    pub path: String,
}

/// The default frame canvas, matching the game's own playback window.
pub const DEFAULT_FRAME_SIZE: (u32, u32) = (512, 512);

pub struct RunOutput {
    pub file_info: FileInfo,
    pub game: Game,
    pub analysis: Analysis,
    pub animation: Option<Vec<u8>>,
    pub unit_catalog: Box<dyn UnitCatalog>,
}

/// Reads `demo_path`, runs the full decode/analysis pipeline, and, if
/// `background_path` is given, renders and GIF-encodes the playback
/// animation against it. `unit_catalog_path`, if given, loads a
/// `net_id,name` text file used only to make unit-count reporting
/// readable; decoding and analysis never consult it.
pub fn run_analyzer(
    demo_path: &PathBuf,
    background_path: Option<&Path>,
    unit_catalog_path: Option<&Path>,
    cancel: CancellationToken,
) -> Result<RunOutput, CliError> {
    let mut file = fs::OpenOptions::new()
        .read(true)
        .open(demo_path)
        .map_err(|source| CliError::Open {
            path: demo_path.display().to_string(),
            source,
        })?;

    let mut bytes: Vec<u8> = vec![];
    file.read_to_end(&mut bytes)
        .map_err(|source| CliError::ReadFile {
            path: demo_path.display().to_string(),
            source,
        })?;

    let (mut game, move_region_offset) = decoder::parse_header(&bytes)?;
    let move_region = &bytes[move_region_offset..];
    decoder::finalize_with_move_census(&mut game, move_region);

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }

    let analysis = analysis::analyze(&game, move_region, cancel.clone());

    let animation = match background_path {
        Some(path) if !cancel.is_cancelled() => {
            let background = collaborators::FileBackgroundMapSource.load(path)?;
            let palette = render::default_palette();
            let player_colors: Vec<(u8, u8)> =
                game.players.iter().map(|p| (p.number, p.color)).collect();
            let color_map = analysis::frames::color_map(&player_colors);
            let (w, h) = DEFAULT_FRAME_SIZE;
            let frames = render::render_all(&analysis.frames, &background, w, h, color_map, cancel);
            let mut out = Vec::new();
            GifAnimationEncoder.encode(&palette, &frames, &mut out)?;
            Some(out)
        }
        _ => None,
    };

    let unit_catalog: Box<dyn UnitCatalog> = match unit_catalog_path {
        Some(path) => Box::new(FileUnitCatalog::load(path)?),
        None => Box::new(FileUnitCatalog::empty()),
    };

    let created_at = fs::metadata(demo_path)
        .map_err(|source| CliError::ReadFile {
            path: demo_path.display().to_string(),
            source,
        })
        .map(|metadata| FileTime::from_last_modification_time(&metadata))
        .map(|file_time| {
            let offset = Duration::new(file_time.unix_seconds() as u64, file_time.nanoseconds());
            SystemTime::UNIX_EPOCH + offset
        })?;

    let file_info = FileInfo {
        created_at,
        name: demo_path
            .file_name()
            .and_then(|s| s.to_str())
            .map(String::from)
            .unwrap_or_default(),
        path: demo_path.to_str().map(String::from).unwrap_or_default(),
    };

    Ok(RunOutput {
        file_info,
        game,
        analysis,
        animation,
        unit_catalog,
    })
}
