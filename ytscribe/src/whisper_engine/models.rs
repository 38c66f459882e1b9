// whisper_engine/models.rs
//
// Locating GGML model files on disk by short name.

use std::path::{Path, PathBuf};

pub struct ModelSpec {
    pub name: &'static str,
    pub size_mb: u32,
    pub description: &'static str,
}

/// Standard ggerganov/whisper.cpp GGML models
pub const KNOWN_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "tiny", size_mb: 75, description: "Fastest processing, rough accuracy" },
    ModelSpec { name: "base", size_mb: 142, description: "Good balance of speed and accuracy" },
    ModelSpec { name: "small", size_mb: 466, description: "Better accuracy, moderate speed" },
    ModelSpec { name: "medium", size_mb: 1420, description: "High accuracy, slow" },
    ModelSpec { name: "large", size_mb: 2870, description: "Best accuracy, slowest" },
];

/// All models follow the ggml-{name}.bin pattern
pub fn model_filename(name: &str) -> String {
    format!("ggml-{}.bin", name)
}

/// Directories searched for models, in priority order.
pub fn model_search_dirs() -> Vec<PathBuf> {
    let mut search_dirs = vec![
        PathBuf::from("./models"),
        PathBuf::from("./whisper-models"),
        PathBuf::from("/usr/local/share/whisper"),
        PathBuf::from("/opt/whisper/models"),
    ];
    if let Some(home) = dirs::home_dir() {
        search_dirs.push(home.join(".cache/whisper"));
        search_dirs.push(home.join(".local/share/whisper"));
    }
    search_dirs
}

pub fn find_model_in(search_dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let filename = model_filename(name);
    search_dirs
        .iter()
        .map(|dir| dir.join(&filename))
        .find(|path| path.is_file())
}

/// Find `ggml-<name>.bin` in the standard locations. `None` is a
/// configuration problem for the caller to report.
pub fn find_whisper_model(name: &str) -> Option<PathBuf> {
    let found = find_model_in(&model_search_dirs(), name);
    match &found {
        Some(path) => log::debug!("Whisper model '{}' found at {}", name, path.display()),
        None => log::debug!("Whisper model '{}' not found in any search directory", name),
    }
    found
}

/// Accept either a path to an existing model file or a short model name.
pub fn resolve_model(name_or_path: &str) -> Option<PathBuf> {
    let as_path = Path::new(name_or_path);
    if as_path.is_file() {
        return Some(as_path.to_path_buf());
    }
    find_whisper_model(name_or_path)
}
