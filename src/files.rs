use std::path::{Path, PathBuf};

use crate::error::{LaneError, Result};

/// File extensions picked up by the calibrator and the image runner
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "png", "gif"];

/// Whether `path` names one of the accepted image formats
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}

/// List image files directly inside `dir`.
///
/// Entries come back in directory-listing order, which is not guaranteed
/// to be sorted.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LaneError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// `<dir>/<prefix><file name of source>`
pub fn prefixed_output(dir: &Path, prefix: &str, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{}{}", prefix, name))
}
