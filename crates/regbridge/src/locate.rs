//! Finds the artifacts the registration tool leaves in its output directory.
//!
//! The tool writes `TransformParameters.0.<ext>`, `IterationInfo.0.R0.<ext>`
//! and optionally `result.0.<ext>`, where each extension is the tool's choice.

use std::path::{Path, PathBuf};

use crate::error::{RegistrationError, RegistrationResult};

/// File stem prefix of the transform parameter file.
pub const TRANSFORM_PREFIX: &str = "TransformParameters.0.";

/// File stem prefix of the iteration log.
pub const ITERATION_LOG_PREFIX: &str = "IterationInfo.0.R0.";

/// File stem prefix of the registered image.
pub const RESULT_IMAGE_PREFIX: &str = "result.0.";

/// Extensions of raw pixel companions written next to an image header.
const DATA_COMPANION_EXTENSIONS: &[&str] = &["raw", "zraw"];

/// Returns every file in `dir` whose name starts with `prefix`, sorted.
fn find_with_prefix(dir: &Path, prefix: &str) -> RegistrationResult<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(prefix)
    );
    let paths = glob::glob(&pattern).map_err(|e| {
        RegistrationError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;

    let mut found: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    Ok(found)
}

fn find_required(dir: &Path, prefix: &str) -> RegistrationResult<PathBuf> {
    find_with_prefix(dir, prefix)?
        .into_iter()
        .next()
        .ok_or_else(|| RegistrationError::MissingResultFile {
            path: dir.join(format!("{}*", prefix)),
        })
}

/// Locates the transform parameter file.
pub fn locate_transform_file(out_dir: &Path) -> RegistrationResult<PathBuf> {
    find_required(out_dir, TRANSFORM_PREFIX)
}

/// Locates the iteration log.
pub fn locate_iteration_log(out_dir: &Path) -> RegistrationResult<PathBuf> {
    find_required(out_dir, ITERATION_LOG_PREFIX)
}

/// Locates the registered image, if the tool wrote one.
///
/// Returns `Ok(None)` when no `result.0.*` file exists; whether that is an
/// error depends on what the caller asked for. When the tool wrote a header
/// plus raw data pair, the header is returned.
pub fn find_result_image(out_dir: &Path) -> RegistrationResult<Option<PathBuf>> {
    let candidates = find_with_prefix(out_dir, RESULT_IMAGE_PREFIX)?;
    let preferred = candidates
        .iter()
        .find(|p| !is_data_companion(p))
        .or_else(|| candidates.first())
        .cloned();
    Ok(preferred)
}

fn is_data_companion(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            DATA_COMPANION_EXTENSIONS
                .iter()
                .any(|c| e.eq_ignore_ascii_case(c))
        })
        .unwrap_or(false)
}

/// Returns the existing `<stem>.raw` / `<stem>.zraw` file next to `image`.
pub(crate) fn sibling_data_companion(image: &Path) -> Option<PathBuf> {
    if is_data_companion(image) {
        return None;
    }
    DATA_COMPANION_EXTENSIONS
        .iter()
        .map(|ext| image.with_extension(ext))
        .find(|p| p.is_file())
}
