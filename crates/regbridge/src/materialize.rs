//! Turns an [`ImageRef`] into a path the registration tool can read.

use std::path::{Path, PathBuf};

use crate::error::RegistrationResult;
use crate::image::{write_png, ImageRef, PIXEL_FILE_SUFFIX};
use crate::temp::{TempResource, TempSpace};

/// A file path for an image argument, plus the temp file backing it if one
/// had to be written.
#[derive(Debug)]
pub struct MaterializedImage {
    path: PathBuf,
    temp: Option<TempResource>,
}

impl MaterializedImage {
    /// Path to hand to the registration tool.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file was created here and must be cleaned up.
    pub fn owned(&self) -> bool {
        self.temp.is_some()
    }

    /// Takes the backing temp file, leaving a borrowed-path view behind.
    pub fn take_temp(&mut self) -> Option<TempResource> {
        self.temp.take()
    }
}

/// Resolves an image argument to a readable file.
///
/// Paths are returned untouched. Pixel data is encoded into a fresh temp file
/// from `space`; if encoding fails the partial file is removed before the
/// error is returned.
pub fn materialize(image: &ImageRef, space: &TempSpace) -> RegistrationResult<MaterializedImage> {
    match image {
        ImageRef::Path(path) => Ok(MaterializedImage {
            path: path.clone(),
            temp: None,
        }),
        ImageRef::Pixels(buffer) => {
            let temp = space.acquire_temp_file(PIXEL_FILE_SUFFIX)?;
            write_png(buffer, temp.path())?;
            tracing::debug!(
                path = %temp.path().display(),
                width = buffer.width,
                height = buffer.height,
                "materialized in-memory image"
            );
            Ok(MaterializedImage {
                path: temp.path().to_path_buf(),
                temp: Some(temp),
            })
        }
    }
}
