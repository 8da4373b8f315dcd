//! Hands the registered image to the caller in the form they asked for.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::{RegistrationError, RegistrationResult, RegistrationWarning};
use crate::image::{read_image, ImageRef};
use crate::locate::sibling_data_companion;

/// MetaImage header key naming the file that holds the pixel data.
const ELEMENT_DATA_FILE_KEY: &str = "ElementDataFile";

/// Registered image (if any) plus non-fatal conditions met on the way.
#[derive(Debug, Default)]
pub struct Relocation {
    pub image: Option<ImageRef>,
    pub warnings: Vec<RegistrationWarning>,
}

/// Disposes of the tool's result image.
///
/// * moving image was a path, no `output_path`: the result is deleted and no
///   image is returned.
/// * moving image was a path, `output_path` set: the result is moved there and
///   returned as a path. A differing file extension produces an
///   [`RegistrationWarning::ExtensionMismatch`] but the move still happens.
///   A header-style result (`result.0.mhd` plus `result.0.raw`) has its data
///   file moved beside the destination and the header pointed at it.
/// * moving image was pixel data: the result is decoded and returned as
///   pixels; `output_path` is ignored.
///
/// `result_image` is what the locator found in `out_dir`.
pub fn relocate(
    result_image: Option<&Path>,
    out_dir: &Path,
    moving_was_path: bool,
    output_path: Option<&Path>,
) -> RegistrationResult<Relocation> {
    let mut relocation = Relocation::default();

    match (moving_was_path, output_path) {
        (true, None) => {
            if let Some(result) = result_image {
                discard(result);
            }
        }
        (true, Some(destination)) => {
            let result = result_image.ok_or_else(|| RegistrationError::MissingResultImage {
                dir: out_dir.to_path_buf(),
            })?;

            if !same_extension(result, destination) {
                let warning = RegistrationWarning::ExtensionMismatch {
                    produced: result.to_path_buf(),
                    requested: destination.to_path_buf(),
                };
                tracing::warn!("{}", warning);
                relocation.warnings.push(warning);
            }

            move_result(result, destination).map_err(|source| RegistrationError::Relocate {
                destination: destination.to_path_buf(),
                source,
            })?;
            tracing::debug!(destination = %destination.display(), "moved result image");
            relocation.image = Some(ImageRef::Path(destination.to_path_buf()));
        }
        (false, requested) => {
            if let Some(requested) = requested {
                tracing::debug!(
                    output_path = %requested.display(),
                    "ignoring output path for in-memory moving image"
                );
            }
            match result_image {
                Some(result) => {
                    relocation.image = Some(ImageRef::Pixels(read_image(result)?));
                }
                None => {
                    let warning = RegistrationWarning::ResultImageNotWritten {
                        dir: out_dir.to_path_buf(),
                    };
                    tracing::warn!("{}", warning);
                    relocation.warnings.push(warning);
                }
            }
        }
    }

    Ok(relocation)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to discard result image");
    }
}

fn same_extension(a: &Path, b: &Path) -> bool {
    match (a.extension(), b.extension()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        (None, None) => true,
        _ => false,
    }
}

/// Moves the result image, together with its pixel data file if it has one.
fn move_result(result: &Path, destination: &Path) -> io::Result<()> {
    let Some(data) = detached_data_file(result)? else {
        return move_file(result, destination);
    };

    let data_ext = data.extension().unwrap_or_default();
    let data_destination = destination.with_extension(data_ext);
    if data_destination == destination {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "output path would overwrite the pixel data file {}",
                data.display()
            ),
        ));
    }
    move_file(&data, &data_destination)?;
    tracing::debug!(destination = %data_destination.display(), "moved result pixel data");

    let data_name = data_destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match fs::read_to_string(result) {
        Ok(header) if element_data_file(&header).is_some() => {
            fs::write(destination, rewrite_element_data_file(&header, &data_name))?;
            fs::remove_file(result)
        }
        // Not a text header naming its data file; the sibling is found by stem.
        _ => move_file(result, destination),
    }
}

/// Finds the file holding the pixel data of a header-style result image.
///
/// A MetaImage header names it in `ElementDataFile`; `LOCAL` means the data
/// is embedded. Otherwise a `<stem>.raw` / `<stem>.zraw` sibling is used.
fn detached_data_file(result: &Path) -> io::Result<Option<PathBuf>> {
    let is_meta_header = result
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("mhd"));
    if !is_meta_header {
        return Ok(sibling_data_companion(result));
    }

    let header = fs::read_to_string(result)?;
    let Some(value) = element_data_file(&header) else {
        return Ok(sibling_data_companion(result));
    };
    if value.eq_ignore_ascii_case("LOCAL") {
        return Ok(None);
    }
    if value.starts_with("LIST") || value.contains('%') {
        return Err(io::Error::new(
            ErrorKind::Unsupported,
            format!("multi-file pixel data is not supported: {}", value),
        ));
    }

    let data = result
        .parent()
        .map_or_else(|| PathBuf::from(value), |dir| dir.join(value));
    if !data.is_file() {
        return Err(io::Error::new(
            ErrorKind::NotFound,
            format!("pixel data file {} is missing", data.display()),
        ));
    }
    Ok(Some(data))
}

fn element_data_file(header: &str) -> Option<&str> {
    header.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == ELEMENT_DATA_FILE_KEY).then(|| value.trim())
    })
}

fn rewrite_element_data_file(header: &str, file_name: &str) -> String {
    header
        .split_inclusive('\n')
        .map(|line| match line.split_once('=') {
            Some((key, _)) if key.trim() == ELEMENT_DATA_FILE_KEY => {
                let ending = if line.ends_with("\r\n") {
                    "\r\n"
                } else if line.ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                format!("{} = {}{}", ELEMENT_DATA_FILE_KEY, file_name, ending)
            }
            _ => line.to_string(),
        })
        .collect()
}

/// Renames `from` to `to`, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{write_png, PixelBuffer};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_result(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        write_png(&PixelBuffer::gray(2, 1, vec![10, 20]), &path).unwrap();
        path
    }

    #[test]
    fn test_path_without_output_discards_result() {
        let dir = TempDir::new().unwrap();
        let result = write_result(dir.path(), "result.0.png");

        let relocation = relocate(Some(&result), dir.path(), true, None).unwrap();
        assert!(relocation.image.is_none());
        assert!(relocation.warnings.is_empty());
        assert!(!result.exists());
    }

    #[test]
    fn test_path_with_output_moves_result() {
        let dir = TempDir::new().unwrap();
        let result = write_result(dir.path(), "result.0.png");
        let destination = dir.path().join("nested/out/registered.png");

        let relocation = relocate(Some(&result), dir.path(), true, Some(&destination)).unwrap();
        assert_eq!(relocation.image, Some(ImageRef::Path(destination.clone())));
        assert!(relocation.warnings.is_empty());
        assert!(destination.exists());
        assert!(!result.exists());
    }

    #[test]
    fn test_extension_mismatch_warns_and_moves() {
        let dir = TempDir::new().unwrap();
        let result = write_result(dir.path(), "result.0.png");
        let destination = dir.path().join("out.jpg");

        let relocation = relocate(Some(&result), dir.path(), true, Some(&destination)).unwrap();
        assert_eq!(
            relocation.warnings,
            vec![RegistrationWarning::ExtensionMismatch {
                produced: result.clone(),
                requested: destination.clone(),
            }]
        );
        assert!(destination.exists());
    }

    fn write_meta_image(dir: &Path, data_file: &str) -> PathBuf {
        let header = dir.join("result.0.mhd");
        fs::write(
            &header,
            format!(
                "ObjectType = Image\nNDims = 2\nDimSize = 2 1\nElementType = MET_UCHAR\nElementDataFile = {}\n",
                data_file
            ),
        )
        .unwrap();
        header
    }

    #[test]
    fn test_meta_image_moves_data_file_and_rewrites_header() {
        let dir = TempDir::new().unwrap();
        let header = write_meta_image(dir.path(), "result.0.raw");
        fs::write(dir.path().join("result.0.raw"), [10u8, 20]).unwrap();
        let destination = dir.path().join("out/registered.mhd");

        let relocation = relocate(Some(&header), dir.path(), true, Some(&destination)).unwrap();
        assert_eq!(relocation.image, Some(ImageRef::Path(destination.clone())));

        let moved = fs::read_to_string(&destination).unwrap();
        assert!(moved.contains("ElementDataFile = registered.raw\n"));
        assert!(moved.starts_with("ObjectType = Image\n"));
        assert_eq!(
            fs::read(dir.path().join("out/registered.raw")).unwrap(),
            vec![10, 20]
        );
        assert!(!header.exists());
        assert!(!dir.path().join("result.0.raw").exists());
    }

    #[test]
    fn test_meta_image_with_missing_data_file_is_relocate_error() {
        let dir = TempDir::new().unwrap();
        let header = write_meta_image(dir.path(), "result.0.raw");
        let destination = dir.path().join("out.mhd");

        let err = relocate(Some(&header), dir.path(), true, Some(&destination)).unwrap_err();
        assert!(matches!(err, RegistrationError::Relocate { .. }));
        assert!(!destination.exists());
    }

    #[test]
    fn test_meta_image_with_local_data_moves_header_only() {
        let dir = TempDir::new().unwrap();
        let header = write_meta_image(dir.path(), "LOCAL");
        let destination = dir.path().join("out.mhd");

        relocate(Some(&header), dir.path(), true, Some(&destination)).unwrap();
        assert!(fs::read_to_string(&destination)
            .unwrap()
            .contains("ElementDataFile = LOCAL"));
    }

    #[test]
    fn test_output_path_colliding_with_data_file() {
        let dir = TempDir::new().unwrap();
        let header = write_meta_image(dir.path(), "result.0.raw");
        fs::write(dir.path().join("result.0.raw"), [1u8, 2]).unwrap();

        let err = relocate(
            Some(&header),
            dir.path(),
            true,
            Some(&dir.path().join("out.raw")),
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::Relocate { .. }));
    }

    #[test]
    fn test_rewrite_keeps_crlf() {
        let header = "NDims = 2\r\nElementDataFile = result.0.raw\r\n";
        assert_eq!(
            rewrite_element_data_file(header, "out.raw"),
            "NDims = 2\r\nElementDataFile = out.raw\r\n"
        );
    }

    #[test]
    fn test_extension_comparison_ignores_case() {
        assert!(same_extension(Path::new("a.PNG"), Path::new("b.png")));
        assert!(!same_extension(Path::new("a.png"), Path::new("b")));
    }

    #[test]
    fn test_requested_output_without_result_is_error() {
        let dir = TempDir::new().unwrap();
        let err = relocate(None, dir.path(), true, Some(&dir.path().join("out.png"))).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingResultImage { .. }));
    }

    #[test]
    fn test_pixels_decoded_and_output_path_ignored() {
        let dir = TempDir::new().unwrap();
        let result = write_result(dir.path(), "result.0.png");
        let ignored = dir.path().join("ignored.png");

        let relocation = relocate(Some(&result), dir.path(), false, Some(&ignored)).unwrap();
        assert_eq!(
            relocation.image,
            Some(ImageRef::Pixels(PixelBuffer::gray(2, 1, vec![10, 20])))
        );
        assert!(!ignored.exists());
    }

    #[test]
    fn test_pixels_without_result_is_empty_with_warning() {
        let dir = TempDir::new().unwrap();
        let relocation = relocate(None, dir.path(), false, None).unwrap();
        assert!(relocation.image.is_none());
        assert!(matches!(
            relocation.warnings.as_slice(),
            [RegistrationWarning::ResultImageNotWritten { .. }]
        ));
    }
}
