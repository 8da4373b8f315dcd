//! Result image relocation tests.
//!
//! Covers how the registered image reaches the caller: moved to an output
//! path, decoded to pixels, or discarded.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p regbridge-tests --test relocation
//! ```

#![cfg(unix)]

use std::fs;

use pretty_assertions::assert_eq;
use regbridge::image::read_image;
use regbridge::{ImageRef, RegistrationError, RegistrationOptions, RegistrationWarning};
use regbridge_tests::fixtures::{gray_gradient, test_card};
use regbridge_tests::{FakeTool, ResultImage, TestWorkspace};

#[test]
fn test_result_moved_to_output_path() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let moving = ws.write_image("moving.png", &test_card());
    let destination = ws.outputs().join("registered.png");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&moving),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert_eq!(output.image, Some(ImageRef::path(&destination)));
    assert!(output.warnings.is_empty());
    assert_eq!(read_image(&destination).unwrap(), test_card());
    ws.assert_no_temp_resources();
}

#[test]
fn test_output_parent_directories_are_created() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let destination = ws.outputs().join("run-1").join("nested").join("out.png");

    ws.session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert!(destination.is_file());
}

#[test]
fn test_extension_mismatch_warns_and_still_moves() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let destination = ws.outputs().join("out.jpg");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("a mismatched extension is not an error");

    assert!(destination.is_file());
    assert_eq!(output.warnings.len(), 1);
    match &output.warnings[0] {
        RegistrationWarning::ExtensionMismatch {
            produced,
            requested,
        } => {
            assert_eq!(
                produced.file_name().and_then(|n| n.to_str()),
                Some("result.0.png")
            );
            assert_eq!(requested, &destination);
        }
        other => panic!("expected ExtensionMismatch, got {:?}", other),
    }
    assert_eq!(output.warnings[0].code(), "REG_W001");
    ws.assert_no_temp_resources();
}

#[test]
fn test_extension_comparison_ignores_case() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let destination = ws.outputs().join("OUT.PNG");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert!(output.warnings.is_empty());
}

#[test]
fn test_non_png_result_format() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new().result(ResultImage::CopyMoving("tif")));
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let destination = ws.outputs().join("out.tif");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert!(output.warnings.is_empty());
    assert!(destination.is_file());
}

#[test]
fn test_meta_image_result_keeps_its_pixel_data() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new().result(ResultImage::MetaImage));
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let moving = ws.write_image("moving.png", &test_card());
    let destination = ws.outputs().join("reg.mhd");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&moving),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert_eq!(output.image, Some(ImageRef::path(&destination)));
    assert!(output.warnings.is_empty());

    let header = fs::read_to_string(&destination).unwrap();
    assert!(header.contains("ElementDataFile = reg.raw"), "{}", header);
    assert!(!header.contains("result.0.raw"));
    assert!(header.starts_with("ObjectType = Image\n"));

    let data = ws.outputs().join("reg.raw");
    assert_eq!(fs::read(&data).unwrap(), fs::read(&moving).unwrap());
    ws.assert_no_temp_resources();
}

#[test]
fn test_requested_output_without_result_image() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new().result(ResultImage::None));
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());
    let destination = ws.outputs().join("out.png");

    let err = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default().output_path(&destination),
        )
        .unwrap_err();

    assert!(matches!(err, RegistrationError::MissingResultImage { .. }));
    assert!(!destination.exists());
    ws.assert_no_temp_resources();
}

#[test]
fn test_path_moving_without_output_discards_result() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new().result(ResultImage::None));
    let params = ws.write_params();
    let fixed = ws.write_image("fixed.png", &gray_gradient());

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::path(&fixed),
            &ImageRef::path(&fixed),
            &RegistrationOptions::default(),
        )
        .expect("no result image is fine when none was requested");

    assert!(output.image.is_none());
    assert!(output.warnings.is_empty());
}

#[test]
fn test_pixel_moving_without_result_warns() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new().result(ResultImage::None));
    let params = ws.write_params();

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::Pixels(gray_gradient()),
            &ImageRef::Pixels(gray_gradient()),
            &RegistrationOptions::default(),
        )
        .expect("registration should succeed");

    assert!(output.image.is_none());
    assert!(matches!(
        output.warnings.as_slice(),
        [RegistrationWarning::ResultImageNotWritten { .. }]
    ));
    ws.assert_no_temp_resources();
}

#[test]
fn test_output_path_ignored_for_pixel_moving() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let destination = ws.outputs().join("ignored.png");

    let output = ws
        .session(&tool)
        .run(
            &params,
            &ImageRef::Pixels(gray_gradient()),
            &ImageRef::Pixels(test_card()),
            &RegistrationOptions::default().output_path(&destination),
        )
        .expect("registration should succeed");

    assert!(!destination.exists());
    assert_eq!(
        output.image.as_ref().and_then(ImageRef::as_pixels),
        Some(&test_card())
    );
    ws.assert_no_temp_resources();
}
