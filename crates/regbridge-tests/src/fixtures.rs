//! Artifact contents and images shared by the end-to-end suites.

use regbridge::{PixelBuffer, PixelLayout};

/// Transform file written by a translation registration.
pub const TRANSLATION_TRANSFORM: &str = r#"(Transform "TranslationTransform")
(NumberOfParameters 2)
(TransformParameters -2.4571 0.3162)
(InitialTransformParametersFileName "NoInitialTransform")
(HowToCombineTransforms "Compose")

// Image specific
(FixedImageDimension 2)
(MovingImageDimension 2)
(FixedInternalImagePixelType "float")
(MovingInternalImagePixelType "float")
(Size 16 12)
(Index 0 0)
(Spacing 1.0000000000 1.0000000000)
(Origin 0.0000000000 0.0000000000)
(Direction 1.0000000000 0.0000000000 0.0000000000 1.0000000000)
(UseDirectionCosines "true")

// ResampleInterpolator specific
(ResampleInterpolator "FinalBSplineInterpolator")
(FinalBSplineInterpolationOrder 3)

// Resampler specific
(Resampler "DefaultResampler")
(DefaultPixelValue 0.000000)
(ResultImageFormat "png")
(ResultImagePixelType "unsigned char")
(CompressResultImage "false")
"#;

/// Minimal registration parameter file.
pub const TRANSLATION_PARAMETERS: &str = r#"(FixedInternalImagePixelType "float")
(MovingInternalImagePixelType "float")
(Registration "MultiResolutionRegistration")
(Transform "TranslationTransform")
(Metric "AdvancedMeanSquares")
(Optimizer "AdaptiveStochasticGradientDescent")
(MaximumNumberOfIterations 10)
(ResultImageFormat "png")
"#;

/// Iteration log with `rows` optimizer iterations, in the tool's column layout.
pub fn iteration_log(rows: usize) -> String {
    let mut log = String::from("1:ItNr\t2:Metric\t3a:Time\t3b:StepSize\t4:||Gradient||\tTime[ms]\n");
    for i in 0..rows {
        log.push_str(&format!(
            "{}\t{:.6}\t{:.1}\t{:.6}\t{:.6}\t{:.1}\n",
            i,
            1000.0 / (i + 1) as f64,
            i as f64,
            2.0 * 0.9f64.powi(i as i32),
            50.0 / (i + 1) as f64,
            1.5
        ));
    }
    log
}

/// A small RGB test card with distinct values in every channel.
pub fn test_card() -> PixelBuffer {
    let (width, height) = (16u32, 12u32);
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 16) as u8);
            data.push((y * 21) as u8);
            data.push(((x + y) * 7) as u8);
        }
    }
    PixelBuffer::new(width, height, PixelLayout::Rgb8, data)
}

/// A grayscale gradient the same size as [`test_card`].
pub fn gray_gradient() -> PixelBuffer {
    let (width, height) = (16u32, 12u32);
    let data = (0..width * height).map(|i| (i % 256) as u8).collect();
    PixelBuffer::gray(width, height, data)
}
