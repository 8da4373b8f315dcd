//! regbridge
//!
//! In-memory front end for a file-based image registration tool (elastix
//! command line). The tool only reads and writes files in a working directory;
//! this crate lets callers pass images as paths or pixel buffers and get back
//! structured results with nothing left on disk.
//!
//! # Overview
//!
//! A [`RegistrationSession`] runs these steps:
//!
//! 1. **Resolve inputs** - pixel buffers are written to temp PNG files
//! 2. **Invoke** - `elastix -f <fixed> -m <moving> -out <dir> -p <params>`
//! 3. **Parse** - `TransformParameters.0.*` and `IterationInfo.0.R0.*`
//! 4. **Relocate** - the `result.0.*` image is moved, decoded or discarded
//! 5. **Clean up** - every temp file and directory is removed, on success or failure
//!
//! # Example
//!
//! ```ignore
//! use regbridge::{register, ImageRef, PixelBuffer, RegistrationOptions};
//! use std::path::Path;
//!
//! let fixed = ImageRef::path("fixed.png");
//! let moving = ImageRef::Pixels(PixelBuffer::gray(256, 256, pixels));
//!
//! let output = register(Path::new("params.txt"), &fixed, &moving, &RegistrationOptions::default())?;
//!
//! println!("Transform: {:?}", output.transform.transform);
//! println!("Parameters: {:?}", output.transform.transform_parameters);
//! println!("Iterations: {}", output.iterations.len());
//! ```
//!
//! # Tool Requirements
//!
//! The invoker searches for the tool in:
//!
//! 1. [`InvokerConfig::tool_path`]
//! 2. `ELASTIX_PATH` environment variable
//! 3. System PATH
//! 4. Common installation locations (platform-specific)
//!
//! # Crate Structure
//!
//! - [`session`] - Session state machine and the [`register`] entry point
//! - [`temp`] - Scoped temporary files/directories and name sources
//! - [`image`] - Image references and the PNG codec for pixel data
//! - [`materialize`] - Turning image references into readable files
//! - [`invoker`] - Tool discovery and subprocess execution
//! - [`locate`] - Finding result artifacts in the output directory
//! - [`transform`] - Transform parameter file parser
//! - [`iterations`] - Iteration log parser
//! - [`relocate`] - Moving, decoding or discarding the result image
//! - [`error`] - Error and warning types

pub mod error;
pub mod image;
pub mod invoker;
pub mod iterations;
pub mod locate;
pub mod materialize;
pub mod relocate;
pub mod session;
pub mod temp;
pub mod transform;

// Re-export main types at crate root
pub use error::{RegistrationError, RegistrationResult, RegistrationWarning};
pub use image::{ImageRef, PixelBuffer, PixelLayout};
pub use invoker::{Invoker, InvokerConfig, ToolRun};
pub use iterations::{parse_iterations, IterationRecord, IterationRow};
pub use session::{
    register, RegistrationOptions, RegistrationOutput, RegistrationSession, SessionState,
};
pub use temp::{SequentialNames, TempNameSource, TempResource, TempSpace, UuidNames};
pub use transform::{parse_transform, ParamValue, TransformRecord};
