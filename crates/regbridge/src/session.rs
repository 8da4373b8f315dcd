//! Registration session: one end-to-end run of the registration tool.
//!
//! A session walks
//! `Init -> InputsResolved -> Invoked -> ResultsParsed -> Relocated -> Cleaned -> Done`.
//! Any failure jumps to `Failed`, after which cleanup still runs and the
//! session ends in `Cleaned` with the error returned. Every temp resource the
//! session acquires is released exactly once on both paths.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{RegistrationError, RegistrationResult, RegistrationWarning};
use crate::image::ImageRef;
use crate::invoker::{validate_parameter_file, Invoker, InvokerConfig};
use crate::iterations::{parse_iterations, IterationRecord};
use crate::locate::{find_result_image, locate_iteration_log, locate_transform_file};
use crate::materialize::materialize;
use crate::relocate::relocate;
use crate::temp::{TempResource, TempSpace};
use crate::transform::{parse_transform, TransformRecord};

/// Caller options, resolved once when the session starts.
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    /// Pass the tool's stdout/stderr through instead of capturing it.
    pub verbose: bool,
    /// Where to move the registered image. Only used when the moving image is
    /// a path.
    pub output_path: Option<PathBuf>,
}

impl RegistrationOptions {
    /// Sets verbose tool output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the destination for the registered image.
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Lifecycle states of a [`RegistrationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    InputsResolved,
    Invoked,
    ResultsParsed,
    Relocated,
    Cleaned,
    Done,
    Failed,
}

/// Everything a successful session produces.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutput {
    pub transform: TransformRecord,
    /// Registered image: a path when moved to `output_path`, pixels when the
    /// moving image was in memory, `None` otherwise.
    #[serde(skip)]
    pub image: Option<ImageRef>,
    pub iterations: IterationRecord,
    pub warnings: Vec<RegistrationWarning>,
}

/// A single-use registration run.
#[derive(Debug)]
pub struct RegistrationSession {
    invoker: Invoker,
    temp: TempSpace,
    state: SessionState,
    history: Vec<SessionState>,
}

impl Default for RegistrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationSession {
    /// Creates a session with default tool discovery and the system temp dir.
    pub fn new() -> Self {
        Self::with_parts(Invoker::new(), TempSpace::default())
    }

    /// Creates a session from an invoker and a temp space.
    pub fn with_parts(invoker: Invoker, temp: TempSpace) -> Self {
        Self {
            invoker,
            temp,
            state: SessionState::Init,
            history: vec![SessionState::Init],
        }
    }

    /// Replaces the invoker configuration.
    pub fn with_invoker_config(mut self, config: InvokerConfig) -> Self {
        self.invoker = Invoker::with_config(config);
        self
    }

    /// Replaces the temp space.
    pub fn with_temp_space(mut self, temp: TempSpace) -> Self {
        self.temp = temp;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Init`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        self.history.push(next);
    }

    /// Registers `moving` onto `fixed` using the parameters in `param_file`.
    ///
    /// The parameter file is checked before anything is written to disk. No
    /// partial results are returned on error.
    pub fn run(
        &mut self,
        param_file: &Path,
        fixed: &ImageRef,
        moving: &ImageRef,
        options: &RegistrationOptions,
    ) -> RegistrationResult<RegistrationOutput> {
        if self.state != SessionState::Init {
            return Err(RegistrationError::SessionReused);
        }
        let _span = tracing::debug_span!("registration", params = %param_file.display()).entered();

        let mut resources = Vec::new();
        let outcome = validate_parameter_file(param_file)
            .and_then(|()| self.execute(param_file, fixed, moving, options, &mut resources));

        if let Err(ref e) = outcome {
            tracing::debug!(code = e.code(), error = %e, "registration session failed");
            self.advance(SessionState::Failed);
        }

        for resource in resources.iter_mut() {
            resource.release();
        }
        self.advance(SessionState::Cleaned);

        let output = outcome?;
        self.advance(SessionState::Done);
        Ok(output)
    }

    fn execute(
        &mut self,
        param_file: &Path,
        fixed: &ImageRef,
        moving: &ImageRef,
        options: &RegistrationOptions,
        resources: &mut Vec<TempResource>,
    ) -> RegistrationResult<RegistrationOutput> {
        let mut fixed_file = materialize(fixed, &self.temp)?;
        resources.extend(fixed_file.take_temp());
        let mut moving_file = materialize(moving, &self.temp)?;
        resources.extend(moving_file.take_temp());

        let out_dir = self.temp.acquire_temp_dir()?;
        let out_path = out_dir.path().to_path_buf();
        resources.push(out_dir);
        self.advance(SessionState::InputsResolved);

        let run = self.invoker.run(
            fixed_file.path(),
            moving_file.path(),
            &out_path,
            param_file,
            options.verbose,
        )?;
        tracing::debug!(elapsed_ms = run.elapsed.as_millis() as u64, "tool run complete");
        self.advance(SessionState::Invoked);

        let transform = parse_transform(&locate_transform_file(&out_path)?)?;
        let iterations = parse_iterations(&locate_iteration_log(&out_path)?)?;
        self.advance(SessionState::ResultsParsed);

        let result_image = find_result_image(&out_path)?;
        let relocation = relocate(
            result_image.as_deref(),
            &out_path,
            moving.is_path(),
            options.output_path.as_deref(),
        )?;
        self.advance(SessionState::Relocated);

        Ok(RegistrationOutput {
            transform,
            image: relocation.image,
            iterations,
            warnings: relocation.warnings,
        })
    }
}

/// Runs one registration with default tool discovery and temp location.
pub fn register(
    param_file: &Path,
    fixed: &ImageRef,
    moving: &ImageRef,
    options: &RegistrationOptions,
) -> RegistrationResult<RegistrationOutput> {
    RegistrationSession::new().run(param_file, fixed, moving, options)
}
