//! Register command implementation
//!
//! Runs one registration session and reports the transform, optimizer
//! statistics and where the registered image went.

use anyhow::{Context, Result};
use colored::Colorize;
use regbridge::{
    ImageRef, InvokerConfig, RegistrationOptions, RegistrationOutput, RegistrationSession,
};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

/// Arguments for the register command.
#[derive(Debug, Clone, Default)]
pub struct RegisterArgs {
    pub params: String,
    pub fixed: String,
    pub moving: String,
    pub out: Option<String>,
    pub verbose: bool,
    pub tool: Option<String>,
    pub timeout: Option<u64>,
    pub json: bool,
}

#[derive(Serialize)]
struct RegisterJson<'a> {
    success: bool,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a Path>,
    #[serde(flatten)]
    output: &'a RegistrationOutput,
}

/// Run the register command
///
/// # Returns
/// Exit code: 0 on success. Failures are returned as errors.
pub fn run(args: &RegisterArgs) -> Result<ExitCode> {
    let mut config = InvokerConfig::default();
    if let Some(ref tool) = args.tool {
        config = config.tool_path(tool);
    }
    if let Some(secs) = args.timeout {
        config = config.timeout_secs(secs);
    }

    let mut options = RegistrationOptions::default().verbose(args.verbose);
    if let Some(ref out) = args.out {
        options = options.output_path(out);
    }

    tracing::debug!(
        tool = ?config.tool_path,
        timeout = ?config.timeout,
        verbose = options.verbose,
        output_path = ?options.output_path,
        "resolved register options"
    );

    if !args.json {
        println!("{} {} -> {}", "Registering:".cyan().bold(), args.moving, args.fixed);
    }

    let start = Instant::now();
    let mut session = RegistrationSession::new().with_invoker_config(config);
    let output = session
        .run(
            Path::new(&args.params),
            &ImageRef::path(&args.fixed),
            &ImageRef::path(&args.moving),
            &options,
        )
        .with_context(|| format!("Registration with parameter file {} failed", args.params))?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let image_path = output.image.as_ref().and_then(ImageRef::as_path);

    if args.json {
        let json = RegisterJson {
            success: true,
            duration_ms,
            image: image_path,
            output: &output,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print_summary(&output, image_path, duration_ms);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(output: &RegistrationOutput, image: Option<&Path>, duration_ms: u64) {
    let transform = &output.transform;
    println!(
        "  {} {}",
        "Transform:".bold(),
        transform.transform.as_deref().unwrap_or("unknown")
    );
    if let Some(ref params) = transform.transform_parameters {
        let joined: Vec<String> = params.iter().map(|p| format!("{:.6}", p)).collect();
        println!("  {} {}", "Parameters:".bold(), joined.join(" "));
    }

    let iterations = &output.iterations;
    match iterations.final_metric() {
        Some(metric) => println!(
            "  {} {} (final metric {:.6}, {:.1} ms)",
            "Iterations:".bold(),
            iterations.len(),
            metric,
            iterations.total_time_ms()
        ),
        None => println!("  {} none recorded", "Iterations:".bold()),
    }

    match image {
        Some(path) => println!("  {} {}", "Image:".bold(), path.display()),
        None => println!("  {} {}", "Image:".bold(), "discarded".dimmed()),
    }

    for warning in &output.warnings {
        println!("  {} {}", "!!".yellow(), warning);
    }

    println!(
        "{} Registration finished in {}ms",
        "SUCCESS".green().bold(),
        duration_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resolved_options_are_logged() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = RegisterArgs {
            params: dir.path().join("missing.txt").to_string_lossy().into_owned(),
            fixed: "fixed.png".to_string(),
            moving: "moving.png".to_string(),
            tool: Some("/opt/elastix/bin/elastix".to_string()),
            timeout: Some(30),
            json: true,
            ..Default::default()
        };

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || run(&args));
        assert!(result.is_err());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("resolved register options"), "{}", logs);
        assert!(logs.contains("/opt/elastix/bin/elastix"), "{}", logs);
    }

    #[test]
    fn test_missing_params_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = RegisterArgs {
            params: dir.path().join("missing.txt").to_string_lossy().into_owned(),
            fixed: "fixed.png".to_string(),
            moving: "moving.png".to_string(),
            json: true,
            ..Default::default()
        };

        let err = run(&args).unwrap_err();
        let root = err.root_cause().to_string();
        assert!(root.contains("Invalid parameter file"), "{}", root);
    }
}
