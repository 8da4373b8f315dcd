//! Scripted registration tools and per-test workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use regbridge::{
    image::write_png, InvokerConfig, PixelBuffer, RegistrationSession, SequentialNames, TempSpace,
};
use tempfile::TempDir;

use crate::fixtures::{iteration_log, TRANSLATION_PARAMETERS, TRANSLATION_TRANSFORM};

/// What the fake tool writes as `result.0.*`.
#[derive(Debug, Clone)]
pub enum ResultImage {
    /// No result image.
    None,
    /// A copy of the moving image with the given extension.
    CopyMoving(&'static str),
    /// Bytes that no decoder accepts, with the given extension.
    Garbage(&'static str),
    /// A `result.0.mhd` header whose pixel data is a copy of the moving
    /// image in `result.0.raw`.
    MetaImage,
}

/// Behaviour of a scripted stand-in for the registration tool.
#[derive(Debug, Clone)]
pub struct FakeTool {
    exit_code: i32,
    transform: Option<String>,
    iteration_log: Option<String>,
    result: ResultImage,
    sleep_secs: u32,
    stderr: Option<String>,
}

impl Default for FakeTool {
    fn default() -> Self {
        Self {
            exit_code: 0,
            transform: Some(TRANSLATION_TRANSFORM.to_string()),
            iteration_log: Some(iteration_log(10)),
            result: ResultImage::CopyMoving("png"),
            sleep_secs: 0,
            stderr: None,
        }
    }
}

impl FakeTool {
    /// A tool that succeeds and writes all three artifacts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exits with `code` after writing its artifacts.
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Prints `message` on stderr.
    pub fn stderr(mut self, message: &str) -> Self {
        self.stderr = Some(message.to_string());
        self
    }

    /// Sleeps before writing anything.
    pub fn sleep_secs(mut self, secs: u32) -> Self {
        self.sleep_secs = secs;
        self
    }

    /// Replaces the transform file contents.
    pub fn transform(mut self, contents: &str) -> Self {
        self.transform = Some(contents.to_string());
        self
    }

    /// Skips writing the transform file.
    pub fn without_transform(mut self) -> Self {
        self.transform = None;
        self
    }

    /// Replaces the iteration log contents.
    pub fn iteration_log(mut self, contents: &str) -> Self {
        self.iteration_log = Some(contents.to_string());
        self
    }

    /// Skips writing the iteration log.
    pub fn without_iteration_log(mut self) -> Self {
        self.iteration_log = None;
        self
    }

    /// Sets what is written as the result image.
    pub fn result(mut self, result: ResultImage) -> Self {
        self.result = result;
        self
    }

    /// Renders the shell script. Each run records its arguments in
    /// `<record_dir>/<out dir name>.txt`.
    pub fn script(&self, record_dir: &Path) -> String {
        let mut s = String::from(
            "#!/bin/sh\n\
             while [ $# -gt 0 ]; do\n\
             \x20 case \"$1\" in\n\
             \x20   -f) FIXED=\"$2\"; shift 2 ;;\n\
             \x20   -m) MOVING=\"$2\"; shift 2 ;;\n\
             \x20   -out) OUT=\"$2\"; shift 2 ;;\n\
             \x20   -p) PARAMS=\"$2\"; shift 2 ;;\n\
             \x20   *) shift ;;\n\
             \x20 esac\n\
             done\n",
        );
        s.push_str(&format!(
            "printf '%s\\n' \"$FIXED\" \"$MOVING\" \"$OUT\" \"$PARAMS\" > \"{}/$(basename \"$OUT\").txt\"\n",
            record_dir.display()
        ));

        if self.sleep_secs > 0 {
            s.push_str(&format!("sleep {}\n", self.sleep_secs));
        }
        if let Some(ref transform) = self.transform {
            push_heredoc(&mut s, "TransformParameters.0.txt", transform);
        }
        if let Some(ref log) = self.iteration_log {
            push_heredoc(&mut s, "IterationInfo.0.R0.txt", log);
        }
        match self.result {
            ResultImage::None => {}
            ResultImage::CopyMoving(ext) => {
                s.push_str(&format!("cp \"$MOVING\" \"$OUT/result.0.{}\"\n", ext));
            }
            ResultImage::Garbage(ext) => {
                s.push_str(&format!("echo garbage > \"$OUT/result.0.{}\"\n", ext));
            }
            ResultImage::MetaImage => {
                push_heredoc(&mut s, "result.0.mhd", META_IMAGE_HEADER);
                s.push_str("cp \"$MOVING\" \"$OUT/result.0.raw\"\n");
            }
        }
        if let Some(ref message) = self.stderr {
            s.push_str(&format!("echo '{}' 1>&2\n", message));
        }
        s.push_str(&format!("exit {}\n", self.exit_code));
        s
    }
}

const META_IMAGE_HEADER: &str = "ObjectType = Image
NDims = 2
DimSize = 16 12
ElementType = MET_UCHAR
ElementDataFile = result.0.raw
";

fn push_heredoc(script: &mut String, file_name: &str, contents: &str) {
    script.push_str(&format!("cat > \"$OUT/{}\" <<'REGBRIDGE_EOF'\n", file_name));
    script.push_str(contents);
    if !contents.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("REGBRIDGE_EOF\n");
}

/// Arguments one tool run was started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub fixed: PathBuf,
    pub moving: PathBuf,
    pub out_dir: PathBuf,
    pub params: PathBuf,
}

/// An isolated directory tree for one test.
///
/// ```text
/// <root>/tmp       session temp space (must be empty after every session)
/// <root>/bin       fake tool
/// <root>/calls     one record per tool run
/// <root>/inputs    caller-owned images and parameter files
/// <root>/outputs   caller-requested output locations
/// ```
pub struct TestWorkspace {
    root: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create a new workspace.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create workspace");
        for dir in ["tmp", "bin", "calls", "inputs", "outputs"] {
            fs::create_dir(root.path().join(dir)).expect("Failed to create workspace dir");
        }
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Directory sessions create their temp resources in.
    pub fn temp_root(&self) -> PathBuf {
        self.path().join("tmp")
    }

    /// Directory for caller-requested outputs.
    pub fn outputs(&self) -> PathBuf {
        self.path().join("outputs")
    }

    /// Writes `tool` as an executable script and returns its path.
    pub fn install_tool(&self, tool: &FakeTool) -> PathBuf {
        let path = self.path().join("bin").join("fake-elastix");
        fs::write(&path, tool.script(&self.path().join("calls"))).expect("Failed to write tool");
        make_executable(&path);
        path
    }

    /// Writes the standard parameter file.
    pub fn write_params(&self) -> PathBuf {
        let path = self.path().join("inputs").join("parameters.txt");
        fs::write(&path, TRANSLATION_PARAMETERS).expect("Failed to write parameter file");
        path
    }

    /// Writes `buffer` as a PNG under `inputs/`.
    pub fn write_image(&self, name: &str, buffer: &PixelBuffer) -> PathBuf {
        let path = self.path().join("inputs").join(name);
        write_png(buffer, &path).expect("Failed to write image");
        path
    }

    /// Temp space rooted in this workspace with deterministic names.
    pub fn temp_space(&self) -> TempSpace {
        TempSpace::new(self.temp_root()).with_names(SequentialNames::new("session"))
    }

    /// A session wired to `tool` and this workspace's temp space.
    pub fn session(&self, tool: &Path) -> RegistrationSession {
        RegistrationSession::new()
            .with_invoker_config(InvokerConfig::default().tool_path(tool))
            .with_temp_space(self.temp_space())
    }

    /// Entries currently under the temp root.
    pub fn temp_entries(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = fs::read_dir(self.temp_root())
            .expect("Failed to list temp root")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        entries
    }

    /// Panics if any temp file or directory survived.
    pub fn assert_no_temp_resources(&self) {
        let leftovers = self.temp_entries();
        assert!(
            leftovers.is_empty(),
            "temporary resources left behind: {:?}",
            leftovers
        );
    }

    /// All recorded tool runs, sorted by output directory.
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        let mut calls: Vec<ToolInvocation> = fs::read_dir(self.path().join("calls"))
            .expect("Failed to list calls")
            .filter_map(|e| e.ok())
            .map(|e| parse_invocation(&fs::read_to_string(e.path()).expect("Failed to read call")))
            .collect();
        calls.sort_by(|a, b| a.out_dir.cmp(&b.out_dir));
        calls
    }

    /// The single recorded tool run, if exactly one happened.
    pub fn only_invocation(&self) -> Option<ToolInvocation> {
        let mut calls = self.invocations();
        (calls.len() == 1).then(|| calls.remove(0))
    }
}

fn parse_invocation(record: &str) -> ToolInvocation {
    let mut lines = record.lines().map(PathBuf::from);
    let mut next = || lines.next().unwrap_or_default();
    ToolInvocation {
        fixed: next(),
        moving: next(),
        out_dir: next(),
        params: next(),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make tool executable");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_contains_artifacts() {
        let script = FakeTool::new()
            .exit_code(4)
            .stderr("boom")
            .script(Path::new("/calls"));

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("TransformParameters.0.txt"));
        assert!(script.contains("IterationInfo.0.R0.txt"));
        assert!(script.contains("cp \"$MOVING\" \"$OUT/result.0.png\""));
        assert!(script.contains("echo 'boom' 1>&2"));
        assert!(script.ends_with("exit 4\n"));
    }

    #[test]
    fn test_script_omits_skipped_artifacts() {
        let script = FakeTool::new()
            .without_transform()
            .result(ResultImage::None)
            .script(Path::new("/calls"));

        assert!(!script.contains("TransformParameters"));
        assert!(!script.contains("result.0."));
    }

    #[test]
    fn test_script_writes_meta_image_pair() {
        let script = FakeTool::new()
            .result(ResultImage::MetaImage)
            .script(Path::new("/calls"));

        assert!(script.contains("cat > \"$OUT/result.0.mhd\""));
        assert!(script.contains("ElementDataFile = result.0.raw"));
        assert!(script.contains("cp \"$MOVING\" \"$OUT/result.0.raw\""));
    }

    #[test]
    fn test_parse_invocation() {
        let call = parse_invocation("/a.png\n/b.png\n/tmp/out\n/p.txt\n");
        assert_eq!(call.moving, PathBuf::from("/b.png"));
        assert_eq!(call.out_dir, PathBuf::from("/tmp/out"));
    }
}
