//! TeX engine orchestration.
//!
//! One scoped temp directory and one child process per call. The child is
//! killed on timeout; every exit path drops the working directory. Failed
//! compiles are outcomes, not errors.

use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    storage::{artifacts::ArtifactStore, types::tex_file::CompilationStatus},
    utils::config::AppConfig,
};

#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub status: CompilationStatus,
    pub log: String,
    pub artifact: Option<Bytes>,
}

#[derive(Clone)]
pub struct TexCompiler {
    command: String,
    time_limit: Duration,
    artifacts: ArtifactStore,
}

impl TexCompiler {
    pub fn new(config: &AppConfig, artifacts: ArtifactStore) -> Self {
        Self {
            command: config.latex_command.clone(),
            time_limit: Duration::from_secs(config.compile_timeout_secs),
            artifacts,
        }
    }

    /// Run the engine against a content snapshot. Infallible at the call
    /// site: spawn and IO failures are folded into an `Error` outcome with
    /// the failure message as log.
    pub async fn compile(&self, content: &str, display_name: &str) -> CompileOutcome {
        match self.run(content, display_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(display_name, error = %e, "Compilation aborted before the engine finished");
                CompileOutcome {
                    status: CompilationStatus::Error,
                    log: e.to_string(),
                    artifact: None,
                }
            }
        }
    }

    /// Cached artifact for byte-identical content, if one exists.
    pub async fn cached_artifact(&self, content: &str) -> Result<Option<Bytes>, AppError> {
        Ok(self.artifacts.get_artifact(content).await?)
    }

    async fn run(&self, content: &str, display_name: &str) -> Result<CompileOutcome, AppError> {
        let workdir = TempDir::new()?;
        let stem = sanitize_stem(display_name);
        let tex_path = workdir.path().join(format!("{stem}.tex"));
        tokio::fs::write(&tex_path, content).await?;

        debug!(display_name, stem, "Spawning TeX engine");
        let child = Command::new(&self.command)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-output-directory={}", workdir.path().display()))
            .arg(&tex_path)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child handle, which
        // kills the process via kill_on_drop.
        let output = match timeout(self.time_limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    display_name,
                    limit_secs = self.time_limit.as_secs(),
                    "TeX engine exceeded wall-clock limit; process killed"
                );
                return Ok(CompileOutcome {
                    status: CompilationStatus::Timeout,
                    log: format!(
                        "Compilation exceeded the {}s time limit and was terminated",
                        self.time_limit.as_secs()
                    ),
                    artifact: None,
                });
            }
        };

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        // Both conditions required: a zero exit with no PDF on disk is a failure.
        let pdf_path = workdir.path().join(format!("{stem}.pdf"));
        if output.status.success() && pdf_path.exists() {
            let artifact = Bytes::from(tokio::fs::read(&pdf_path).await?);
            if let Err(e) = self.artifacts.put_artifact(content, artifact.clone()).await {
                warn!(error = %e, "Failed to cache compiled artifact");
            }
            Ok(CompileOutcome {
                status: CompilationStatus::Success,
                log,
                artifact: Some(artifact),
            })
        } else {
            Ok(CompileOutcome {
                status: CompilationStatus::Error,
                log,
                artifact: None,
            })
        }
    }
}

/// Reduce a display name to a safe file stem: extension dropped, anything
/// outside `[A-Za-z0-9_]` replaced, empty input falls back to "document".
fn sanitize_stem(display_name: &str) -> String {
    let base = display_name.strip_suffix(".tex").unwrap_or(display_name);
    let stem: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.trim_matches('_').is_empty() {
        "document".to_string()
    } else {
        stem
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TexCompiler {
    /// Stand-in engine that emits a fake PDF next to its input.
    pub const FAKE_SUCCESS_SCRIPT: &'static str = r#"#!/bin/sh
out="."
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
  esac
  last="$arg"
done
stem=$(basename "$last" .tex)
echo "This is a fake TeX run on $last"
printf '%%PDF-1.4\n%%fake artifact\n' > "$out/$stem.pdf"
"#;

    /// Stand-in engine that fails like an engine hitting a TeX error.
    pub const FAKE_FAILURE_SCRIPT: &'static str = r#"#!/bin/sh
echo "! Missing $ inserted."
exit 1
"#;

    /// Stand-in engine that never finishes within any sane limit.
    pub const FAKE_HANG_SCRIPT: &'static str = r#"#!/bin/sh
sleep 600
"#;

    /// Build a compiler around a fake engine script backed by an in-memory
    /// artifact store. The returned `TempDir` keeps the script alive.
    pub fn fake(script: &str, timeout_secs: u64) -> (Self, TempDir) {
        Self::fake_with_store(script, timeout_secs, ArtifactStore::memory())
    }

    pub fn fake_with_store(
        script: &str,
        timeout_secs: u64,
        artifacts: ArtifactStore,
    ) -> (Self, TempDir) {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("temp dir for fake engine");
        let script_path = dir.path().join("fake-tex");
        std::fs::write(&script_path, script).expect("write fake engine");
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
            .expect("mark fake engine executable");

        let compiler = Self {
            command: script_path.to_string_lossy().into_owned(),
            time_limit: Duration::from_secs(timeout_secs),
            artifacts,
        };
        (compiler, dir)
    }
}
