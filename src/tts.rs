use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::paths;

/// One text-to-speech job: render `text` into
/// `<audio_dir>/<namespace>/<base_name>.mp3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    /// Output namespace: a channel label or a project name.
    pub namespace: String,
    pub base_name: String,
}

/// The external speech renderer. Implementations report success or failure
/// only; the artifact path is derived from the request.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<(), AppError>;
}

/// Runs a generator program as `<program> <args...> <text> <namespace> <base_name>`.
///
/// Arguments are passed directly, never through a shell, so quoting in the
/// spoken text cannot change the command.
pub struct ScriptSynth {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScriptSynth {
    pub fn new(program: String, args: Vec<String>, working_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            args,
            working_dir,
            timeout,
        }
    }
}

#[async_trait]
impl SpeechSynth for ScriptSynth {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<(), AppError> {
        let target =
            paths::rendered_audio(&self.working_dir, &request.namespace, &request.base_name);
        log::info!("Generating {} via {}", target.display(), self.program);

        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(&request.text)
            .arg(&request.namespace)
            .arg(&request.base_name)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::ExternalTool {
                message: format!("failed to start {}: {e}", self.program),
            })?;

        // Dropping the child on timeout kills it (kill_on_drop).
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AppError::ExternalTool {
                message: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| AppError::ExternalTool {
                message: format!("process error: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            log::debug!("Generator output: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            log::debug!("Generator errors: {}", stderr.trim());
        }

        if output.status.success() {
            log::info!("Generated {}", target.display());
            Ok(())
        } else {
            Err(AppError::ExternalTool {
                message: match output.status.code() {
                    Some(code) => format!("exit code {code}"),
                    None => "terminated by signal".to_string(),
                },
            })
        }
    }
}
