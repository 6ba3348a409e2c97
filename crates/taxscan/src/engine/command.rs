//! Out-of-process recognizer.

use std::path::Path;
use std::process::Command;

use crate::engine::{EnginePayload, OcrEngine};
use crate::error::EngineError;

/// Runs a configured external recognizer command, appending the document path
/// as the final argument, and reads the extracted text from stdout.
///
/// Stdout may be raw text, a JSON string, or a JSON object with a `text`
/// field; all three normalize to plain text. A non-zero exit code or a spawn
/// failure is an [`EngineError`].
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds an engine from an argv-style command line, e.g. the value of
    /// [`crate::config::OcrSettings::command`]. `None` when the line is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    fn parse_output(stdout: &[u8]) -> String {
        let raw = String::from_utf8_lossy(stdout);
        match serde_json::from_str::<EnginePayload>(raw.trim()) {
            Ok(payload) => payload.into_text(),
            // Not JSON: the recognizer printed the text itself.
            Err(_) => raw.trim_end_matches('\n').to_string(),
        }
    }
}

impl OcrEngine for CommandEngine {
    fn recognize(&self, path: &Path) -> Result<String, EngineError> {
        let _span = tracing::info_span!("engine.command").entered();

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| EngineError::Spawn {
                command: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::warn!("Recognizer '{}' failed with code {}", self.program, code);
            return Err(EngineError::CommandFailed { code, stderr });
        }

        Ok(Self::parse_output(&output.stdout))
    }
}
