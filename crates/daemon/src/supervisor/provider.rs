// SPDX-License-Identifier: MIT

//! CLI LLM providers: turns a
//! completion request into the argv the Subprocess Supervisor spawns,
//! kept as a pluggable strategy rather than a hardcoded command line.

/// A CLI-based LLM backend. Implementations only describe how to build the
/// command line; the supervisor owns the process lifecycle.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    fn program(&self) -> &'static str;
    fn args(&self, prompt: &str, session_id: Option<&str>) -> Vec<String>;

    /// Whether this provider's stdout is parsed as JSON to extract a
    /// `session_id`/result text, or treated as raw text.
    fn structured_output(&self) -> bool {
        true
    }
}

/// The `claude` CLI in non-interactive, single-shot mode.
pub struct ClaudeCli;

impl Provider for ClaudeCli {
    fn name(&self) -> &'static str {
        "claude_cli"
    }

    fn program(&self) -> &'static str {
        "claude"
    }

    fn args(&self, prompt: &str, session_id: Option<&str>) -> Vec<String> {
        let mut args = vec!["-p".to_string(), prompt.to_string(), "--output-format".to_string(), "json".to_string()];
        if let Some(session_id) = session_id {
            args.push("--resume".to_string());
            args.push(session_id.to_string());
        }
        args
    }
}

/// The `gemini` CLI in non-interactive mode.
pub struct GeminiCli;

impl Provider for GeminiCli {
    fn name(&self) -> &'static str {
        "gemini_cli"
    }

    fn program(&self) -> &'static str {
        "gemini"
    }

    fn args(&self, prompt: &str, _session_id: Option<&str>) -> Vec<String> {
        vec!["-p".to_string(), prompt.to_string()]
    }

    fn structured_output(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
