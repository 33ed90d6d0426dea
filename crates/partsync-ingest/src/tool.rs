//! External copy tool boundary
//!
//! Byte transfer is delegated to a command-line copy tool (azcopy-compatible
//! arguments). [`CopyTool`] is the seam the rest of the engine depends on;
//! [`CommandCopyTool`] is the process-spawning implementation.

use crate::config::{Credentials, TransferConfig};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Lines of tool output kept in an [`ToolError::Exit`]
const OUTPUT_TAIL_LINES: usize = 5;

/// Failure of a single tool invocation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} exited with status {code:?}: {output}")]
    Exit {
        operation: &'static str,
        code: Option<i32>,
        output: String,
    },
}

/// Operations the engine needs from the copy tool
#[async_trait]
pub trait CopyTool: Send + Sync {
    /// Obtain a short-lived credential; a no-op when login is not configured
    async fn login(&self) -> Result<(), ToolError>;

    /// Recursively copy a local path to a remote URL
    async fn copy(&self, source: &str, destination: &str) -> Result<(), ToolError>;

    /// Recursively copy a remote URL into a local directory
    async fn download(&self, remote: &str, local: &Path) -> Result<(), ToolError>;
}

/// Copy tool backed by an external executable
#[derive(Debug, Clone)]
pub struct CommandCopyTool {
    program: PathBuf,
    put_md5: bool,
    credentials: Option<Credentials>,
}

impl CommandCopyTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            put_md5: false,
            credentials: None,
        }
    }

    pub fn from_config(config: &TransferConfig, credentials: Option<Credentials>) -> Self {
        Self {
            program: config.tool_path.clone(),
            put_md5: config.put_md5,
            credentials,
        }
    }

    pub fn with_put_md5(mut self, put_md5: bool) -> Self {
        self.put_md5 = put_md5;
        self
    }

    fn copy_args(&self, source: &str, destination: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "copy".into(),
            source.into(),
            destination.into(),
            "--recursive".into(),
            "--check-length".into(),
        ];
        if self.put_md5 {
            args.push("--put-md5".into());
        }
        args
    }

    fn login_args(credentials: &Credentials) -> Vec<OsString> {
        vec![
            "login".into(),
            "--service-principal".into(),
            "--certificate-path".into(),
            credentials.certificate_path.clone().into_os_string(),
            "--application-id".into(),
            credentials.application_id.clone().into(),
            "--tenant-id".into(),
            credentials.tenant_id.clone().into(),
        ]
    }

    async fn invoke(&self, operation: &'static str, args: Vec<OsString>) -> Result<(), ToolError> {
        debug!(program = %self.program.display(), operation, "Invoking copy tool");

        // Not killed on drop: an interrupted process lets the tool finish.
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() { stdout } else { stderr };
        Err(ToolError::Exit {
            operation,
            code: output.status.code(),
            output: tail(&text, OUTPUT_TAIL_LINES),
        })
    }
}

#[async_trait]
impl CopyTool for CommandCopyTool {
    async fn login(&self) -> Result<(), ToolError> {
        match &self.credentials {
            Some(credentials) => self.invoke("login", Self::login_args(credentials)).await,
            None => Ok(()),
        }
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), ToolError> {
        self.invoke("copy", self.copy_args(source, destination)).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), ToolError> {
        let args = vec![
            "copy".into(),
            remote.into(),
            local.as_os_str().to_owned(),
            "--recursive".into(),
        ];
        self.invoke("download", args).await
    }
}

/// Strip the query string (SAS token) from a URL before it is logged
pub fn redact_url(url: &str) -> &str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

fn tail(text: &str, lines: usize) -> String {
    let collected: Vec<&str> = text.trim_end().lines().collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].join(" | ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_copy_args() {
        let tool = CommandCopyTool::new("azcopy");
        assert_eq!(
            strings(tool.copy_args("/db/t/p1", "https://acct/c/f/t?sig")),
            vec!["copy", "/db/t/p1", "https://acct/c/f/t?sig", "--recursive", "--check-length"]
        );

        let tool = tool.with_put_md5(true);
        assert_eq!(strings(tool.copy_args("a", "b")).last().unwrap(), "--put-md5");
    }

    #[test]
    fn test_login_args() {
        let creds = Credentials {
            certificate_path: PathBuf::from("/etc/partsync/sp.pem"),
            application_id: "app".into(),
            tenant_id: "tenant".into(),
        };
        assert_eq!(
            strings(CommandCopyTool::login_args(&creds)),
            vec![
                "login",
                "--service-principal",
                "--certificate-path",
                "/etc/partsync/sp.pem",
                "--application-id",
                "app",
                "--tenant-id",
                "tenant",
            ]
        );
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("https://a/c/f/t?sv=1&sig=secret"), "https://a/c/f/t");
        assert_eq!(redact_url("https://a/c/f/t"), "https://a/c/f/t");
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b | c");
        assert_eq!(tail("", 3), "");
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_noop() {
        let tool = CommandCopyTool::new("/nonexistent/copy-tool");
        assert!(tool.login().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tool = CommandCopyTool::new("/nonexistent/copy-tool");
        let err = tool.copy("a", "b").await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_exit_error() {
        let tool = CommandCopyTool::new("false");
        let err = tool.copy("a", "b").await.unwrap_err();
        assert!(matches!(err, ToolError::Exit { operation: "copy", code: Some(1), .. }));
    }
}
