//! Scriptable copy tool shared by the unit tests
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::probe::ResourceProbe;
use crate::tool::{CopyTool, ToolError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct StubTool {
    fail_first_copies: usize,
    fail_sources: Vec<String>,
    fail_first_logins: usize,
    download_fails: bool,
    served: Option<PathBuf>,
    copies: Mutex<Vec<(String, String)>>,
    logins: AtomicUsize,
    downloads: AtomicUsize,
}

impl StubTool {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_always() -> Self {
        Self {
            fail_first_copies: usize::MAX,
            ..Self::default()
        }
    }

    /// The first `n` copy calls fail, later ones succeed
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first_copies: n,
            ..Self::default()
        }
    }

    /// Copies whose source contains `fragment` always fail
    pub fn failing_for(mut self, fragment: &str) -> Self {
        self.fail_sources.push(fragment.to_string());
        self
    }

    pub fn with_login_failures(mut self, n: usize) -> Self {
        self.fail_first_logins = n;
        self
    }

    /// Downloads reproduce `tree` inside the target directory
    pub fn serving(mut self, tree: impl Into<PathBuf>) -> Self {
        self.served = Some(tree.into());
        self
    }

    pub fn with_download_failure(mut self) -> Self {
        self.download_fails = true;
        self
    }

    pub fn copy_attempts(&self) -> usize {
        self.copies.lock().unwrap().len()
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.lock().unwrap().clone()
    }

    pub fn login_attempts(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn download_attempts(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn exit(operation: &'static str) -> ToolError {
        ToolError::Exit {
            operation,
            code: Some(1),
            output: "stub failure".to_string(),
        }
    }
}

#[async_trait]
impl CopyTool for StubTool {
    async fn login(&self) -> Result<(), ToolError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first_logins {
            return Err(Self::exit("login"));
        }
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), ToolError> {
        let n = {
            let mut copies = self.copies.lock().unwrap();
            copies.push((source.to_string(), destination.to_string()));
            copies.len() - 1
        };
        if n < self.fail_first_copies || self.fail_sources.iter().any(|f| source.contains(f.as_str())) {
            return Err(Self::exit("copy"));
        }
        Ok(())
    }

    async fn download(&self, _remote: &str, local: &Path) -> Result<(), ToolError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.download_fails {
            return Err(Self::exit("download"));
        }
        if let Some(served) = &self.served {
            let name = served.file_name().unwrap_or_default();
            copy_tree(served, &local.join(name)).unwrap();
        }
        Ok(())
    }
}

pub(crate) fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_file() {
        std::fs::copy(from, to)?;
        return Ok(());
    }
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        copy_tree(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

/// Probe reporting a fixed amount of available memory
pub(crate) struct FixedProbe(pub Option<u64>);

impl ResourceProbe for FixedProbe {
    fn available_bytes(&self) -> Option<u64> {
        self.0
    }
}
