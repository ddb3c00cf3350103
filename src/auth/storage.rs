//! Where credential bundles are read from and written to
//!
//! Bundles live in a single environment variable holding the bundle's JSON.
//! The generator appends `VAR=<json>` lines to the project's env files; the
//! loader prefers the process environment and falls back to the last matching
//! line of `.env`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::bundle::CredentialBundle;
use crate::error::{AuthError, Result};

/// Environment variable holding the JSON credential bundle
pub const TOKEN_ENV_VAR: &str = "GOOGLE_PHOTOS_TOKEN";

/// Variable written by earlier generators, still read as a fallback
pub const LEGACY_TOKEN_ENV_VAR: &str = "GATSBY_SOURCE_GOOGLE_PHOTOS_TOKEN";

/// Env file used when the working directory has none
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Yields the raw JSON of a persisted bundle
pub trait CredentialSource: Send + Sync {
    /// Read the raw bundle, `None` when nothing is stored
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store exists but cannot be read.
    fn read(&self) -> Result<Option<String>>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn read(&self) -> Result<Option<String>> {
        Ok(self())
    }
}

/// Receives a newly acquired or refreshed bundle
pub trait CredentialSink: Send + Sync {
    /// Persist the bundle, returning the locations written
    ///
    /// # Errors
    ///
    /// Returns an error if any target cannot be written.
    fn store(&self, bundle: &CredentialBundle) -> Result<Vec<PathBuf>>;
}

/// Reads the bundle from the process environment, then from an env file
#[derive(Debug, Clone)]
pub struct EnvSource {
    var: String,
    fallback_vars: Vec<String>,
    env_file: Option<PathBuf>,
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR).with_fallback_var(LEGACY_TOKEN_ENV_VAR)
    }
}

impl EnvSource {
    /// Source for `var`, falling back to `./.env`
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            fallback_vars: Vec::new(),
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
        }
    }

    /// Also accept `var` when the primary variable is not set
    #[must_use]
    pub fn with_fallback_var(mut self, var: impl Into<String>) -> Self {
        self.fallback_vars.push(var.into());
        self
    }

    /// Use a different env file fallback
    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Only consult the process environment
    #[must_use]
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Variable name
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Primary variable first, then the fallbacks in registration order
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.var.as_str()).chain(self.fallback_vars.iter().map(String::as_str))
    }

    fn read_env_file(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(self.names().find_map(|var| last_assignment(&content, var)))
    }
}

impl CredentialSource for EnvSource {
    fn read(&self) -> Result<Option<String>> {
        for var in self.names() {
            match std::env::var(var) {
                Ok(value) => {
                    if var != self.var {
                        tracing::debug!(var, "Credential read from fallback variable");
                    }
                    return Ok(Some(value));
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(AuthError::invalid_token(format!("{var} is not valid unicode")));
                }
                Err(std::env::VarError::NotPresent) => {}
            }
        }

        match &self.env_file {
            Some(path) => {
                let value = self.read_env_file(path)?;
                if value.is_some() {
                    tracing::debug!(path = %path.display(), "Credential read from env file");
                }
                Ok(value)
            }
            None => Ok(None),
        }
    }
}

/// Value of the last `var=` line in env file content
fn last_assignment(content: &str, var: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            (key.trim() == var).then(|| unquote(value.trim()).to_string())
        })
        .last()
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Appends `VAR=<json>` to every env file of a directory.
///
/// Existing lines are never rewritten or deduplicated, so repeated runs leave
/// several assignments behind. Loaders take the last one.
#[derive(Debug, Clone)]
pub struct EnvFileSink {
    var: String,
    targets: Vec<PathBuf>,
}

impl EnvFileSink {
    /// Sink writing to explicit files
    pub fn new(var: impl Into<String>, targets: Vec<PathBuf>) -> Self {
        Self {
            var: var.into(),
            targets,
        }
    }

    /// Every file in `dir` whose name starts with `.env`, or `dir/.env` when
    /// there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed.
    pub fn discover(dir: impl AsRef<Path>, var: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut targets: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(DEFAULT_ENV_FILE))
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        targets.sort();

        if targets.is_empty() {
            targets.push(dir.join(DEFAULT_ENV_FILE));
        }
        tracing::debug!(count = targets.len(), "Discovered env file targets");

        Ok(Self::new(var, targets))
    }

    /// Files this sink appends to
    #[must_use]
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    fn append_line(path: &Path, line: &str) -> Result<()> {
        let mut options = OpenOptions::new();
        options.read(true).append(true).create(true);

        // New files hold secrets: user-only permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;

        // Keep a previous unterminated line intact
        let len = file.metadata()?.len();
        let mut separator = "";
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                separator = "\n";
            }
        }

        writeln!(file, "{separator}{line}")?;
        Ok(())
    }
}

impl CredentialSink for EnvFileSink {
    fn store(&self, bundle: &CredentialBundle) -> Result<Vec<PathBuf>> {
        let line = bundle.to_env_line(&self.var)?;
        for target in &self.targets {
            Self::append_line(target, &line)?;
            tracing::info!(path = %target.display(), "Credential appended");
        }
        Ok(self.targets.clone())
    }
}
