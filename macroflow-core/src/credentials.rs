//! Layered API-key discovery.
//!
//! A provider credential is looked up from an ordered list of sources and the
//! first usable candidate wins:
//!
//! 1. an explicit key passed on the command line
//! 2. an explicit key file
//! 3. the provider's environment variable
//! 4. `.env` files in the search directories
//! 5. fallback key files (override variable, `secrets/`, search directories)
//!
//! The default search directories are the current directory, then the
//! project root (see [`project_root_from`]).
//!
//! Candidates from files are normalized to lowercase `[a-z0-9]` and must reach
//! the provider's key length; they are truncated to it. An explicit key is
//! normalized and truncated but never length-checked.
//!
//! The environment is injected through [`EnvLookup`] and resolved credentials
//! are handed to client constructors. Nothing here writes to the process
//! environment.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum CredentialError {
    #[error("{name} not set: no usable key in CLI arguments, key files, environment, or .env files")]
    Missing { name: String },
}

/// Read-only view of environment variables.
pub trait EnvLookup {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Where and how to look for one provider's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialSpec {
    /// Environment variable holding the key (also the `.env` key).
    pub env_var: &'static str,
    /// Environment variable naming an override key file.
    pub file_env_var: &'static str,
    /// Stem of the default key files (`<stem>.txt`).
    pub file_stem: &'static str,
    /// Canonical key length after normalization.
    pub key_len: usize,
}

impl CredentialSpec {
    pub const FRED: CredentialSpec = CredentialSpec {
        env_var: "FRED_API_KEY",
        file_env_var: "FRED_API_KEY_FILE",
        file_stem: "fred_api_key",
        key_len: 32,
    };

    pub const TUSHARE: CredentialSpec = CredentialSpec {
        env_var: "TUSHARE_TOKEN",
        file_env_var: "TUSHARE_TOKEN_FILE",
        file_stem: "tushare_token",
        key_len: 56,
    };
}

/// Which source produced a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Literal,
    KeyFile(PathBuf),
    Environment(String),
    DotEnv(PathBuf),
    FallbackFile(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Literal => write!(f, "command-line key"),
            CredentialSource::KeyFile(p) => write!(f, "key file {}", p.display()),
            CredentialSource::Environment(v) => write!(f, "environment variable {v}"),
            CredentialSource::DotEnv(p) => write!(f, ".env file {}", p.display()),
            CredentialSource::FallbackFile(p) => write!(f, "fallback key file {}", p.display()),
        }
    }
}

/// A resolved secret. `Debug` never prints the secret itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
    source: CredentialSource,
}

impl Credential {
    pub fn new(secret: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            secret: secret.into(),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"<redacted>")
            .field("len", &self.secret.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Lowercase, then keep only ASCII letters and digits.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn truncate(mut s: String, len: usize) -> String {
    // normalized strings are ASCII, so byte and char boundaries agree
    s.truncate(len);
    s
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Candidate from one line of a key file: the text after the first `=`,
/// unquoted and normalized, if it reaches `key_len`.
pub fn key_file_candidate(line: &str, key_len: usize) -> Option<String> {
    let s = line.trim();
    if s.is_empty() {
        return None;
    }
    let value = match s.split_once('=') {
        Some((_, v)) => v,
        None => s,
    };
    let norm = normalize(unquote(value));
    (norm.len() >= key_len).then(|| truncate(norm, key_len))
}

fn letters_lower(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Nearest ancestor of the executable's directory holding a `Cargo.toml`,
/// else the parent of that directory.
///
/// `target/release/macroflow` resolves to the workspace, and an installed
/// `<prefix>/bin/macroflow` to `<prefix>`.
pub fn project_root_from(exe: &Path) -> Option<PathBuf> {
    let bin_dir = exe.parent()?;
    bin_dir
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").is_file())
        .or_else(|| bin_dir.parent())
        .map(Path::to_path_buf)
}

/// Current directory, then the project root of the running executable.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))];
    if let Some(root) = std::env::current_exe()
        .ok()
        .and_then(|exe| project_root_from(&exe))
    {
        dirs.push(root);
    }
    dirs
}

/// One place to look, in resolution order.
#[derive(Debug, Clone, PartialEq)]
enum Probe {
    Literal(String),
    KeyFile(PathBuf),
    Environment,
    DotEnv(PathBuf),
    FallbackFile(PathBuf),
}

/// Resolves one provider's credential from the layered sources.
pub struct CredentialResolver<'a> {
    spec: CredentialSpec,
    env: &'a dyn EnvLookup,
    explicit_key: Option<String>,
    explicit_file: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
}

impl<'a> CredentialResolver<'a> {
    /// Resolver over [`default_search_dirs`].
    pub fn new(spec: CredentialSpec, env: &'a dyn EnvLookup) -> Self {
        Self {
            spec,
            env,
            explicit_key: None,
            explicit_file: None,
            search_dirs: Vec::new(),
        }
        .with_search_dirs(default_search_dirs())
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.explicit_key = key;
        self
    }

    pub fn with_key_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Directories scanned for `.env` and `<stem>.txt`. The first one also
    /// anchors `secrets/<stem>.txt`.
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::new();
        for d in dirs {
            if !unique.contains(&d) {
                unique.push(d);
            }
        }
        self.search_dirs = unique;
        self
    }

    pub fn spec(&self) -> CredentialSpec {
        self.spec
    }

    fn probes(&self) -> Vec<Probe> {
        let mut probes = Vec::new();
        if let Some(key) = self.explicit_key.as_ref().filter(|k| !k.trim().is_empty()) {
            probes.push(Probe::Literal(key.clone()));
        }
        if let Some(path) = &self.explicit_file {
            probes.push(Probe::KeyFile(path.clone()));
        }
        probes.push(Probe::Environment);
        for dir in &self.search_dirs {
            probes.push(Probe::DotEnv(dir.join(".env")));
        }

        let file_name = format!("{}.txt", self.spec.file_stem);
        if let Some(path) = self.env.var(self.spec.file_env_var) {
            let path = unquote(&path);
            if !path.is_empty() {
                probes.push(Probe::FallbackFile(PathBuf::from(path)));
            }
        }
        if let Some(first) = self.search_dirs.first() {
            probes.push(Probe::FallbackFile(first.join("secrets").join(&file_name)));
        }
        for dir in &self.search_dirs {
            probes.push(Probe::FallbackFile(dir.join(&file_name)));
        }
        probes
    }

    fn probe(&self, probe: Probe) -> Option<Credential> {
        let key_len = self.spec.key_len;
        match probe {
            Probe::Literal(raw) => Some(Credential::new(
                truncate(normalize(&raw), key_len),
                CredentialSource::Literal,
            )),
            Probe::KeyFile(path) => scan_key_file(&path, key_len)
                .map(|k| Credential::new(k, CredentialSource::KeyFile(path))),
            Probe::Environment => {
                let raw = self.env.var(self.spec.env_var)?;
                let value = unquote(&raw);
                (!value.is_empty()).then(|| {
                    Credential::new(
                        value,
                        CredentialSource::Environment(self.spec.env_var.to_string()),
                    )
                })
            }
            Probe::DotEnv(path) => scan_dotenv(&path, self.spec.env_var, key_len)
                .map(|k| Credential::new(k, CredentialSource::DotEnv(path))),
            Probe::FallbackFile(path) => scan_key_file(&path, key_len)
                .map(|k| Credential::new(k, CredentialSource::FallbackFile(path))),
        }
    }

    /// First usable credential, or [`CredentialError::Missing`].
    pub fn resolve(&self) -> Result<Credential, CredentialError> {
        let found = self.probes().into_iter().find_map(|p| {
            debug!(
                provider = self.spec.env_var,
                probe = %probe_label(&p),
                "probing credential source"
            );
            self.probe(p)
        });
        match found {
            Some(cred) => {
                info!(provider = self.spec.env_var, source = %cred.source(), "credential resolved");
                Ok(cred)
            }
            None => Err(CredentialError::Missing {
                name: self.spec.env_var.to_string(),
            }),
        }
    }
}

// Probe kinds for logging without leaking a literal key.
fn probe_label(p: &Probe) -> String {
    match p {
        Probe::Literal(_) => "literal".into(),
        Probe::KeyFile(path) => format!("key_file:{}", path.display()),
        Probe::Environment => "environment".into(),
        Probe::DotEnv(path) => format!("dotenv:{}", path.display()),
        Probe::FallbackFile(path) => format!("fallback:{}", path.display()),
    }
}

fn scan_key_file(path: &Path, key_len: usize) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .find_map(|line| key_file_candidate(line, key_len))
}

fn dotenv_value(value: &str, key_len: usize) -> Option<String> {
    let norm = normalize(value);
    (norm.len() >= key_len).then(|| truncate(norm, key_len))
}

// Keys such as `FRED-API-KEY` or `fred api key` are outside dotenvy's
// grammar, so lines it rejects are also read as plain `key=value`.
fn scan_dotenv(path: &Path, env_var: &str, key_len: usize) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let target = letters_lower(env_var);

    let parsed = dotenvy::from_path_iter(path)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|(k, _)| letters_lower(k) == target)
        .find_map(|(_, v)| dotenv_value(&v, key_len));
    if parsed.is_some() {
        return parsed;
    }

    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(k, _)| letters_lower(k) == target)
        .find_map(|(_, v)| dotenv_value(unquote(v), key_len))
}
