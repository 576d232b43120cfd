//! At-rest variable files: one `KEY=VALUE` file per bundle, owner-only permissions.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use skillgraph_core::{Error, Result};

/// What the execution core needs from the at-rest store.
pub trait BundleStore: Send + Sync {
    fn exists(&self, bundle_id: &str) -> bool;

    /// Every value of the bundle, public and secret.
    fn read_all(&self, bundle_id: &str) -> Result<BTreeMap<String, String>>;

    /// Write `variables` to a uniquely named owner-only file. The file is removed when the
    /// returned handle drops.
    fn write_scratch(&self, variables: &BTreeMap<String, String>, prefix: &str) -> Result<TempPath>;
}

/// Bundle files under one directory, named `{bundle_id}.env`.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    env_dir: PathBuf,
}

impl EnvFileStore {
    pub fn new(env_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    pub fn path_for(&self, bundle_id: &str) -> Result<PathBuf> {
        if bundle_id.is_empty()
            || bundle_id.contains(|c: char| c == '/' || c == '\\')
            || bundle_id.starts_with('.')
        {
            return Err(Error::Validation(format!("invalid bundle id '{}'", bundle_id)));
        }
        Ok(self.env_dir.join(format!("{}.env", bundle_id)))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.env_dir).map_err(|e| Error::EnvFile {
            bundle: self.env_dir.display().to_string(),
            message: format!("cannot create directory: {}", e),
        })
    }

    /// Replace the bundle's file with `variables`.
    pub fn write(&self, bundle_id: &str, variables: &BTreeMap<String, String>) -> Result<PathBuf> {
        let path = self.path_for(bundle_id)?;
        self.ensure_dir()?;
        let to_err = |e: std::io::Error| Error::EnvFile {
            bundle: bundle_id.to_string(),
            message: e.to_string(),
        };

        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut opts, 0o600);
        let mut file = opts.open(&path).map_err(to_err)?;
        file.write_all(format_env(variables).as_bytes()).map_err(to_err)?;
        file.sync_all().map_err(to_err)?;
        restrict_permissions(&path).map_err(to_err)?;

        tracing::debug!(bundle = bundle_id, keys = variables.len(), "wrote env file");
        Ok(path)
    }

    /// Remove the bundle's file. Returns false when there was nothing to remove.
    pub fn delete(&self, bundle_id: &str) -> Result<bool> {
        let path = self.path_for(bundle_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::EnvFile {
                bundle: bundle_id.to_string(),
                message: e.to_string(),
            }),
        }
    }

    pub fn load_file(path: &Path) -> Result<BTreeMap<String, String>> {
        let content = fs::read_to_string(path).map_err(|e| Error::EnvFile {
            bundle: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(parse_env(&content))
    }
}

impl BundleStore for EnvFileStore {
    fn exists(&self, bundle_id: &str) -> bool {
        self.path_for(bundle_id).map_or(false, |p| p.is_file())
    }

    fn read_all(&self, bundle_id: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path_for(bundle_id)?;
        if !path.is_file() {
            return Err(Error::EnvFile {
                bundle: bundle_id.to_string(),
                message: "env file not found".to_string(),
            });
        }
        Self::load_file(&path)
    }

    fn write_scratch(&self, variables: &BTreeMap<String, String>, prefix: &str) -> Result<TempPath> {
        self.ensure_dir()?;
        let to_err = |e: std::io::Error| Error::EnvFile {
            bundle: prefix.to_string(),
            message: format!("cannot write scratch env file: {}", e),
        };
        // tempfile creates the file with mode 0600 on unix.
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".env")
            .tempfile_in(&self.env_dir)
            .map_err(to_err)?;
        file.write_all(format_env(variables).as_bytes()).map_err(to_err)?;
        file.flush().map_err(to_err)?;
        Ok(file.into_temp_path())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value != value.trim()
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '\n' | '\r' | '\t' | '#' | '$' | '"' | '\'' | '\\'))
}

fn escape_value(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn unescape_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    if !(raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"')) {
        return raw.to_string();
    }
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Serialize as sorted `KEY=VALUE` lines.
pub fn format_env(variables: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in variables {
        out.push_str(key);
        out.push('=');
        out.push_str(&escape_value(value));
        out.push('\n');
    }
    out
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are ignored.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!(line = lineno + 1, "skipping env line without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unescape_value(value.trim()));
    }
    vars
}
