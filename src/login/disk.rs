//! Token cache stored as one JSON file per tool and client.

use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::config::OidcConfig;
use super::token::{Token, TokenCache};

/// Default directory for cached tokens. Environment variables are expanded.
pub const DEFAULT_TOKEN_CACHE_PATH: &str = "$HOME/.oidc_keys";

/// Stores the token under `<dir>/token_<tool>_<client_id>`.
///
/// Nothing cleans up files left behind after a client id change.
pub struct DiskTokenCache {
    store_path: PathBuf,
    config: OidcConfig,
}

impl DiskTokenCache {
    pub fn new(config: OidcConfig, path: &str) -> Self {
        Self {
            store_path: PathBuf::from(expand_env(path)),
            config,
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    fn store_dir(&self) -> Result<&Path> {
        create_private_dir(&self.store_path)
            .with_context(|| format!("Failed to create store dir: {:?}", self.store_path))?;
        Ok(&self.store_path)
    }

    fn file_name(&self) -> String {
        format!("token_{}_{}", tool_name(), self.config.client_id)
    }
}

impl TokenCache for DiskTokenCache {
    fn token(&self) -> Result<Option<Token>> {
        let path = self.store_dir()?.join(self.file_name());

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "No cached token");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read cached token: {:?}", path))
            }
        };

        let token = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to decode cached token: {:?}", path))?;
        Ok(Some(token))
    }

    fn save_token(&self, token: &Token) -> Result<()> {
        let path = self.store_dir()?.join(self.file_name());
        let bytes = serde_json::to_vec(token).context("Failed to encode token")?;

        write_private_file(&path, &bytes)
            .with_context(|| format!("Failed caching token: {:?}", path))?;
        debug!(path = ?path, "Cached token written");
        Ok(())
    }

    fn config(&self) -> OidcConfig {
        self.config.clone()
    }
}

/// Name of the running tool, used to keep caches of different tools apart.
fn tool_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::File::create(path)?.write_all(bytes)
}

/// Replace `$VAR` and `${VAR}` with values from the environment.
/// Unset variables expand to nothing.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &input[i + 1..];
        let (name, consumed) = if let Some(braced) = rest.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => {
                    out.push(c);
                    continue;
                }
            }
        } else {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };
        if name.is_empty() {
            out.push(c);
            continue;
        }
        out.push_str(&std::env::var(name).unwrap_or_default());
        while chars.next_if(|(j, _)| *j <= i + consumed).is_some() {}
    }
    out
}
