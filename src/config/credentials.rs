use crate::utils::error::{BatchError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const EARTHDATA_HOST: &str = "urs.earthdata.nasa.gov";
pub const USER_VAR: &str = "EARTHDATA_USER";
pub const PASS_VAR: &str = "EARTHDATA_PASS";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Environment first, then netrc.
    #[default]
    Auto,
    Env,
    Netrc,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Auto => "auto",
            CredentialSource::Env => "env",
            CredentialSource::Netrc => "netrc",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub source: CredentialSource,
    pub netrc_path: Option<PathBuf>,
}

impl CredentialsConfig {
    pub fn resolve(&self) -> Result<Credentials> {
        match self.source {
            CredentialSource::Env => from_env(),
            CredentialSource::Netrc => from_netrc(&self.netrc_location()?),
            CredentialSource::Auto => match from_env() {
                Ok(creds) => Ok(creds),
                Err(env_err) => {
                    tracing::debug!("{}, falling back to netrc", env_err);
                    let path = self.netrc_location()?;
                    from_netrc(&path)
                }
            },
        }
    }

    pub fn netrc_location(&self) -> Result<PathBuf> {
        if let Some(path) = &self.netrc_path {
            return Ok(path.clone());
        }
        if let Some(path) = std::env::var_os("NETRC") {
            return Ok(PathBuf::from(path));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".netrc"))
            .ok_or_else(|| BatchError::MissingCredentials {
                message: "HOME is not set and no netrc path was configured".to_string(),
            })
    }
}

pub fn from_env() -> Result<Credentials> {
    let user = std::env::var(USER_VAR).ok().filter(|v| !v.is_empty());
    let pass = std::env::var(PASS_VAR).ok().filter(|v| !v.is_empty());
    match (user, pass) {
        (Some(username), Some(password)) => Ok(Credentials { username, password }),
        _ => Err(BatchError::MissingCredentials {
            message: format!("{} and {} must both be set", USER_VAR, PASS_VAR),
        }),
    }
}

pub fn from_netrc(path: &Path) -> Result<Credentials> {
    let content = std::fs::read_to_string(path).map_err(|e| BatchError::MissingCredentials {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    parse_netrc(&content, EARTHDATA_HOST).ok_or_else(|| BatchError::MissingCredentials {
        message: format!("no entry for {} in {}", EARTHDATA_HOST, path.display()),
    })
}

/// Looks up `login`/`password` for `host`, falling back to a `default`
/// entry. `macdef` bodies are skipped.
pub fn parse_netrc(content: &str, host: &str) -> Option<Credentials> {
    let mut fallback: Option<Credentials> = None;
    let mut lines = content.lines();
    let mut tokens: Vec<&str> = Vec::new();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            continue;
        }
        for word in trimmed.split_whitespace() {
            if word == "macdef" {
                // Macro body runs until the next blank line.
                for body in lines.by_ref() {
                    if body.trim().is_empty() {
                        break;
                    }
                }
                break;
            }
            tokens.push(word);
        }
    }

    let mut i = 0;
    while i < tokens.len() {
        let (matches_host, is_default) = match tokens[i] {
            "machine" => {
                i += 1;
                (tokens.get(i).copied() == Some(host), false)
            }
            "default" => (false, true),
            _ => {
                i += 1;
                continue;
            }
        };
        i += 1;

        let mut login = None;
        let mut password = None;
        while i < tokens.len() && tokens[i] != "machine" && tokens[i] != "default" {
            match tokens[i] {
                "login" => login = tokens.get(i + 1).map(|s| s.to_string()),
                "password" => password = tokens.get(i + 1).map(|s| s.to_string()),
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        if let (Some(username), Some(password)) = (login, password) {
            let creds = Credentials { username, password };
            if matches_host {
                return Some(creds);
            }
            if is_default && fallback.is_none() {
                fallback = Some(creds);
            }
        }
    }

    fallback
}
