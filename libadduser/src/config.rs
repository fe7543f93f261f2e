// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing;

/// The configuration directory read when no path is given on the command
/// line. It holds `add-user.toml` and the `add-user.d` drop-ins.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/add-user";

/// The roster location used when no configuration overrides it.
pub const DEFAULT_ROSTER_URL: &str =
    "https://nextcloud.example.com/s/roster/download/Pub-keys-users.txt";

/// The file the roster is downloaded to, relative to the working directory.
pub const DEFAULT_ROSTER_PATH: &str = "Pub-keys-users.txt";

/// The password assigned to every account created by `add-user`, unless
/// `password.default_password` overrides it.
pub const DEFAULT_PASSWORD: &str = "1234qwer!";

/// How a roster line is matched against the requested username.
#[derive(Default, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The username may appear anywhere in the line, so `bob` also matches
    /// a line for `bobby`.
    #[default]
    Substring,
    /// The first field of the line must equal the username.
    Username,
}

#[derive(Default, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserProvisioner {
    #[default]
    Useradd,
    Adduser,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Roster {
    pub url: String,
    pub local_path: PathBuf,
    /// Skip TLS certificate and hostname verification when downloading.
    /// Enabled by default.
    pub accept_invalid_certs: bool,
    pub match_mode: MatchMode,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            url: DEFAULT_ROSTER_URL.to_string(),
            local_path: PathBuf::from(DEFAULT_ROSTER_PATH),
            accept_invalid_certs: true,
            match_mode: MatchMode::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserProvisioners {
    pub backends: Vec<UserProvisioner>,
}

impl Default for UserProvisioners {
    fn default() -> Self {
        Self {
            backends: vec![UserProvisioner::Useradd, UserProvisioner::Adduser],
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Password {
    pub default_password: String,
}

impl Default for Password {
    fn default() -> Self {
        Self {
            default_password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("default_password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Ssh {
    /// Directory holding the home directories; the key lands in
    /// `<home_base>/<username>/.ssh/authorized_keys`.
    pub home_base: PathBuf,
}

impl Default for Ssh {
    fn default() -> Self {
        Self {
            home_base: PathBuf::from("/home"),
        }
    }
}

#[derive(Default, Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Log {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Default, Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub roster: Roster,
    pub user_provisioners: UserProvisioners,
    pub password: Password,
    pub ssh: Ssh,
    pub log: Log,
}

impl Config {
    /// Load the configuration.
    ///
    /// With no explicit path, [`DEFAULT_CONFIG_DIR`] is read as a directory
    /// when it exists and the built-in defaults are used otherwise. A
    /// directory is read as `add-user.toml` followed by every
    /// `add-user.d/*.toml` in lexical order.
    pub fn load(cli_overrides: Option<PathBuf>) -> Result<Config, Error> {
        let config = match cli_overrides {
            Some(path) if path.is_dir() => Self::load_from_directory(path)?,
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_from_default_dir(Path::new(DEFAULT_CONFIG_DIR))?,
        };

        tracing::info!(target: "libadduser::config::success", ?config, "Configuration loaded");
        Ok(config)
    }

    fn load_from_default_dir(dir: &Path) -> Result<Config, Error> {
        if !dir.is_dir() {
            tracing::debug!("No configuration at {}; using defaults", dir.display());
            return Ok(Config::default());
        }

        Self::load_from_directory(dir.to_path_buf())
    }

    fn load_from_file(file_path: PathBuf) -> Result<Config, Error> {
        let content =
            fs::read_to_string(&file_path).map_err(|e| Error::Config {
                path: file_path.clone(),
                details: e.to_string(),
            })?;
        toml::from_str::<Config>(&content).map_err(|e| {
            tracing::error!("Failed to parse configuration file: {:?}", e);
            Error::Config {
                path: file_path,
                details: e.to_string(),
            }
        })
    }

    fn load_from_directory(dir: PathBuf) -> Result<Config, Error> {
        let mut config = Config::default();

        let base_config_path = dir.join("add-user.toml");
        if base_config_path.exists() {
            config = Self::load_from_file(base_config_path)?;
        }

        let d_dir = dir.join("add-user.d");
        if d_dir.is_dir() {
            let entries = fs::read_dir(&d_dir).map_err(|e| Error::Config {
                path: d_dir.clone(),
                details: e.to_string(),
            })?;
            let mut toml_files: Vec<_> = entries
                .filter_map(|entry| {
                    let entry = entry.ok()?;
                    let path = entry.path();
                    if path.extension()?.to_str()? == "toml" {
                        Some(path)
                    } else {
                        None
                    }
                })
                .collect();

            toml_files.sort();

            for file_path in toml_files {
                let content =
                    fs::read_to_string(&file_path).map_err(|e| Error::Config {
                        path: file_path.clone(),
                        details: e.to_string(),
                    })?;
                config = config.merge(&file_path, &content)?;
            }
        }

        Ok(config)
    }

    /// Apply a drop-in on top of this configuration. Only the keys the
    /// drop-in sets are replaced.
    fn merge(self, path: &Path, content: &str) -> Result<Config, Error> {
        let parse_error = |details: String| Error::Config {
            path: path.to_path_buf(),
            details,
        };

        let mut base = toml::Value::try_from(&self)
            .map_err(|e| parse_error(e.to_string()))?;
        let overlay: toml::Table =
            toml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        merge_values(&mut base, toml::Value::Table(overlay));

        base.try_into().map_err(|e: toml::de::Error| parse_error(e.to_string()))
    }
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
