//! INI configuration file.
//!
//! ```ini
//! [roots]
//! paths = t/data, t/data2
//!
//! [namespaces]
//! z = t/ns
//!
//! [local]
//! my_dir = t/user_dir
//!
//! [http]
//! etag_ttl_secs = 3600
//! listen = 127.0.0.1:8080
//!
//! [logging]
//! level = info
//! directory = /var/log/assetfs
//! ```
//!
//! Relative paths are used as written (relative to the working directory).

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::error::AssetResult;
use crate::http::{HandlerConfig, DEFAULT_ETAG_TTL};
use crate::local::SourceDir;
use crate::logging::LoggingConfig;
use crate::namespace::AssetFs;

/// Default listen address for `serve`.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub etag_ttl: Duration,
    pub listen: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            etag_ttl: DEFAULT_ETAG_TTL,
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl HttpSettings {
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig::default().with_etag_ttl(self.etag_ttl)
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Roots of the top-level namespace, in registration order.
    pub roots: Vec<PathBuf>,
    /// Namespace name and its roots, in file order.
    pub namespaces: Vec<(String, Vec<PathBuf>)>,
    /// Local source name and directory, in file order.
    pub local_sources: Vec<(String, PathBuf)>,
    pub http: HttpSettings,
    pub logging: LoggingConfig,
}

fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl ConfigFile {
    /// `~/.assetfs/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".assetfs").join("config.ini"))
    }

    /// Load the default file; a missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ini(&ini)?;
        tracing::debug!(path = %path.display(), roots = config.roots.len(), "Loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Self::from_ini(&Ini::load_from_str(text)?)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        if let Some(section) = ini.section(Some("roots")) {
            if let Some(paths) = section.get("paths") {
                config.roots = split_paths(paths);
            }
        }

        if let Some(section) = ini.section(Some("namespaces")) {
            for (name, paths) in section.iter() {
                config
                    .namespaces
                    .push((name.to_string(), split_paths(paths)));
            }
        }

        if let Some(section) = ini.section(Some("local")) {
            for (name, dir) in section.iter() {
                config
                    .local_sources
                    .push((name.to_string(), PathBuf::from(dir.trim())));
            }
        }

        if let Some(section) = ini.section(Some("http")) {
            if let Some(value) = section.get("etag_ttl_secs") {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "http.etag_ttl_secs".to_string(),
                    value: value.to_string(),
                })?;
                config.http.etag_ttl = Duration::from_secs(secs);
            }
            if let Some(listen) = section.get("listen") {
                config.http.listen = listen.trim().to_string();
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = section.get("level") {
                config.logging.level = level.trim().to_string();
            }
            if let Some(directory) = section.get("directory") {
                config.logging.directory = Some(PathBuf::from(directory.trim()));
            }
        }

        Ok(config)
    }

    /// Build the namespace tree this file describes.
    pub fn build_fs(&self) -> AssetResult<AssetFs> {
        let fs = AssetFs::new();
        for (name, dir) in &self.local_sources {
            fs.local_sources().register(name.clone(), SourceDir::new(dir));
        }
        for root in &self.roots {
            fs.register_path(root)?;
        }
        for (name, roots) in &self.namespaces {
            let ns = fs.namespace(name);
            for root in roots {
                ns.register_path(root)?;
            }
        }
        Ok(fs)
    }
}
