//! Deployment-context resolver: the launch verb decides where the
//! databases, config, and logs live, and how readiness is signalled.

use std::path::{Path, PathBuf};

use crate::config::{env_keys, EnvSource};
use crate::errors::{GardenResult, MemoGardenError};

/// How the process was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// System service under systemd.
    Serve,
    /// Interactive run from a user account.
    Run,
    /// Containerised deployment.
    Deploy,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Serve => "serve",
            Verb::Run => "run",
            Verb::Deploy => "deploy",
        }
    }
}

impl std::str::FromStr for Verb {
    type Err = MemoGardenError;

    fn from_str(s: &str) -> GardenResult<Self> {
        match s {
            "serve" => Ok(Verb::Serve),
            "run" => Ok(Verb::Run),
            "deploy" => Ok(Verb::Deploy),
            other => Err(MemoGardenError::validation(format!(
                "unknown verb '{other}'"
            ))),
        }
    }
}

/// How readiness is reported once the kernel is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessSignal {
    /// sd_notify over the systemd protocol.
    Systemd,
    /// A readiness line on stdout.
    Stdout,
    /// Probed externally; nothing emitted.
    None,
}

/// The two database layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Soil,
    Core,
}

impl Layer {
    pub fn file_name(self) -> &'static str {
        match self {
            Layer::Soil => "soil.db",
            Layer::Core => "core.db",
        }
    }

    fn db_env_key(self) -> &'static str {
        match self {
            Layer::Soil => env_keys::SOIL_DB,
            Layer::Core => env_keys::CORE_DB,
        }
    }
}

/// Resolved process-wide paths and readiness behaviour. Set once at
/// startup; read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeContext {
    pub verb: Verb,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub signal: ReadinessSignal,
}

impl RuntimeContext {
    /// Resolve the context for a launch verb.
    ///
    /// An explicit `config_override` path sets `config_dir` to its
    /// parent; environment directory overrides beat verb defaults.
    pub fn resolve(
        verb: Verb,
        config_override: Option<&Path>,
        env: &dyn EnvSource,
    ) -> GardenResult<Self> {
        let (data_dir, config_dir, log_dir, signal) = match verb {
            Verb::Serve => (
                PathBuf::from("/var/lib/memogarden"),
                PathBuf::from("/etc/memogarden"),
                Some(PathBuf::from("/var/log/memogarden")),
                ReadinessSignal::Systemd,
            ),
            Verb::Run => {
                let home = env.var("HOME").ok_or_else(|| {
                    MemoGardenError::validation("HOME is not set; cannot resolve 'run' paths")
                })?;
                let home = PathBuf::from(home);
                (
                    home.join(".local/share/memogarden"),
                    home.join(".config/memogarden"),
                    Some(home.join(".local/state/memogarden/logs")),
                    ReadinessSignal::Stdout,
                )
            }
            Verb::Deploy => (
                PathBuf::from("/data"),
                PathBuf::from("/config"),
                None,
                ReadinessSignal::None,
            ),
        };

        let config_dir = match config_override {
            Some(path) => path.parent().map(Path::to_path_buf).unwrap_or(config_dir),
            None => match env.var(env_keys::CONFIG_DIR) {
                Some(dir) => PathBuf::from(dir),
                None => config_dir,
            },
        };
        let data_dir = match env.var(env_keys::DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => data_dir,
        };
        let log_dir = match env.var(env_keys::LOG_DIR) {
            Some(dir) => Some(PathBuf::from(dir)),
            None => log_dir,
        };

        Ok(Self {
            verb,
            data_dir,
            config_dir,
            log_dir,
            signal,
        })
    }

    /// Resolve a database file path for a layer.
    ///
    /// Precedence: the layer's `_DB` variable, then `DATA_DIR` +
    /// `<layer>.db`, then the verb default + `<layer>.db`.
    pub fn db_path(&self, layer: Layer, env: &dyn EnvSource) -> PathBuf {
        if let Some(path) = env.var(layer.db_env_key()) {
            return PathBuf::from(path);
        }
        if let Some(dir) = env.var(env_keys::DATA_DIR) {
            return PathBuf::from(dir).join(layer.file_name());
        }
        self.data_dir.join(layer.file_name())
    }
}
