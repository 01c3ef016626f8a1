//! Configuration resolution: resource profiles, the settings overlay,
//! and the deployment-context (verb → paths) resolver.
//!
//! Precedence, highest wins: environment variable > TOML overlay >
//! resource profile default > hard-coded default.

pub mod profile;
pub mod runtime;
pub mod settings;

pub use profile::{LogLevel, ProfileDefaults, ResourceProfile};
pub use runtime::{Layer, ReadinessSignal, RuntimeContext, Verb};
pub use settings::{EncryptionMode, Settings, SettingsOverlay};

/// Recognised environment variables.
pub mod env_keys {
    pub const RESOURCE_PROFILE: &str = "MEMOGARDEN_RESOURCE_PROFILE";
    pub const BIND_ADDRESS: &str = "MEMOGARDEN_BIND_ADDRESS";
    pub const BIND_PORT: &str = "MEMOGARDEN_BIND_PORT";
    pub const LOG_LEVEL: &str = "MEMOGARDEN_LOG_LEVEL";
    pub const ENCRYPTION: &str = "MEMOGARDEN_ENCRYPTION";
    pub const DATA_DIR: &str = "MEMOGARDEN_DATA_DIR";
    pub const CONFIG_DIR: &str = "MEMOGARDEN_CONFIG_DIR";
    pub const LOG_DIR: &str = "MEMOGARDEN_LOG_DIR";
    pub const SOIL_DB: &str = "MEMOGARDEN_SOIL_DB";
    pub const CORE_DB: &str = "MEMOGARDEN_CORE_DB";
}

/// Environment access, abstracted so resolution is testable.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
