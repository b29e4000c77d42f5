use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::infra::config::{
    AUTHORITY_ENDPOINT, DEFAULT_LOCATION, DEFAULT_RESOURCE_GROUP, GRAPH_ENDPOINT,
    RESOURCE_MANAGER_ENDPOINT,
};
use crate::infra::{Endpoints, LocalDeployment};

/// `~/.config/actlabs/config.toml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("actlabs").join("config.toml"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub azure: AzureSettings,
    pub endpoints: EndpointSettings,
    pub local: LocalSettings,
}

impl Settings {
    /// Load from the default location; defaults when there is no file.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(settings)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            resource_manager: self.endpoints.resource_manager.clone(),
            graph: self.endpoints.graph.clone(),
            authority: self.endpoints.authority.clone(),
        }
    }

    pub fn local_deployment(&self) -> LocalDeployment {
        LocalDeployment {
            image: self.local.image.clone(),
            container_name: self.local.container_name.clone(),
            host_port: self.local.host_port,
            container_port: self.local.container_port,
            health_path: self.local.health_path.clone(),
            verify_attempts: self.local.verify_attempts,
        }
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.general
            .stage_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Simulate every stage instead of calling Azure and Docker
    pub dryrun: bool,
    /// Upper bound for a single stage; unset or 0 means no limit
    pub stage_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub resource_group: String,
    pub location: String,
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub storage_account: Option<String>,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            resource_group: DEFAULT_RESOURCE_GROUP.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            tenant_id: None,
            subscription_id: None,
            storage_account: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub resource_manager: String,
    pub graph: String,
    pub authority: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            resource_manager: RESOURCE_MANAGER_ENDPOINT.to_string(),
            graph: GRAPH_ENDPOINT.to_string(),
            authority: AUTHORITY_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    pub image: String,
    pub container_name: String,
    pub host_port: u16,
    pub container_port: u16,
    pub health_path: String,
    pub verify_attempts: u32,
}

impl Default for LocalSettings {
    fn default() -> Self {
        let local = LocalDeployment::default();
        Self {
            image: local.image,
            container_name: local.container_name,
            host_port: local.host_port,
            container_port: local.container_port,
            health_path: local.health_path,
            verify_attempts: local.verify_attempts,
        }
    }
}
