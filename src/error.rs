use thiserror::Error;

use crate::infra::ProvisionError;

#[derive(Error, Debug)]
pub enum ActlabsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Provisioning task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, ActlabsError>;
