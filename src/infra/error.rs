use std::time::Duration;

use thiserror::Error;

use super::stage::Stage;

/// Failure to fill in tenant/subscription from the local `az` session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Azure CLI unavailable: {0}")]
    ExternalToolUnavailable(String),

    #[error("unexpected 'az account show' output: {0}")]
    MalformedResponse(String),
}

/// Every link of the credential chain failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no credential source succeeded: {}", .attempts.join("; "))]
pub struct CredentialError {
    pub attempts: Vec<String>,
}

impl CredentialError {
    pub fn single(reason: impl Into<String>) -> Self {
        Self {
            attempts: vec![reason.into()],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error(
        "{principal} does not hold the Owner role on subscription {subscription_id}. \
         Ask a subscription administrator to grant you Owner, then run setup again."
    )]
    InsufficientPermissions {
        principal: String,
        subscription_id: String,
    },

    #[error("unable to list role assignments: {0}")]
    CheckFailed(String),
}

/// Failure to find out who the operator is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no token for the directory: {0}")]
    Credential(#[from] CredentialError),

    #[error("directory request failed: {0}")]
    Transport(String),

    #[error("directory returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid directory response: {0}")]
    Decode(String),

    #[error("directory response is missing '{0}'")]
    MissingField(&'static str),

    #[error("operator principal is unknown")]
    UnknownPrincipal,
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IdentityError::Decode(err.to_string())
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

/// Failure running or checking the local server container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalRuntimeError {
    #[error("failed to run '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("container '{container}' is not serving {url} after {attempts} attempts")]
    NotHealthy {
        container: String,
        url: String,
        attempts: u32,
    },
}

/// Error returned by a remote management call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_conflict(&self, code: &str) -> bool {
        matches!(self, RemoteError::Api { status: 409, code: c, .. } if c == code)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Cause carried by a failed stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error(transparent)]
    ConfigResolution(#[from] ResolveError),

    #[error("credential acquisition failed: {0}")]
    CredentialAcquisition(#[from] CredentialError),

    #[error("identity resolution failed: {0}")]
    IdentityResolution(#[from] IdentityError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("local deployment: {0}")]
    Local(#[from] LocalRuntimeError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("{} failed: {cause}", .stage.short_name())]
    StageFailed {
        stage: Stage,
        #[source]
        cause: StageError,
    },
}

impl ProvisionError {
    pub fn stage(&self) -> Stage {
        match self {
            ProvisionError::StageFailed { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_timeout_keeps_its_unit() {
        let err = StageError::TimedOut(Duration::from_millis(250));
        assert_eq!(err.to_string(), "timed out after 250ms");

        let err = StageError::TimedOut(Duration::from_secs(90));
        assert_eq!(err.to_string(), "timed out after 90s");
    }

    #[test]
    fn collaborator_errors_convert_into_stage_errors() {
        let err: StageError = IdentityError::MissingField("id").into();
        assert_eq!(err.to_string(), "identity resolution failed: directory response is missing 'id'");

        let err: StageError = LocalRuntimeError::NotHealthy {
            container: "actlabs-server".to_string(),
            url: "http://127.0.0.1:8880/status".to_string(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, StageError::Local(LocalRuntimeError::NotHealthy { attempts: 3, .. })));
    }
}
