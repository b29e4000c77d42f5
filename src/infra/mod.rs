//! Provisioning core: configuration resolution, identity and authorization
//! checks, and the stage sequencer that creates the ACTLabs infrastructure.

pub mod arm;
pub mod authz;
pub mod config;
pub mod credential;
mod error;
pub mod graph;
pub mod local;
pub mod resolver;
pub mod resources;
pub mod sequencer;
pub mod service;
mod stage;

pub use config::{Endpoints, LocalDeployment, ProvisioningConfig};
pub use error::{
    AuthorizationError, CredentialError, IdentityError, LocalRuntimeError, ProvisionError,
    RemoteError, ResolveError, StageError,
};
pub use sequencer::{ProvisionEvent, Sequencer, SequencerState, StageExecutor, start_provisioning};
pub use service::{AzureStages, DryrunStages, create_executor};
pub use stage::{STAGES, Stage, StageDescriptor};
