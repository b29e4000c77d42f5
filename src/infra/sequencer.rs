use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::config::ProvisioningConfig;
use super::error::{ProvisionError, StageError};
use super::stage::{STAGES, Stage};

/// Performs the work of a single stage.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, stage: Stage, config: &mut ProvisioningConfig) -> Result<(), StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState {
    Pending,
    Running(Stage),
    Completed,
    Failed { stage: Stage, error: StageError },
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequencerState::Completed | SequencerState::Failed { .. })
    }
}

/// Progress reported while the sequence runs.
#[derive(Debug, Clone)]
pub enum ProvisionEvent {
    StageStarted(Stage),
    StageSucceeded(Stage),
    StageFailed(Stage, String),
    Finished(Result<(), ProvisionError>),
}

/// Runs the stages in order, one at a time, stopping at the first failure.
pub struct Sequencer {
    state: SequencerState,
    stage_timeout: Option<Duration>,
    events: Option<mpsc::UnboundedSender<ProvisionEvent>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::Pending,
            stage_timeout: None,
            events: None,
        }
    }

    /// Bound each stage call individually; the sequence as a whole is unbounded.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ProvisionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    fn emit(&self, event: ProvisionEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    async fn execute_stage(
        &self,
        executor: &dyn StageExecutor,
        stage: Stage,
        config: &mut ProvisioningConfig,
    ) -> Result<(), StageError> {
        match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, executor.execute(stage, config))
                .await
                .unwrap_or(Err(StageError::TimedOut(limit))),
            None => executor.execute(stage, config).await,
        }
    }

    /// Execute the full sequence against `config`.
    ///
    /// A sequencer runs once; calling this again returns the earlier outcome
    /// without executing anything.
    pub async fn run(
        &mut self,
        executor: &dyn StageExecutor,
        config: &mut ProvisioningConfig,
    ) -> Result<(), ProvisionError> {
        match &self.state {
            SequencerState::Completed => return Ok(()),
            SequencerState::Failed { stage, error } => {
                return Err(ProvisionError::StageFailed {
                    stage: *stage,
                    cause: error.clone(),
                });
            }
            _ => {}
        }

        for descriptor in STAGES.iter() {
            let stage = descriptor.id;
            self.state = SequencerState::Running(stage);
            self.emit(ProvisionEvent::StageStarted(stage));
            info!(stage = stage.short_name(), "{}", descriptor.label);

            if let Err(cause) = self.execute_stage(executor, stage, config).await {
                error!(stage = stage.short_name(), "Stage failed: {cause}");
                self.state = SequencerState::Failed {
                    stage,
                    error: cause.clone(),
                };
                self.emit(ProvisionEvent::StageFailed(stage, cause.to_string()));

                let result = Err(ProvisionError::StageFailed { stage, cause });
                self.emit(ProvisionEvent::Finished(result.clone()));
                return result;
            }

            self.emit(ProvisionEvent::StageSucceeded(stage));
        }

        self.state = SequencerState::Completed;
        info!("Provisioning complete");
        self.emit(ProvisionEvent::Finished(Ok(())));
        Ok(())
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the sequence on a background task, streaming progress events.
///
/// The task hands the (now filled-in) config back when it finishes.
pub fn start_provisioning(
    executor: Arc<dyn StageExecutor>,
    mut config: ProvisioningConfig,
    stage_timeout: Option<Duration>,
) -> (mpsc::UnboundedReceiver<ProvisionEvent>, JoinHandle<ProvisioningConfig>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut sequencer = Sequencer::new()
            .with_stage_timeout(stage_timeout)
            .with_events(tx);
        // The outcome also travels as ProvisionEvent::Finished
        let _ = sequencer.run(executor.as_ref(), &mut config).await;
        config
    });

    (rx, handle)
}
