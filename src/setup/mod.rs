//! The `setup --interactive` wizard: a three-field form, then a live view of
//! the provisioning stages.

mod form;
mod input;
mod status_bar;
pub mod ui;

pub use form::{FieldId, FormEvent, FormField, FormOutcome, WizardForm};
pub use input::InputBuffer;
pub use status_bar::StatusBarState;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::infra::{ProvisionError, ProvisionEvent, ProvisioningConfig, STAGES, Stage};
use crate::ui::Theme;

/// Actions the main loop carries out for the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupAction {
    /// Form submitted; run the stages against this config
    StartProvisioning(ProvisioningConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Form,
    Provisioning,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

pub struct Message {
    pub text: String,
    pub is_error: bool,
}

pub struct SetupApp {
    pub theme: Theme,
    pub form: WizardForm,
    pub phase: Phase,
    /// Indexed like `STAGES`
    pub stages: Vec<StageStatus>,
    pub message: Option<Message>,
    pub status_bar: StatusBarState,
    pub dryrun: bool,
    pub should_exit: bool,

    base: ProvisioningConfig,
    outcome: Option<Result<(), ProvisionError>>,
    aborted: bool,
    spinner_frame: usize,
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

impl SetupApp {
    pub fn new(base: ProvisioningConfig, dryrun: bool) -> Self {
        Self {
            theme: Theme::default(),
            form: WizardForm::new(&base),
            phase: Phase::Form,
            stages: vec![StageStatus::Pending; STAGES.len()],
            message: None,
            status_bar: StatusBarState::editing_field(),
            dryrun,
            should_exit: false,
            base,
            outcome: None,
            aborted: false,
            spinner_frame: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SetupAction> {
        match self.phase {
            Phase::Form => self.handle_form_key(key),
            Phase::Provisioning => {
                if is_ctrl_c(&key) {
                    self.set_info("Provisioning has started and cannot be interrupted".to_string());
                }
                None
            }
            Phase::Finished => {
                self.should_exit = true;
                None
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Option<SetupAction> {
        self.message = None;

        let event = match key.code {
            KeyCode::Esc => Some(FormEvent::Cancel),
            _ if is_ctrl_c(&key) => Some(FormEvent::Cancel),
            KeyCode::Tab | KeyCode::Down => Some(FormEvent::Next),
            KeyCode::BackTab | KeyCode::Up => Some(FormEvent::Previous),
            KeyCode::Enter if self.form.is_submit_focused() => Some(FormEvent::Submit),
            KeyCode::Enter => Some(FormEvent::Next),
            _ => {
                if let Some(field) = self.form.focused_field_mut() {
                    field.input.handle_key(key);
                }
                None
            }
        };

        let outcome = match event {
            Some(event) => self.form.apply(event),
            None => FormOutcome::Editing,
        };

        match outcome {
            FormOutcome::Editing => {
                self.update_status_bar();
                None
            }
            FormOutcome::Cancelled => {
                info!("Setup cancelled before provisioning");
                self.should_exit = true;
                None
            }
            FormOutcome::Submitted => {
                let config = self.form.apply_to(&self.base);
                info!(
                    location = %config.location,
                    resource_group = %config.resource_group_name,
                    "Setup form submitted"
                );
                self.phase = Phase::Provisioning;
                self.update_status_bar();
                Some(SetupAction::StartProvisioning(config))
            }
        }
    }

    pub fn handle_provision_event(&mut self, event: ProvisionEvent) {
        match event {
            ProvisionEvent::StageStarted(stage) => self.set_stage(stage, StageStatus::Running),
            ProvisionEvent::StageSucceeded(stage) => self.set_stage(stage, StageStatus::Succeeded),
            ProvisionEvent::StageFailed(stage, reason) => {
                self.set_stage(stage, StageStatus::Failed);
                warn!(stage = stage.short_name(), "{reason}");
            }
            ProvisionEvent::Finished(result) => {
                match &result {
                    Ok(()) => self.set_info(format!(
                        "ACTLabs is ready at {}. Press any key to exit.",
                        self.base.local.health_url()
                    )),
                    Err(e) => self.set_error(e.to_string()),
                }
                self.outcome = Some(result);
                self.phase = Phase::Finished;
                self.update_status_bar();
            }
        }
    }

    /// The progress channel closed. Without a `Finished` event first, the run
    /// died (e.g. the task panicked); show that and let any key exit.
    pub fn progress_closed(&mut self) {
        if self.phase != Phase::Provisioning {
            return;
        }
        warn!("Provisioning ended without reporting a result");
        for status in self.stages.iter_mut() {
            if *status == StageStatus::Running {
                *status = StageStatus::Failed;
            }
        }
        self.aborted = true;
        self.set_error("Provisioning stopped unexpectedly. Press any key to exit.".to_string());
        self.phase = Phase::Finished;
        self.update_status_bar();
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    fn set_stage(&mut self, stage: Stage, status: StageStatus) {
        if let Some(slot) = self.stages.get_mut(stage.index()) {
            *slot = status;
        }
    }

    /// Currently running stage, if any
    pub fn current_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .position(|s| *s == StageStatus::Running)
            .map(|i| STAGES[i].id)
    }

    /// Result of the provisioning run, once it has finished
    pub fn outcome(&self) -> Option<&Result<(), ProvisionError>> {
        self.outcome.as_ref()
    }

    pub fn take_outcome(&mut self) -> Option<Result<(), ProvisionError>> {
        self.outcome.take()
    }

    pub fn was_cancelled(&self) -> bool {
        self.form.outcome() == FormOutcome::Cancelled
    }

    pub fn set_error(&mut self, text: String) {
        self.message = Some(Message {
            text,
            is_error: true,
        });
    }

    pub fn set_info(&mut self, text: String) {
        self.message = Some(Message {
            text,
            is_error: false,
        });
    }

    pub fn tick(&mut self) {
        if self.phase == Phase::Provisioning {
            self.spinner_frame = (self.spinner_frame + 1) % 4;
        }
    }

    pub fn spinner_char(&self) -> char {
        const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
        SPINNER[self.spinner_frame]
    }

    fn update_status_bar(&mut self) {
        self.status_bar = match self.phase {
            Phase::Form if self.form.is_submit_focused() => StatusBarState::submit_focused(),
            Phase::Form => StatusBarState::editing_field(),
            Phase::Provisioning => StatusBarState::provisioning(),
            Phase::Finished => StatusBarState::finished(),
        };
    }
}
