use crate::infra::ProvisioningConfig;
use crate::infra::config::DEFAULT_LOCATION;

use super::input::InputBuffer;

/// Navigation events understood by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    Next,
    Previous,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Editing,
    Submitted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    TenantId,
    SubscriptionId,
    Location,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub id: FieldId,
    pub label: &'static str,
    /// Shown while the field is empty and used if it stays that way
    pub placeholder: String,
    pub input: InputBuffer,
}

impl FormField {
    fn new(id: FieldId, label: &'static str, placeholder: &str) -> Self {
        Self {
            id,
            label,
            placeholder: placeholder.to_string(),
            input: InputBuffer::new(),
        }
    }

    /// Typed value, else the placeholder.
    pub fn value(&self) -> &str {
        let typed = self.input.content().trim();
        if typed.is_empty() {
            self.placeholder.trim()
        } else {
            typed
        }
    }
}

/// The field list plus a submit control at index `fields.len()`.
///
/// Focus wraps at both ends.
#[derive(Debug, Clone)]
pub struct WizardForm {
    pub fields: Vec<FormField>,
    focused: usize,
    outcome: FormOutcome,
}

impl WizardForm {
    pub fn new(config: &ProvisioningConfig) -> Self {
        Self {
            fields: vec![
                FormField::new(FieldId::TenantId, "Tenant ID", &config.tenant_id),
                FormField::new(FieldId::SubscriptionId, "Subscription ID", &config.subscription_id),
                FormField::new(FieldId::Location, "Location", &config.location),
            ],
            focused: 0,
            outcome: FormOutcome::Editing,
        }
    }

    pub fn focused_index(&self) -> usize {
        self.focused
    }

    pub fn submit_index(&self) -> usize {
        self.fields.len()
    }

    pub fn is_submit_focused(&self) -> bool {
        self.focused == self.submit_index()
    }

    pub fn focused_field_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.focused)
    }

    pub fn outcome(&self) -> FormOutcome {
        self.outcome
    }

    pub fn is_submitted(&self) -> bool {
        self.outcome == FormOutcome::Submitted
    }

    /// Apply one navigation event. Nothing changes once the form is closed.
    pub fn apply(&mut self, event: FormEvent) -> FormOutcome {
        if self.outcome != FormOutcome::Editing {
            return self.outcome;
        }

        let slots = self.fields.len() + 1;
        match event {
            FormEvent::Next => self.focused = (self.focused + 1) % slots,
            FormEvent::Previous => self.focused = (self.focused + slots - 1) % slots,
            FormEvent::Submit => {
                if self.is_submit_focused() {
                    self.outcome = FormOutcome::Submitted;
                }
            }
            FormEvent::Cancel => self.outcome = FormOutcome::Cancelled,
        }
        self.outcome
    }

    fn value_of(&self, id: FieldId) -> &str {
        self.fields
            .iter()
            .find(|f| f.id == id)
            .map(FormField::value)
            .unwrap_or_default()
    }

    /// Copy the collected values onto `base`.
    ///
    /// Blank identifiers stay blank for the account resolver; a blank
    /// location falls back to the default region.
    pub fn apply_to(&self, base: &ProvisioningConfig) -> ProvisioningConfig {
        let location = match self.value_of(FieldId::Location) {
            "" => DEFAULT_LOCATION.to_string(),
            value => value.to_string(),
        };

        ProvisioningConfig {
            tenant_id: self.value_of(FieldId::TenantId).to_string(),
            subscription_id: self.value_of(FieldId::SubscriptionId).to_string(),
            location,
            ..base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> WizardForm {
        WizardForm::new(&ProvisioningConfig::default())
    }

    #[test]
    fn next_visits_every_slot_then_wraps() {
        let mut form = form();
        let mut seen = vec![form.focused_index()];
        for _ in 0..4 {
            form.apply(FormEvent::Next);
            seen.push(form.focused_index());
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn previous_from_first_field_wraps_to_submit() {
        let mut form = form();
        form.apply(FormEvent::Previous);

        assert_eq!(form.focused_index(), 3);
        assert!(form.is_submit_focused());

        form.apply(FormEvent::Previous);
        assert_eq!(form.focused_index(), 2);
    }

    #[test]
    fn submit_only_acts_on_the_submit_control() {
        let mut form = form();
        for _ in 0..3 {
            assert_eq!(form.apply(FormEvent::Submit), FormOutcome::Editing);
            form.apply(FormEvent::Next);
        }

        assert_eq!(form.apply(FormEvent::Submit), FormOutcome::Submitted);
        assert!(form.is_submitted());
    }

    #[test]
    fn cancel_closes_the_form() {
        let mut form = form();
        form.apply(FormEvent::Next);

        assert_eq!(form.apply(FormEvent::Cancel), FormOutcome::Cancelled);
        // Closed forms ignore further events
        assert_eq!(form.apply(FormEvent::Next), FormOutcome::Cancelled);
        assert_eq!(form.focused_index(), 1);
    }

    #[test]
    fn blank_fields_resolve_to_placeholders() {
        let base = ProvisioningConfig {
            subscription_id: "sub-from-env".to_string(),
            location: "westus".to_string(),
            ..Default::default()
        };
        let mut form = WizardForm::new(&base);
        form.fields[0].input.set("typed-tenant");

        let config = form.apply_to(&base);

        assert_eq!(config.tenant_id, "typed-tenant");
        assert_eq!(config.subscription_id, "sub-from-env");
        assert_eq!(config.location, "westus");
        assert_eq!(config.resource_group_name, base.resource_group_name);
    }

    #[test]
    fn blank_location_falls_back_to_default_region() {
        let base = ProvisioningConfig {
            location: String::new(),
            ..Default::default()
        };
        let mut form = WizardForm::new(&base);
        form.fields[2].input.set("   ");

        let config = form.apply_to(&base);

        assert_eq!(config.location, "eastus2");
        assert!(config.tenant_id.is_empty());
    }
}
