/// Key hints shown in the bottom line, switched as the wizard moves on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBarState {
    pub left_hint: String,
    pub right_hint: String,
}

impl StatusBarState {
    pub fn editing_field() -> Self {
        Self {
            left_hint: "Type to edit  Tab/Down: next  Shift+Tab/Up: previous".to_string(),
            right_hint: "Esc: cancel".to_string(),
        }
    }

    pub fn submit_focused() -> Self {
        Self {
            left_hint: "Tab: back to fields".to_string(),
            right_hint: "Enter: create resources  Esc: cancel".to_string(),
        }
    }

    pub fn provisioning() -> Self {
        Self {
            left_hint: "Please wait...".to_string(),
            right_hint: String::new(),
        }
    }

    pub fn finished() -> Self {
        Self {
            left_hint: String::new(),
            right_hint: "Press any key to exit".to_string(),
        }
    }
}
