use ratatui::style::{Color, Modifier, Style};

/// ACTLabs brand colors
const AZURE_BLUE: Color = Color::Rgb(0x00, 0xA2, 0xED);
const ALERT_PINK: Color = Color::Rgb(0xFE, 0x5F, 0x86);
const READY_GREEN: Color = Color::Rgb(0x02, 0xBA, 0x84);

/// Styles for the message panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelStyle {
    pub title: &'static str,
    pub border: Style,
    pub text: Style,
}

/// Colors by the role they play in the wizard
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub badge: Color,
    pub text: Color,
    pub alert: Color,
    pub ready: Color,
    pub dim: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: AZURE_BLUE,
            badge: Color::Cyan,
            text: Color::White,
            alert: ALERT_PINK,
            ready: READY_GREEN,
            dim: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn text(&self) -> Style {
        Style::new().fg(self.text)
    }

    pub fn accent(&self) -> Style {
        Style::new().fg(self.accent)
    }

    pub fn title(&self) -> Style {
        self.accent().add_modifier(Modifier::BOLD)
    }

    pub fn badge(&self) -> Style {
        Style::new().fg(self.badge)
    }

    pub fn ready(&self) -> Style {
        Style::new().fg(self.ready)
    }

    pub fn alert(&self) -> Style {
        Style::new().fg(self.alert)
    }

    /// Borders, hints and anything not yet started
    pub fn dim(&self) -> Style {
        Style::new().fg(self.dim)
    }

    pub fn label(&self, focused: bool) -> Style {
        if focused { self.accent() } else { self.text() }
    }

    pub fn button(&self, focused: bool) -> Style {
        let base = if focused { self.title() } else { self.dim() };
        base.add_modifier(Modifier::REVERSED)
    }

    pub fn panel(&self, is_error: bool) -> PanelStyle {
        if is_error {
            PanelStyle {
                title: " Error ",
                border: self.alert(),
                text: self.alert(),
            }
        } else {
            PanelStyle {
                title: " Info ",
                border: self.badge(),
                text: self.text(),
            }
        }
    }
}
