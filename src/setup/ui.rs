use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::{Phase, SetupApp, StageStatus};
use crate::infra::STAGES;
use crate::ui::Layout;

const BOX_WIDTH: u16 = 72;

/// Main draw function for the setup wizard
pub fn draw(frame: &mut Frame, app: &SetupApp) {
    let layout = Layout::new(frame.area());
    frame.render_widget(Clear, layout.full);

    draw_header(frame, layout.header, app);

    match app.phase {
        Phase::Form => draw_form(frame, layout.content, app),
        Phase::Provisioning | Phase::Finished => draw_progress(frame, layout.content, app),
    }

    draw_message(frame, layout.message, app);
    draw_status_bar(frame, layout.status, app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &SetupApp) {
    frame.render_widget(
        Paragraph::new(" ACTLabs Setup ")
            .style(app.theme.title()),
        area,
    );

    if app.dryrun {
        frame.render_widget(
            Paragraph::new("[dryrun] ")
                .style(app.theme.badge())
                .alignment(Alignment::Right),
            area,
        );
    }
}

fn draw_form(frame: &mut Frame, area: Rect, app: &SetupApp) {
    let height = (app.form.fields.len() as u16) * 2 + 5;
    let centered = Layout::centered_box(area, BOX_WIDTH, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(app.theme.dim())
        .title(" Azure settings ");
    let inner = block.inner(centered);
    frame.render_widget(block, centered);

    if inner.height < 3 || inner.width < 20 {
        return;
    }

    let label_width = 18;
    let field_x = inner.x + 1 + label_width;
    let field_width = inner.width.saturating_sub(label_width + 2);
    let mut y = inner.y + 1;

    for (idx, field) in app.form.fields.iter().enumerate() {
        if y >= inner.y + inner.height {
            break;
        }
        let focused = app.form.focused_index() == idx;

        frame.render_widget(
            Paragraph::new(field.label).style(app.theme.label(focused)),
            Rect::new(inner.x + 1, y, label_width, 1),
        );

        let content = field.input.content();
        let line = if focused {
            let cursor = field.input.cursor();
            let before: String = content.chars().take(cursor).collect();
            let at: String = content.chars().nth(cursor).map(String::from).unwrap_or_else(|| " ".to_string());
            let after: String = content.chars().skip(cursor + 1).collect();
            let mut spans = vec![
                Span::styled(before, app.theme.text()),
                Span::styled(at, app.theme.text().add_modifier(Modifier::REVERSED)),
                Span::styled(after, app.theme.text()),
            ];
            if content.is_empty() && !field.placeholder.is_empty() {
                spans.push(Span::styled(field.placeholder.clone(), app.theme.dim()));
            }
            Line::from(spans)
        } else if content.is_empty() {
            let hint = if field.placeholder.is_empty() {
                "(detect from az CLI)".to_string()
            } else {
                field.placeholder.clone()
            };
            Line::from(Span::styled(hint, app.theme.dim()))
        } else {
            Line::from(Span::styled(content.to_string(), app.theme.text()))
        };
        frame.render_widget(Paragraph::new(line), Rect::new(field_x, y, field_width, 1));

        y += 2;
    }

    let button_text = " [ Create resources ] ";
    let button_width = button_text.len() as u16;
    let button_x = inner.x + (inner.width.saturating_sub(button_width)) / 2;
    if y < inner.y + inner.height {
        frame.render_widget(
            Paragraph::new(button_text).style(app.theme.button(app.form.is_submit_focused())),
            Rect::new(button_x, y, button_width.min(inner.width), 1),
        );
    }
}

fn draw_progress(frame: &mut Frame, area: Rect, app: &SetupApp) {
    let height = STAGES.len() as u16 + 4;
    let centered = Layout::centered_box(area, BOX_WIDTH + 14, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(app.theme.dim())
        .title(" Provisioning ");
    let inner = block.inner(centered);
    frame.render_widget(block, centered);

    let mut y = inner.y + 1;
    for (descriptor, status) in STAGES.iter().zip(&app.stages) {
        if y >= inner.y + inner.height {
            break;
        }

        let (marker, style) = match status {
            StageStatus::Pending => (' ', app.theme.dim()),
            StageStatus::Running => (app.spinner_char(), app.theme.accent()),
            StageStatus::Succeeded => ('x', app.theme.ready()),
            StageStatus::Failed => ('!', app.theme.alert()),
        };

        frame.render_widget(
            Paragraph::new(format!(" [{marker}] {}", descriptor.label)).style(style),
            Rect::new(inner.x + 1, y, inner.width.saturating_sub(2), 1),
        );
        y += 1;
    }
}

fn draw_message(frame: &mut Frame, area: Rect, app: &SetupApp) {
    let msg = match &app.message {
        Some(m) => m,
        None => return,
    };

    let panel = app.theme.panel(msg.is_error);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(panel.border)
        .title(panel.title)
        .title_style(panel.border.add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(Line::from(Span::styled(msg.text.as_str(), panel.text)))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &SetupApp) {
    frame.render_widget(Clear, area);

    frame.render_widget(
        Paragraph::new(format!(" {}", app.status_bar.left_hint)).style(app.theme.dim()),
        Rect::new(area.x, area.y, area.width * 2 / 3, 1),
    );

    let done = app
        .stages
        .iter()
        .filter(|s| **s == StageStatus::Succeeded)
        .count();
    let right_text = if app.status_bar.right_hint.is_empty() {
        format!("{done}/{} ", STAGES.len())
    } else {
        format!("{done}/{}  {} ", STAGES.len(), app.status_bar.right_hint)
    };

    frame.render_widget(
        Paragraph::new(right_text)
            .style(app.theme.dim())
            .alignment(Alignment::Right),
        Rect::new(area.x + area.width / 3, area.y, area.width - area.width / 3, 1),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{ProvisionEvent, ProvisioningConfig, Stage};
    use ratatui::backend::TestBackend;

    fn render(app: &SetupApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn form_shows_fields_and_button() {
        let app = SetupApp::new(ProvisioningConfig::default(), true);
        let screen = render(&app);

        assert!(screen.contains("Tenant ID"));
        assert!(screen.contains("Subscription ID"));
        assert!(screen.contains("eastus2"));
        assert!(screen.contains("Create resources"));
        assert!(screen.contains("[dryrun]"));
    }

    #[test]
    fn progress_lists_stage_labels() {
        let mut app = SetupApp::new(ProvisioningConfig::default(), false);
        app.phase = Phase::Provisioning;
        app.handle_provision_event(ProvisionEvent::StageStarted(Stage::AzureAuth));
        let screen = render(&app);

        assert!(screen.contains(STAGES[0].label));
        assert!(screen.contains("[|]"));
        assert!(screen.contains("0/7"));
    }

    #[test]
    fn aborted_run_shows_error_panel_and_failed_marker() {
        let mut app = SetupApp::new(ProvisioningConfig::default(), false);
        app.phase = Phase::Provisioning;
        app.handle_provision_event(ProvisionEvent::StageStarted(Stage::AzureAuth));
        app.progress_closed();
        let screen = render(&app);

        assert!(screen.contains("Error"));
        assert!(screen.contains("stopped unexpectedly"));
        assert!(screen.contains("[!]"));
    }
}
