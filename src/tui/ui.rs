// tui/ui.rs - Stateless ratatui rendering

use super::app::{App, InputMode, OpenForm, Pane, SidebarRow};
use crate::execution_mode::{Affordance, ToggleView};
use crate::sidebar::{SidebarPlan, SidebarView};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthChar;

// ---------------------------------------------------------------------------
// Style helpers
// ---------------------------------------------------------------------------

fn cursor_style(is_cursor: bool) -> Style {
    if is_cursor {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn cursor_char(is_cursor: bool) -> &'static str {
    if is_cursor {
        "▶"
    } else {
        " "
    }
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn key_hint(key: &str) -> Span<'static> {
    Span::styled(format!("[{}]", key), Style::default().fg(Color::Cyan))
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
}

/// Cut `text` to at most `max` terminal columns, marking the cut with "…".
fn truncate(text: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max {
        return text.to_string();
    }
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn center_modal(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(5),    // panes
            Constraint::Length(3), // footer
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(chunks[1]);
    draw_sidebar(frame, app, panes[0]);
    draw_fields(frame, app, panes[1]);

    match &app.input_mode {
        InputMode::Normal => {}
        InputMode::MoveFlow(_) => draw_move_modal(frame, app, chunks[1]),
        InputMode::ConfirmDelete(_) => draw_confirm_modal(frame, app, chunks[1]),
        InputMode::NewFolder => draw_text_modal(frame, " New folder ", &app.text_input, chunks[1]),
        InputMode::RenameFolder(_) => {
            draw_text_modal(frame, " Rename folder ", &app.text_input, chunks[1])
        }
        InputMode::RenameFlow(_) => {
            draw_text_modal(frame, " Rename flow ", &app.text_input, chunks[1])
        }
    }

    draw_footer(frame, app, chunks[2]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(vec![Span::styled(
            " Flowdeck ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )]),
        Line::from(vec![
            Span::raw(format!("  Workspace: {}  ", app.workspace_root.display())),
            Span::styled(app.route.clone(), dim()),
        ]),
    ];
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Sidebar
// ---------------------------------------------------------------------------

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let block = pane_block(" Folders ".to_string(), app.pane == Pane::Sidebar);
    let width = area.width.saturating_sub(2) as usize;

    let items: Vec<ListItem> = match app.sidebar_view() {
        SidebarView::Loading { placeholder_rows } => (0..placeholder_rows)
            .map(|i| {
                let bar = "░".repeat(width.saturating_sub(4 + (i % 3) * 3).min(24));
                ListItem::new(Line::from(Span::styled(format!("  {}", bar), dim())))
            })
            .collect(),
        SidebarView::Failed(message) => vec![ListItem::new(Line::from(Span::styled(
            truncate(&format!("  Failed to load: {}", message), width),
            Style::default().fg(Color::Red),
        )))],
        SidebarView::Ready { plan, .. } => sidebar_items(app, &plan, width),
    };

    frame.render_widget(List::new(items).block(block), area);
}

fn sidebar_items(app: &App, plan: &SidebarPlan, width: usize) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();

    let new_folder = if plan.new_folder.enabled {
        Line::from(vec![
            Span::raw("  "),
            key_hint("n"),
            Span::raw(format!(" {}", plan.new_folder.tooltip)),
        ])
    } else {
        Line::from(Span::styled(
            format!("  New folder: {}", plan.new_folder.tooltip),
            dim(),
        ))
    };
    items.push(ListItem::new(new_folder));

    let focused = app.pane == Pane::Sidebar;
    for (idx, row) in app.visible_rows(plan).iter().enumerate() {
        let is_cursor = focused && idx == app.sidebar_cursor;
        let line = match row {
            SidebarRow::Section(key) => {
                let Some(section) = plan.section(key) else {
                    continue;
                };
                let arrow = if app.is_expanded(key, section.default_open) {
                    "▾"
                } else {
                    "▸"
                };
                let mut spans = vec![
                    Span::styled(format!("{} ", cursor_char(is_cursor)), cursor_style(is_cursor)),
                    Span::raw(format!("{} ", arrow)),
                    Span::styled(
                        truncate(&section.label, width.saturating_sub(10)),
                        cursor_style(is_cursor).fg(Color::Yellow),
                    ),
                ];
                if let Some(count) = section.count_badge {
                    spans.push(Span::styled(format!(" ({})", count), dim()));
                }
                Line::from(spans)
            }
            SidebarRow::Flow { group, flow_id } => {
                let Some(flow) = plan
                    .section(group)
                    .and_then(|s| s.flows.iter().find(|f| &f.id == flow_id))
                else {
                    continue;
                };
                let style = if flow.active {
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD)
                } else {
                    cursor_style(is_cursor).fg(Color::White)
                };
                Line::from(vec![
                    Span::styled(format!("{} ", cursor_char(is_cursor)), cursor_style(is_cursor)),
                    Span::raw(if flow.active { "  ● " } else { "    " }),
                    Span::styled(truncate(&flow.label, width.saturating_sub(7)), style),
                ])
            }
        };
        items.push(ListItem::new(line));
    }
    items
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

fn draw_fields(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.pane == Pane::Fields;
    let width = area.width.saturating_sub(2) as usize;

    let Some(form) = &app.form else {
        let block = pane_block(" Fields ".to_string(), focused);
        let hint = Paragraph::new(Line::from(Span::styled(
            "  Select a flow in the sidebar",
            dim(),
        )))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let title = match &form.step {
        Ok(step) if !step.step_name.is_empty() => format!(" {} · {} ", form.flow_id, step.step_name),
        _ => format!(" {} ", form.flow_id),
    };
    let block = pane_block(title, focused);

    let items = match &form.step {
        Err(message) => vec![ListItem::new(Line::from(Span::styled(
            truncate(&format!("  {}", message), width),
            Style::default().fg(Color::Red),
        )))],
        Ok(_) => field_items(app, form, focused, width),
    };
    frame.render_widget(List::new(items).block(block), area);
}

fn field_items(app: &App, form: &OpenForm, focused: bool, width: usize) -> Vec<ListItem<'static>> {
    let toggles = form.toggles();
    if toggles.is_empty() {
        return vec![ListItem::new(Line::from(Span::styled(
            "  No properties",
            dim(),
        )))];
    }

    let name_width = toggles
        .iter()
        .map(|t| label_of(t.property_name, &t.property.display_name).chars().count())
        .max()
        .unwrap_or(0)
        .min(24);

    toggles
        .iter()
        .enumerate()
        .map(|(idx, toggle)| {
            let is_cursor = focused && idx == app.field_cursor;
            let label = truncate(label_of(toggle.property_name, &toggle.property.display_name), name_width);
            let mut spans = vec![
                Span::styled(format!("{} ", cursor_char(is_cursor)), cursor_style(is_cursor)),
                Span::styled(
                    format!("{:<width$} ", label, width = name_width),
                    cursor_style(is_cursor).fg(Color::White),
                ),
                Span::styled(format!("{:<12} ", toggle.property.property_type.as_str()), dim()),
            ];
            spans.extend(toggle_spans(toggle.view(&form.state)));

            let value = form
                .state
                .input_value(toggle.property_name)
                .map(|v| v.to_string())
                .unwrap_or_default();
            let used = 2 + name_width + 1 + 13 + 12;
            spans.push(Span::raw(format!(
                " {}",
                truncate(&value, width.saturating_sub(used))
            )));
            ListItem::new(Line::from(spans))
        })
        .collect()
}

fn label_of<'a>(name: &'a str, display_name: &'a str) -> &'a str {
    if display_name.is_empty() {
        name
    } else {
        display_name
    }
}

fn affordance_span(text: &str, affordance: &Affordance, pressed_color: Color) -> Span<'static> {
    let style = if !affordance.enabled {
        dim().add_modifier(Modifier::DIM)
    } else if affordance.pressed {
        Style::default()
            .fg(pressed_color)
            .add_modifier(Modifier::BOLD)
    } else {
        dim()
    };
    Span::styled(text.to_string(), style)
}

fn toggle_spans(view: Option<ToggleView>) -> Vec<Span<'static>> {
    let Some(view) = view else {
        return vec![Span::styled(format!("{:<11}", "-"), dim())];
    };
    let dynamic = match &view.dynamic {
        Some(affordance) => affordance_span("[fx]", affordance, Color::Yellow),
        None => Span::raw("    "),
    };
    vec![
        dynamic,
        Span::raw(" "),
        affordance_span("[AI]", &view.auto, Color::Magenta),
        Span::raw(" "),
        Span::styled(format!("{:<7}", view.mode.as_str()), dim()),
    ]
}

// ---------------------------------------------------------------------------
// Modals
// ---------------------------------------------------------------------------

fn draw_text_modal(frame: &mut Frame, title: &str, input: &str, area: Rect) {
    let modal_area = center_modal(area, 50, 5);
    frame.render_widget(Clear, modal_area);

    let lines = vec![
        Line::from(vec![
            Span::styled(" > ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}_", input)),
        ]),
        Line::from(vec![
            Span::raw(" "),
            key_hint("Enter"),
            Span::raw(" save  "),
            key_hint("Esc"),
            Span::raw(" cancel"),
        ]),
    ];
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), modal_area);
}

fn draw_move_modal(frame: &mut Frame, app: &App, area: Rect) {
    let targets = app.move_targets();
    let height = (targets.len() as u16 + 3).min(area.height.saturating_sub(2));
    let modal_area = center_modal(area, 44, height);
    frame.render_widget(Clear, modal_area);

    let mut lines: Vec<Line> = targets
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            let is_cursor = idx == app.picker_cursor;
            Line::from(vec![
                Span::styled(format!(" {} ", cursor_char(is_cursor)), cursor_style(is_cursor)),
                Span::styled(truncate(&target.label, 36), cursor_style(is_cursor).fg(Color::Yellow)),
            ])
        })
        .collect();
    lines.push(Line::from(vec![
        Span::raw(" "),
        key_hint("Enter"),
        Span::raw(" move  "),
        key_hint("Esc"),
        Span::raw(" cancel"),
    ]));

    let block = Block::default()
        .title(" Move to ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), modal_area);
}

fn draw_confirm_modal(frame: &mut Frame, app: &App, area: Rect) {
    let modal_area = center_modal(area, 44, 4);
    frame.render_widget(Clear, modal_area);

    let prompt = app.delete_prompt().unwrap_or_default();
    let inner_width = modal_area.width.saturating_sub(3) as usize;
    let lines = vec![
        Line::from(format!(" {}", truncate(&prompt, inner_width))),
        Line::from(vec![
            Span::raw(" "),
            key_hint("y"),
            Span::raw(" delete  "),
            key_hint("n"),
            Span::raw(" keep"),
        ]),
    ];
    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    frame.render_widget(Paragraph::new(lines).block(block), modal_area);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.pane {
        Pane::Sidebar => vec![
            key_hint("Enter"),
            Span::raw(" open  "),
            key_hint("Space"),
            Span::raw(" fold  "),
            key_hint("n"),
            Span::raw(" folder  "),
            key_hint("r"),
            Span::raw(" rename  "),
            key_hint("m"),
            Span::raw(" move  "),
            key_hint("c"),
            Span::raw(" copy  "),
            key_hint("d"),
            Span::raw(" delete  "),
            key_hint("Tab"),
            Span::raw(" fields  "),
            key_hint("q"),
            Span::raw(" quit"),
        ],
        Pane::Fields => vec![
            key_hint("f"),
            Span::raw(" dynamic  "),
            key_hint("a"),
            Span::raw(" auto  "),
            key_hint("Tab"),
            Span::raw(" sidebar  "),
            key_hint("q"),
            Span::raw(" quit"),
        ],
    };

    let mut lines = vec![Line::from(hints)];
    if let Some(status) = &app.status {
        lines.push(Line::from(Span::styled(
            format!(" {}", status),
            Style::default().fg(Color::Yellow),
        )));
    }
    let block = Block::default().borders(Borders::TOP);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("Invoices", 20), "Invoices");
        assert_eq!(truncate("Invoices", 5), "Invo…");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // each CJK char is two columns wide
        assert_eq!(truncate("請求書の処理", 7), "請求書…");
    }
}
