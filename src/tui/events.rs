// tui/events.rs - Crossterm event loop, background fetches and terminal management

use super::app::{App, FetchResult, FetchTicket, InputMode, Pane, ToggleKind};
use super::state;
use super::ui;
use crate::config::ResolvedConfig;
use crate::sidebar::SidebarEffect;
use crate::source::JsonWorkspace;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the interactive TUI. `initial_route` wins over the saved route.
pub fn run_tui(
    workspace_root: PathBuf,
    config: ResolvedConfig,
    initial_route: Option<String>,
) -> Result<()> {
    let mut app = App::new(workspace_root.clone(), config);

    if let Some(saved_state) = state::load_state(&workspace_root) {
        state::apply_state(&mut app, &saved_state);
    }
    if let Some(route) = initial_route {
        app.navigate(&route);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app);

    // Save state on exit
    if let Err(e) = state::save_state(&workspace_root, &state::capture_state(&app)) {
        tracing::warn!(error = %e, "failed to save TUI state");
    }

    // Restore terminal
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Run one query on a worker thread and post the result back.
fn spawn_fetch(
    source: JsonWorkspace,
    project_id: String,
    ticket: FetchTicket,
    tx: Sender<FetchResult>,
) {
    std::thread::spawn(move || {
        tracing::debug!(fetch = ?ticket.fetch, seq = ticket.seq, "fetch started");
        let result = ticket.run(&source, &project_id);
        // receiver gone means the UI already exited
        let _ = tx.send(result);
    });
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let (tx, rx): (Sender<FetchResult>, Receiver<FetchResult>) = mpsc::channel();

    loop {
        for ticket in app.take_fetches() {
            spawn_fetch(
                app.source().clone(),
                app.config.project_id.clone(),
                ticket,
                tx.clone(),
            );
        }
        while let Ok(result) = rx.try_recv() {
            app.receive(result);
        }

        terminal.draw(|f| ui::draw(f, app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match app.input_mode {
                InputMode::Normal => handle_normal_input(app, key.code),
                InputMode::NewFolder | InputMode::RenameFolder(_) | InputMode::RenameFlow(_) => {
                    handle_text_input(app, key.code)
                }
                InputMode::MoveFlow(_) => handle_move_input(app, key.code),
                InputMode::ConfirmDelete(_) => handle_confirm_input(app, key.code),
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_normal_input(app: &mut App, code: KeyCode) {
    app.status = None;
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::BackTab => app.next_pane(),
        KeyCode::Up | KeyCode::Char('k') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_down(),
        _ => match app.pane {
            Pane::Sidebar => handle_sidebar_key(app, code),
            Pane::Fields => handle_fields_key(app, code),
        },
    }
}

fn handle_sidebar_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Enter => app.activate(),
        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => app.toggle_section(),
        KeyCode::Char('n') => app.start_new_folder(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('m') => app.start_move(),
        KeyCode::Char('d') => app.start_delete(),
        KeyCode::Char('c') => app.duplicate_flow(),
        KeyCode::Char('R') => {
            app.apply_effect(SidebarEffect::RefetchFlows);
            app.apply_effect(SidebarEffect::RefetchFolders);
        }
        _ => {}
    }
}

fn handle_fields_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('f') => app.press_toggle(ToggleKind::Dynamic),
        KeyCode::Char('a') => app.press_toggle(ToggleKind::Auto),
        _ => {}
    }
}

fn handle_text_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Enter => app.confirm_input(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Char(c) => app.text_input.push(c),
        KeyCode::Backspace => {
            app.text_input.pop();
        }
        _ => {}
    }
}

fn handle_move_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Enter => app.confirm_input(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Up | KeyCode::Char('k') => app.picker_up(),
        KeyCode::Down | KeyCode::Char('j') => app.picker_down(),
        _ => {}
    }
}

fn handle_confirm_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_input(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_input(),
        _ => {}
    }
}
