mod app;
mod ui;

use crate::app::{App, collect_entries};
use anyhow::Result;
use clap::Parser;
use com_utils::{ComGuard, WindowsRegistry};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io,
    time::{Duration, Instant},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Show every object currently published in the COM Running Object Table.
#[derive(Parser, Debug)]
#[command(name = "rot-viewer", version, about)]
struct Args {
    /// Refresh interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval: u64,

    /// Print one snapshot to stdout and exit instead of starting the TUI.
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let file_appender = tracing_appender::rolling::daily("logs", "rot-viewer.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_filter(filter))
        .init();

    tracing::info!(interval = args.interval, once = args.once, "starting rot-viewer");

    let _com = ComGuard::new()?;
    let registry = WindowsRegistry;

    if args.once {
        return print_snapshot(&registry);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(args.interval);
    let res = run_app(&mut terminal, &mut app, &registry);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "application error");
    }

    Ok(())
}

fn print_snapshot(registry: &WindowsRegistry) -> Result<()> {
    let rows = collect_entries(registry)?;
    println!("{:<50} {:<18} {}", "DISPLAY NAME", "TYPE", "MONIKER CLSID");
    for row in &rows {
        println!(
            "{:<50} {:<18} {}",
            row.display_name, row.kind, row.class_id
        );
    }
    tracing::info!(count = rows.len(), "snapshot printed");
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    registry: &WindowsRegistry,
) -> io::Result<()> {
    let tick = Duration::from_millis(app.interval_ms.max(1));
    let mut last_tick: Option<Instant> = None;

    loop {
        let due = last_tick.is_none_or(|t| t.elapsed() >= tick);
        if due && !app.paused {
            app.apply_refresh(collect_entries(registry));
            last_tick = Some(Instant::now());
        }

        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key_event(app, key, registry);
            }
        }

        if app.should_exit {
            return Ok(());
        }
    }
}

fn handle_key_event(app: &mut App, key: event::KeyEvent, registry: &WindowsRegistry) {
    if key.kind != event::KeyEventKind::Press {
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
            app.should_exit = true;
        }
        KeyCode::Down => app.select_next(),
        KeyCode::Up => app.select_prev(),
        KeyCode::Char('p') | KeyCode::Char('P') => app.toggle_paused(),
        KeyCode::Char('r') | KeyCode::Char('R') => {
            // Manual refresh works while paused too.
            app.apply_refresh(collect_entries(registry));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        }
    }

    #[test]
    fn quit_keys_exit() {
        let registry = WindowsRegistry;
        for code in [KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc] {
            let mut app = App::new(1000);
            handle_key_event(&mut app, press(code), &registry);
            assert!(app.should_exit, "{code:?} should exit");
        }
    }

    #[test]
    fn pause_toggles() {
        let registry = WindowsRegistry;
        let mut app = App::new(1000);
        handle_key_event(&mut app, press(KeyCode::Char('p')), &registry);
        assert!(app.paused);
        handle_key_event(&mut app, press(KeyCode::Char('p')), &registry);
        assert!(!app.paused);
    }

    #[test]
    fn key_releases_are_ignored() {
        let registry = WindowsRegistry;
        let mut app = App::new(1000);
        let release = KeyEvent {
            code: KeyCode::Esc,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Release,
            state: KeyEventState::empty(),
        };
        handle_key_event(&mut app, release, &registry);
        assert!(!app.should_exit);
    }
}
