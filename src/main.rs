mod app;
mod editor;
mod model;
mod msg;
mod render;

use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use app::App;
use model::config::AppConfig;
use model::snippet::folder_names;
use model::store::SnippetStore;
use msg::Msg;

#[derive(Parser)]
#[command(
    name = "snipmark",
    about = "A snippet finder for your markdown notes",
    version
)]
struct Cli {
    /// Fuzzy query; opens the best-matching snippet directly.
    query: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the collection to stdout without entering the TUI.
    List {
        #[arg(value_enum)]
        what: ListTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListTarget {
    Snippets,
    Folders,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "snipmark")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "snipmark.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("snipmark=info")
        .init();

    tracing::info!("snipmark starting");

    let config = AppConfig::load()?;

    if let Some(Commands::List { what }) = cli.command {
        return list(&config, what);
    }

    let mut app = App::new(config)?;
    if let Some(query) = cli.query.as_deref() {
        app.open_query(query);
    }

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.flush_index();

    if let Err(e) = result {
        eprintln!("snipmark error: {e:?}");
    }

    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| app.view(f))?;

        // The editor needs the terminal to itself; leave raw mode, block on
        // it, then rebuild the screen from scratch.
        if let Some(path) = app.take_pending_edit() {
            suspend_terminal(terminal)?;
            if let Err(err) = editor::edit_file(&path) {
                tracing::warn!("edit of {} aborted: {err}", path.display());
            }
            resume_terminal(terminal)?;
            app.update(Msg::EditorDone);
            continue;
        }

        if app.should_quit {
            break;
        }

        // Poll with a short timeout so the copy-feedback deadline still
        // fires when the user goes idle.
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    app.update(Msg::Key(key));
                }
                Event::Resize(w, h) => app.update(Msg::Resize(w, h)),
                _ => {}
            }
        } else {
            app.update(Msg::Tick);
        }
    }

    Ok(())
}

fn suspend_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn resume_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(())
}

fn list(config: &AppConfig, what: ListTarget) -> Result<()> {
    let store = SnippetStore::new(config.home_path(), &config.general.index_file);
    store.ensure_seeded()?;

    let mut snippets = store.load();
    match store.reconcile(&mut snippets) {
        Ok(true) => {
            if let Err(err) = store.save(&snippets) {
                tracing::warn!("could not persist reconciled index: {err}");
            }
        }
        Ok(false) => {}
        Err(err) => tracing::warn!("snippet scan failed, listing loaded index: {err}"),
    }

    match what {
        ListTarget::Snippets => {
            for snippet in &snippets {
                println!("{}", snippet.display());
            }
        }
        ListTarget::Folders => {
            for folder in folder_names(&snippets) {
                println!("{folder}");
            }
        }
    }
    Ok(())
}
