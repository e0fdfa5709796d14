use std::{fs::File, io::stdout, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::EnableMouseCapture,
    execute,
    terminal::{EnterAlternateScreen, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use comicview::app::{AppAction, ViewerApp, run_app_with_event_source};
use comicview::event_source::KeyboardEventSource;
use comicview::panic_handler::{self, TerminalGuard};
use comicview::settings;
use comicview::viewer::{LayoutMode, PageBackend, ViewerConfig, backend_for_path};

/// A terminal comic and PDF page viewer
#[derive(Parser, Debug)]
#[command(name = "comicview", version, about, long_about = None)]
struct Args {
    /// Document to open (.cbz, .zip, or .pdf with the `pdf` feature)
    #[arg(value_name = "FILE")]
    document: PathBuf,

    /// Start in double page layout
    #[arg(long)]
    double: bool,

    /// Initial zoom scale
    #[arg(long, value_name = "SCALE")]
    scale: Option<f32>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file
    #[arg(long, value_name = "LOG_FILE", default_value = "comicview.log")]
    log_file: PathBuf,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("cannot create log file {:?}", args.log_file))?,
    )?;

    info!("Starting comicview");

    match &args.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }

    let mut config = settings::get_settings().viewer_config();
    if args.double {
        config.layout_mode = LayoutMode::Double;
    }
    if let Some(scale) = args.scale {
        config.initial_scale = scale;
    }

    let location = args.document.to_string_lossy().into_owned();
    let backend = backend_for_path(&args.document)
        .with_context(|| format!("unsupported document {location}"))?;

    panic_handler::initialize_panic_handler();

    enable_raw_mode()?;
    let guard = TerminalGuard::with(panic_handler::restore_terminal);
    let res = run_viewer(config, Arc::from(backend), &location);
    drop(guard);

    match res {
        Ok(exit) => info!("Shutting down comicview ({exit:?})"),
        Err(err) => {
            error!("Application error: {err:?}");
            println!("{err:?}");
        }
    }
    Ok(())
}

/// Everything that runs with the terminal in raw mode
fn run_viewer(
    config: ViewerConfig,
    backend: Arc<dyn PageBackend>,
    location: &str,
) -> Result<Option<AppAction>> {
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = ViewerApp::new(config);
    if app.open(backend, location).is_ok() {
        let size = terminal.size()?;
        app.resize(size.width, size.height);
        app.controller_mut()
            .wait_until_settled(Duration::from_secs(2));
    }

    let mut events = KeyboardEventSource;
    run_app_with_event_source(&mut terminal, &mut app, &mut events)?;
    Ok(app.exit_reason())
}
