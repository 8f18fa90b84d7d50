mod analysis;
mod app;
mod braille;
mod color;
mod config;
mod data;
mod error;
mod map;
mod state;
mod ui;

use anyhow::{Context, Result};
use app::{App, InputMode};
use clap::Parser;
use config::AppConfig;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use state::DashboardState;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

/// Terminal dashboard for armed-conflict event records
#[derive(Parser, Debug)]
#[command(name = "conflict-atlas")]
#[command(about = "Filter, map and chart conflict event records in the terminal", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Event CSV to load instead of the first configured dataset
    #[arg(short, long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Directory of region boundary GeoJSON files
    #[arg(short, long, value_name = "DIR")]
    boundaries: Option<PathBuf>,

    /// Where log output goes; the terminal belongs to the dashboard
    #[arg(long, value_name = "FILE", default_value = "conflict-atlas.log")]
    log_file: PathBuf,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    log::info!("conflict-atlas v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(path) = &args.data {
        config.override_data_path(path.clone());
    }
    if let Some(dir) = &args.boundaries {
        config.boundaries.dir = dir.clone();
    }

    // Load everything before taking over the terminal so failures print plainly
    let source = config.datasets[0].clone();
    let table = data::load_dataset(&source).with_context(|| format!("Failed to load dataset `{}`", source.name))?;
    let state = DashboardState::new(&source.name, table)?;
    let regions = data::load_region_boundaries(&config.boundaries.dir, &config.boundaries.rules);

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let size = terminal.size()?;
    let app = App::new(config, state, regions, size.width, size.height);
    let result = run(&mut terminal, app);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Log to a file; `RUST_LOG` wins over `-v` when set
fn init_logging(args: &Args) -> Result<()> {
    use env_logger::{Builder, Target};
    use log::LevelFilter;
    use std::io::Write;

    let file = File::create(&args.log_file)
        .with_context(|| format!("Failed to create log file: {}", args.log_file.display()))?;

    let mut builder = if std::env::var_os("RUST_LOG").is_some() {
        Builder::from_default_env()
    } else {
        let level = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        let mut builder = Builder::new();
        builder.filter_level(level);
        builder
    };

    builder
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
    Ok(())
}

/// Keys while the actor pattern editor is open
fn handle_pattern_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_pattern(),
        KeyCode::Esc => app.cancel_pattern_edit(),
        KeyCode::Backspace => app.pop_pattern_char(),
        KeyCode::Char(ch) => app.push_pattern_char(ch),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if matches!(app.input, InputMode::EditingPattern(_)) {
        handle_pattern_key(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

        // Date window
        KeyCode::Char('[') => app.shift_start(-1),
        KeyCode::Char(']') => app.shift_start(1),
        KeyCode::Char('{') => app.shift_end(-1),
        KeyCode::Char('}') => app.shift_end(1),

        // Filters and coloring
        KeyCode::Char('/') => app.begin_pattern_edit(),
        KeyCode::Char('z') | KeyCode::Char('Z') => app.toggle_zero_fatalities(),
        KeyCode::Char('m') | KeyCode::Char('M') => app.cycle_color_mode(),
        KeyCode::Char('c') | KeyCode::Char('C') => app.cycle_choropleth_category(),

        // Layer toggles
        KeyCode::Char('b') | KeyCode::Char('B') => app.map_renderer.toggle_regions(),
        KeyCode::Char('L') => app.map_renderer.toggle_labels(),

        KeyCode::Char('d') | KeyCode::Char('D') => app.next_dataset(data::load_dataset),
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

        _ => {}
    }
}

/// Handle mouse events for panning, zooming and selection
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        // Drag pans, click selects
        MouseEventKind::Down(MouseButton::Left) => app.press(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.release(mouse.column, mouse.row),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                // Only handle key press events (not release)
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width, height),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
