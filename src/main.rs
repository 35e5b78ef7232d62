use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use time_humanize::HumanTime;
use tracing::info;
use typeforge::{
    app::{App, Flow},
    config::{Config, ConfigStore, FileConfigStore},
    difficulty::{Difficulty, Plan},
    exercise::Exercise,
    export::export_csv,
    loader::{BackgroundLoader, SentenceLoader},
    logging,
    provider::{CachingProvider, CorpusProvider, HttpSentenceProvider, SentenceProvider},
    remote::{HttpResultStore, OfflineResultStore, ResultStore},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    store::{LocalStore, SqliteStore},
    sync::{QueueView, ResultSink, Synchronizer, SyncWorker, WorkerSettings, HISTORY_VIEW_LIMIT},
};

const TICK_RATE_MS: u64 = 100;

type DynRemote = Box<dyn ResultStore + Send + Sync>;
type DynProvider = Box<dyn SentenceProvider + Send>;

/// timed sentence typing trainer with live metrics and offline-tolerant result sync
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type a sentence against the clock. Results are saved locally first and delivered to the result service whenever it is reachable."
)]
pub struct Cli {
    /// difficulty tier to start with
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// name recorded with each result
    #[clap(short = 'u', long)]
    participant: Option<String>,

    /// subscription plan; free plans cannot use expert sentences
    #[clap(long, value_enum)]
    plan: Option<Plan>,

    /// base URL of the sentence and result service
    #[clap(long)]
    api: Option<String>,

    /// write the effective settings to the config file
    #[clap(long)]
    save_config: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// print recent results with their sync state
    History,
    /// run one sync cycle now and report what happened
    Sync,
    /// write synced and pending results to a CSV file
    Export { path: PathBuf },
}

impl Cli {
    /// Command line flags override the config file for this run
    fn apply(&self, config: &mut Config) {
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(participant) = &self.participant {
            config.participant = participant.clone();
        }
        if let Some(plan) = self.plan {
            config.plan = plan;
        }
        if let Some(api) = &self.api {
            config.api_base_url = Some(api.clone());
        }
    }
}

fn remote_for(config: &Config) -> Result<DynRemote, Box<dyn Error>> {
    let remote: DynRemote = match &config.api_base_url {
        Some(url) => Box::new(HttpResultStore::new(url.as_str(), config.request_timeout())?),
        None => Box::new(OfflineResultStore),
    };
    Ok(remote)
}

fn provider_for(config: &Config) -> Result<DynProvider, Box<dyn Error>> {
    let provider: DynProvider = match &config.api_base_url {
        Some(url) => Box::new(CachingProvider::new(
            HttpSentenceProvider::new(url.as_str(), config.request_timeout())?,
            SqliteStore::open_default()?,
        )),
        None => Box::new(CorpusProvider::embedded()?),
    };
    Ok(provider)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _log_guard = logging::init();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply(&mut config);
    if cli.save_config {
        config_store.save(&config)?;
        info!(path = %config_store.path().display(), "config saved");
    }

    if let Some(command) = &cli.command {
        return run_command(command, &config);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let worker = SyncWorker::spawn(
        Synchronizer::new(SqliteStore::open_default()?, remote_for(&config)?),
        WorkerSettings {
            interval: config.sync_interval(),
            ..WorkerSettings::default()
        },
    );
    let exercise = Exercise::new(
        BackgroundLoader::spawn(provider_for(&config)?),
        worker,
        SqliteStore::open_default()?,
        config.profile(),
        config.difficulty,
    );
    let mut app = App::new(exercise);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B, L, K, S>(
    terminal: &mut Terminal<B>,
    app: &mut App<L, K, S>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    L: SentenceLoader,
    K: ResultSink + QueueView,
    S: LocalStore,
{
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    app.start(Instant::now());

    loop {
        terminal.draw(|f| f.render_widget(&app.view(), f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(Instant::now()),
            AppEvent::Resize => {}
            AppEvent::FocusLost => app.on_focus_lost(Instant::now()),
            AppEvent::Key(key) => {
                if app.on_key(key, Instant::now()) == Flow::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn run_command(command: &Command, config: &Config) -> Result<(), Box<dyn Error>> {
    match command {
        Command::History => {
            let sync = Synchronizer::new(SqliteStore::open_default()?, OfflineResultStore);
            let rows = sync.history_view(HISTORY_VIEW_LIMIT)?;
            if rows.is_empty() {
                println!("no results yet");
            }
            let now = chrono::Local::now();
            for row in rows {
                let age = now.signed_duration_since(row.result.created_at).num_seconds();
                println!(
                    "{:<18} {:<7} {:>4} wpm {:>4}% {:>4}s  {}",
                    HumanTime::from_seconds(-age).to_string(),
                    row.result.difficulty,
                    row.result.wpm,
                    row.result.accuracy,
                    row.result.elapsed_seconds,
                    if row.is_synced() { "synced" } else { "pending" }
                );
            }
        }
        Command::Sync => {
            let sync = Synchronizer::new(SqliteStore::open_default()?, remote_for(config)?);
            let report = sync.sync_cycle()?;
            println!(
                "attempted {}, accepted {}, rejected {}, unreachable {}, still pending {}",
                report.attempted,
                report.accepted,
                report.rejected,
                report.unreachable,
                report.remaining
            );
        }
        Command::Export { path } => {
            let sync = Synchronizer::new(SqliteStore::open_default()?, OfflineResultStore);
            let rows = sync.history_view(usize::MAX)?;
            let written = export_csv(&rows, path)?;
            println!("wrote {written} results to {}", path.display());
        }
    }
    Ok(())
}
