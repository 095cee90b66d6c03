use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use mk_slots::{
    EngineEvent,
    FileStore,
    GameConfig,
    Jukebox,
    Ledger,
    Phase,
    RandomSymbols,
    Settlement,
    SpinEngine,
    SpinRejection,
    Symbol,
    audio,
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = ".mk-slots/mk-slots.log";
pub const DEFAULT_WAGER: u64 = 10;
const MAX_WAGER_DIGITS: usize = 12;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub sounds_dir: PathBuf,
    pub seed: Option<u64>,
    pub initial_wager: u64,
    pub mute: bool,
    pub game: GameConfig,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub reels: Vec<Symbol>,
    pub stopped: Vec<bool>,
    pub phase: Phase,
    pub balance: f64,
    pub wager_input: String,
    pub status: String,
    pub last_settlement: Option<Settlement>,
    pub state_file: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WagerEdit {
    Digit(u32),
    Backspace,
    Increment,
    Decrement,
}

/// Edits the wager field. The field only ever holds ASCII digits.
pub fn apply_wager_edit(input: &str, edit: WagerEdit) -> String {
    let current = input.parse::<u64>().unwrap_or(0);
    match edit {
        WagerEdit::Digit(d) => {
            let Some(c) = char::from_digit(d, 10) else {
                return input.to_string();
            };
            if input.is_empty() || input == "0" {
                c.to_string()
            } else if input.len() >= MAX_WAGER_DIGITS {
                input.to_string()
            } else {
                format!("{input}{c}")
            }
        }
        WagerEdit::Backspace => {
            let mut out = input.to_string();
            out.pop();
            out
        }
        WagerEdit::Increment => current.saturating_add(1).to_string(),
        WagerEdit::Decrement => current.saturating_sub(1).to_string(),
    }
}

type Engine = SpinEngine<FileStore, RandomSymbols<StdRng>>;

pub struct AppController {
    engine: Engine,
    wager_input: String,
    state_file: PathBuf,
}

impl AppController {
    pub fn new(config: &AppConfig) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>)> {
        config.game.validate().wrap_err("invalid game configuration")?;
        let store = FileStore::open(&config.state_file)?;
        let ledger = Ledger::load(
            store,
            config.game.storage_key.clone(),
            config.game.default_balance,
        );
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let symbols = RandomSymbols::new(rng, config.game.trophy_probability);
        let jukebox = Jukebox::new(audio::open_sink(config.mute, &config.sounds_dir));
        let (engine, events) =
            SpinEngine::new(config.game.clone(), ledger, symbols, jukebox);
        info!(
            state_file = %config.state_file.display(),
            balance = engine.balance(),
            "balance loaded"
        );
        let controller = Self {
            engine,
            wager_input: config.initial_wager.to_string(),
            state_file: config.state_file.clone(),
        };
        Ok((controller, events))
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let reels = self.engine.reels().to_vec();
        let stopped = (0..reels.len())
            .map(|reel| self.engine.reel_stopped(reel))
            .collect();
        AppSnapshot {
            reels,
            stopped,
            phase: self.engine.phase(),
            balance: self.engine.balance(),
            wager_input: self.wager_input.clone(),
            status: self.engine.message().to_string(),
            last_settlement: self.engine.last_settlement().cloned(),
            state_file: self.state_file.display().to_string(),
        }
    }

    pub fn note_interaction(&mut self) {
        self.engine.note_interaction();
    }

    pub fn spin(&mut self) {
        let raw = self.wager_input.parse::<f64>().unwrap_or(0.0);
        match self.engine.start_spin(raw) {
            Ok(spin) => info!(spin, "spin triggered"),
            Err(SpinRejection::Busy) => {}
            Err(rejection) => info!(%rejection, "spin refused"),
        }
    }

    pub fn max_wager(&mut self) {
        self.wager_input = (self.engine.max_wager() as u64).to_string();
    }

    pub fn edit_wager(&mut self, edit: WagerEdit) {
        self.wager_input = apply_wager_edit(&self.wager_input, edit);
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if let Some(settlement) = self.engine.handle(event) {
            info!(message = %settlement.message(), "settled");
        }
    }
}

pub fn init_tracing(log_file: &Path) -> Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| eyre!("log file path has no file name: {}", log_file.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, file_name));
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (mut controller, engine_events) = AppController::new(&config)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        &mut controller,
        engine_events,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    controller: &mut AppController,
    mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    tracing::info!("Running app loop");
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            maybe_event = engine_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("engine event channel closed");
                    break;
                };
                controller.handle_engine_event(event);
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                if ui::is_key_press(&event) {
                    controller.note_interaction();
                }
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Spin => controller.spin(),
                    ui::UserEvent::MaxWager => controller.max_wager(),
                    ui::UserEvent::EditWager(edit) => controller.edit_wager(edit),
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("redraw failed")?;
    }
    Ok(())
}
