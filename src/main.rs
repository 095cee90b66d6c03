use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use mk_slots::{
    GameConfig,
    audio,
    storage,
};
use std::path::{
    Path,
    PathBuf,
};

mod client;
mod ui;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: mk-slots [--state-file <path>] [--log-file <path>] [--sounds-dir <path>]\n\
         [--config <path>] [--seed <u64>] [--wager <n>] [--mute]\n\
         \n\
         Flags:\n\
           --state-file <path>  Where the balance is persisted (default {})\n\
           --log-file <path>    Where logs are written (default {})\n\
           --sounds-dir <path>  Directory holding the audio cues (default {})\n\
           --config <path>      JSON file overriding reel count, odds and timings\n\
           --seed <u64>         Seed the symbol draws for a reproducible session\n\
           --wager <n>          Initial wager shown in the wager field (default {})\n\
           --mute               Disable all audio cues",
        storage::DEFAULT_STATE_FILE,
        client::DEFAULT_LOG_FILE,
        audio::DEFAULT_SOUNDS_DIR,
        client::DEFAULT_WAGER,
    );
    std::process::exit(0);
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn load_game_config(path: &Path) -> Result<GameConfig> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
    let config: GameConfig = serde_json::from_slice(&bytes)
        .wrap_err_with(|| format!("Failed to parse config {}", path.display()))?;
    config
        .validate()
        .wrap_err_with(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

fn parse_cli_args() -> Result<client::AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut state_file: Option<PathBuf> = None;
    let mut log_file: Option<PathBuf> = None;
    let mut sounds_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;
    let mut wager: Option<u64> = None;
    let mut mute = false;

    fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<()> {
        if slot.is_some() {
            return Err(eyre!("{flag} provided more than once"));
        }
        *slot = Some(value);
        Ok(())
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--state-file" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--state-file requires a path argument"))?;
                set_once(&mut state_file, expand_path(&path), "--state-file")?;
            }
            "--log-file" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--log-file requires a path argument"))?;
                set_once(&mut log_file, expand_path(&path), "--log-file")?;
            }
            "--sounds-dir" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--sounds-dir requires a path argument"))?;
                set_once(&mut sounds_dir, expand_path(&path), "--sounds-dir")?;
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--config requires a path argument"))?;
                set_once(&mut config_path, expand_path(&path), "--config")?;
            }
            "--seed" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--seed requires a number"))?;
                let value = raw
                    .parse::<u64>()
                    .wrap_err_with(|| format!("--seed expects an unsigned integer, got {raw}"))?;
                set_once(&mut seed, value, "--seed")?;
            }
            "--wager" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--wager requires a number"))?;
                let value = raw
                    .parse::<u64>()
                    .wrap_err_with(|| format!("--wager expects an unsigned integer, got {raw}"))?;
                set_once(&mut wager, value, "--wager")?;
            }
            "--mute" => {
                if mute {
                    return Err(eyre!("--mute provided more than once"));
                }
                mute = true;
            }
            "-h" | "--help" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let game = match config_path {
        Some(path) => load_game_config(&path)?,
        None => GameConfig::default(),
    };

    Ok(client::AppConfig {
        state_file: state_file.unwrap_or_else(|| PathBuf::from(storage::DEFAULT_STATE_FILE)),
        log_file: log_file.unwrap_or_else(|| PathBuf::from(client::DEFAULT_LOG_FILE)),
        sounds_dir: sounds_dir.unwrap_or_else(|| PathBuf::from(audio::DEFAULT_SOUNDS_DIR)),
        seed,
        initial_wager: wager.unwrap_or(client::DEFAULT_WAGER),
        mute,
        game,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_cli_args()?;
    let _log_guard = client::init_tracing(&app_config.log_file)?;
    tracing::info!(
        state_file = %app_config.state_file.display(),
        reels = app_config.game.reel_count,
        seeded = app_config.seed.is_some(),
        "starting mk-slots"
    );
    client::run_app(app_config).await
}
