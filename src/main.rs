use clap::Parser;
use color_eyre::Result;
use dayplanner::{
    Config, Database, Profile,
    cli::{self, Cli, Context},
};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => Config::get_config_path(profile)?,
    };
    let config = Config::load_from_path(&config_path)?;

    let data_dir = config.data_dir(profile)?;
    init_tracing(cli.verbose, &config.log_level, &data_dir.join("logs"))?;

    // Migration failures abort startup
    let db = Database::new(data_dir.join(dayplanner::utils::DB_FILENAME))?;

    let ctx = Context {
        db: &db,
        config: &config,
        data_dir: &data_dir,
        config_path: &config_path,
    };
    cli::run(cli.command, &ctx)?;

    Ok(())
}

/// Log to stderr (verbosity flags or RUST_LOG) and to `<data-dir>/logs/dayplanner.log`
fn init_tracing(verbose: u8, file_level: &str, log_dir: &Path) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug,rusqlite=info"),
        _ => EnvFilter::new("trace"),
    });
    let file_filter = EnvFilter::try_new(file_level).unwrap_or_else(|_| EnvFilter::new("info"));

    std::fs::create_dir_all(log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("dayplanner.log"))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(file_filter),
        )
        .init();

    Ok(())
}
