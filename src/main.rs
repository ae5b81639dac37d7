use clap::Parser;
use log::{debug, error, info};

use trackplay::cli::Args;
use trackplay::config;
use trackplay::runner;

fn main() {
    let args = Args::parse();
    init_logging(&args);

    info!("trackplay {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    if let Err(e) = runner::run_app(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
        if let Err(e) = config::ensure_dirs(&path_config) {
            eprintln!("Warning: Failed to create application directories: {}", e);
        }
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, &path_config));

        match std::fs::File::create(&log_path) {
            Ok(file) => {
                env_logger::Builder::new()
                    .filter_level(log_level)
                    .format_timestamp_millis()
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .init();
                info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
                return;
            }
            Err(e) => eprintln!("Warning: cannot create log file {}: {}", log_path.display(), e),
        }
    }

    // stderr, so stdout stays pure JSON lines; RUST_LOG wins if set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();
}
