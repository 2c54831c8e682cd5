use clap::{Arg, Command};
use hbac_config::hbac_log_client::{LogLevel, Logger};
use hbac_config::{dump_config, ConfigLoader, DEFAULT_CONFIG_PATH};

// Loads a pam_hbac style config file and prints the resolved record.
// Exits 1 when the load fails. The loader has already logged the failure.
fn main() {
    let matches = Command::new("hbac-config-dump")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .help("Path to config file")
                .default_value(DEFAULT_CONFIG_PATH)
                .index(1),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("DEBUG, INFO, NOTICE, WARN, ERROR, CRIT or ALERT")
                .default_value("INFO"),
        )
        .arg(
            Arg::new("console")
                .long("console")
                .help("Also write diagnostics as plain console lines")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map_or(DEFAULT_CONFIG_PATH, |s| s.as_str());
    let log_level = LogLevel::from_str(
        matches
            .get_one::<String>("log-level")
            .map_or("INFO", |s| s.as_str()),
    );
    let log_console = matches.get_flag("console");

    // Diagnostics go to stderr, stdout carries only the record
    tracing_subscriber::fmt()
        .with_max_level(log_level.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    let logger = Logger::new("hbac-config-dump".to_string(), log_level, log_console);

    match ConfigLoader::new().with_sink(&logger).load(config_path) {
        Ok(config) => {
            dump_config(Some(&config), &logger);
            println!("{}", config);
        }
        Err(_) => {
            dump_config(None, &logger);
            std::process::exit(1);
        }
    }
}
