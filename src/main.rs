use clap::Parser;
use std::path::Path;
use std::process;
use topoprobe::cli::{commands, Cli};
use topoprobe::config::Config;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

fn load_config(path: Option<&Path>) -> topoprobe::Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)
        }
        None => {
            debug!("No configuration file given, using built-in defaults");
            Ok(Config::default())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
        process::exit(1);
    }

    let Some(command) = cli.command else {
        eprintln!("No command specified. Use --help for usage information.");
        process::exit(2);
    };

    info!("topoprobe v{}", topoprobe::VERSION);

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => commands::handle_command(command, config, cli.host).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.topology().unwrap().probes.is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, "agent:\n  topology:\n    probes: [docker]\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();

        assert_eq!(config.topology().unwrap().probes, vec!["docker"]);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.yml").as_path())).is_err());
    }
}
