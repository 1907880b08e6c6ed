use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use chatrelay::connector::api::server;
use chatrelay::{Commands, Container, ContainerConfig, GenerationSettings, Router};

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, default_value = "~/.chatrelay")]
    data_dir: String,

    /// Keep users and messages in memory instead of DuckDB
    #[arg(long, global = true)]
    memory_storage: bool,

    /// Answer from a local echo backend; no Azure credentials needed
    #[arg(long, global = true)]
    mock_backend: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = expand_tilde(&cli.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let container = Container::new(ContainerConfig {
        data_dir,
        memory_storage: cli.memory_storage,
        mock_backend: cli.mock_backend,
        generation: GenerationSettings::default(),
    })
    .await?;

    if let Commands::Serve { port, public } = cli.command {
        return server::serve(Arc::new(container), port, public).await;
    }

    let router = Router::new(&container);
    let output = router.route(cli.command).await?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn chat_flags_parse() {
        let cli = Cli::try_parse_from([
            "chatrelay",
            "--mock-backend",
            "chat",
            "hello",
            "-m",
            "o3",
            "-r",
            "high",
            "--developer",
            "be brief",
            "-s",
        ])
        .unwrap();

        assert!(cli.mock_backend);
        match cli.command {
            Commands::Chat {
                message,
                model,
                reasoning_effort,
                developer,
                stream,
                ..
            } => {
                assert_eq!(message, "hello");
                assert_eq!(model.as_deref(), Some("o3"));
                assert_eq!(reasoning_effort.as_deref(), Some("high"));
                assert_eq!(developer.as_deref(), Some("be brief"));
                assert!(stream);
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn serve_defaults_to_local_port_8080() {
        let cli = Cli::try_parse_from(["chatrelay", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                port: 8080,
                public: false
            }
        ));
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/relay"), "/tmp/relay");
    }
}
