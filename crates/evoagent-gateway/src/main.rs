use clap::Parser;
use tracing_subscriber::EnvFilter;

use evoagent_domain::config::Config;
use evoagent_gateway::cli::{load_config, Cli, Command, ConfigCommand};
use evoagent_gateway::state::AppState;
use evoagent_gateway::{api, cli, doctor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = load_config()?;
            run_server(config).await
        }
        Some(Command::Doctor) => {
            let (config, _config_path) = load_config()?;
            if !doctor::run(&config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = load_config()?;
            cli::show(&config);
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (_config, config_path) = load_config()?;
            if !cli::validate(&config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,evoagent_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("evoagent-gateway starting");

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::build(config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "evoagent-gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}
