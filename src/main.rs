use clap::Parser;
use identity_session::commands::{Commands, handle_command};
use identity_session::{Config, Server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "identity-session")]
#[command(about = "OAuth identity resolution and session token service")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    match cli.command {
        None | Some(Commands::Serve) => {}
        Some(command) => {
            if let Err(e) = handle_command(command, &config).await {
                error!("Command failed: {}", e);
                std::process::exit(1);
            }
            return;
        }
    }

    info!("Starting identity session service");

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
