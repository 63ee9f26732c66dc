use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

use carelink::config::Config;
use carelink::credentials::SqliteCredentials;
use carelink::db::init_db;
use carelink::registration::Registrar;
use carelink::store::SqliteStore;
use commands::{ConfigCommand, LoginCommand, RegisterCommand, UserCommand};

#[derive(Parser)]
#[command(name = "carelink")]
#[command(version)]
#[command(about = "Register primary users and link caregivers and elders", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register(RegisterCommand),

    /// Check an account's email and password
    Login(LoginCommand),

    /// Inspect registered users
    User(UserCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    carelink::logging::init("carelink=warn");

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Register(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let registrar = Registrar::new(
                Arc::new(SqliteCredentials::new(pool.clone())),
                Arc::new(SqliteStore::new(pool)),
            )
            .with_invite_code_attempts(config.invite_code_attempts.value);
            cmd.run(&registrar).await?;
        }
        Some(Commands::Login(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            cmd.run(&SqliteCredentials::new(pool)).await?;
        }
        Some(Commands::User(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let store = SqliteStore::new(pool);
            cmd.run(&store).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
