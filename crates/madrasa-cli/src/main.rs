mod banner;
mod migrate;
mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use madrasa_common::Role;
use madrasa_config::{AppConfig, ConfigLoader};
use madrasa_db::Database;
use madrasa_gateway::GatewayServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "madrasa", version, about = "Madrasa Masala API and schema tools")]
struct Cli {
    /// Configuration directory (default: ~/.madrasa)
    #[arg(long, global = true, env = "MADRASA_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Bring the database schema up to date
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create an account
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        phone: String,
        /// super_user, teacher or student
        #[arg(long)]
        role: Role,
        #[arg(long)]
        email: Option<String>,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new(cli.config_dir);
    let config = loader.load().context("failed to load configuration")?;
    init_tracing(&config);

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Migrate => {
            let db_path = config.database_path();
            let mut stdout = std::io::stdout().lock();
            let report = migrate::run_migration(&db_path, &mut stdout)?;
            if report.has_failures() {
                tracing::warn!(
                    failed = report.failed(),
                    "migration completed with failed steps"
                );
            }
            Ok(())
        }
        Command::User {
            command:
                UserCommand::Add {
                    first_name,
                    last_name,
                    phone,
                    role,
                    email,
                    password,
                },
        } => {
            let db = Database::open(&config.database_path()).context("failed to open database")?;
            let user = users::add_user(
                &db,
                users::AddUser {
                    first_name,
                    last_name,
                    phone,
                    role,
                    email,
                    password,
                },
            )?;
            println!("Created {} {} (id {})", user.role, user.full_name(), user.id);
            Ok(())
        }
    }
}

async fn serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let db_path = config.database_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    info!("database opened at {}", db_path.display());

    let pending = db.pending_migrations().map(|p| p.len()).unwrap_or(0);
    banner::print_banner(&config.gateway.host, config.gateway.port, &db_path, pending);

    GatewayServer::new(config, Arc::new(db))
        .run()
        .await
        .context("gateway server failed")
}
