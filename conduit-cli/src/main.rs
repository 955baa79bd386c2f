use anyhow::Result;
use clap::{Parser, Subcommand};

mod banner;
mod commands;

#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about = "Bootstrap and manage a local Conduit deployment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a local Conduit deployment
    Setup {
        /// Profiles to enable (exactly one database profile required)
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<String>,

        /// Project name, also the created directory name
        #[arg(long, default_value = "conduit")]
        project_name: String,

        /// Conduit image tag
        #[arg(long, default_value = "latest")]
        image_tag: String,

        /// Conduit UI image tag
        #[arg(long, default_value = "latest")]
        ui_image_tag: String,

        /// Bind the database data directory to ./database/ instead of a
        /// named volume
        #[arg(long)]
        mount_database: bool,

        /// Run containers in the background
        #[arg(long)]
        detach: bool,
    },

    /// Start an existing deployment, optionally enabling more profiles
    Start {
        /// Additional profiles to enable and persist
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<String>,

        /// Run containers in the background
        #[arg(long)]
        detach: bool,
    },

    /// Stop services of the current deployment
    Stop {
        /// Services to stop (all active services when omitted)
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,
    },

    /// Remove services' containers and volumes
    Rm {
        /// Services to remove (all active services when omitted)
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,
    },

    /// Print the resolved compose document
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        commands::fatal(&e);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Setup {
            profiles,
            project_name,
            image_tag,
            ui_image_tag,
            mount_database,
            detach,
        } => {
            banner::print();
            commands::setup::run(
                profiles,
                project_name,
                image_tag,
                ui_image_tag,
                mount_database,
                detach,
            )
            .await?;
        }

        Commands::Start { profiles, detach } => {
            banner::print();
            commands::start::run(profiles, detach).await?;
        }

        Commands::Stop { services } => {
            commands::stop::run(services).await?;
        }

        Commands::Rm { services } => {
            commands::rm::run(services).await?;
        }

        Commands::Config => {
            commands::config::run().await?;
        }
    }

    Ok(())
}
