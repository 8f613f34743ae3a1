//! Reservo CLI - run and administer the reservation service.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "reservo")]
#[command(about = "Reservo - reservation booking service")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check a running server
    Status {
        /// Port to probe (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// User management
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },

    /// Generate a pair of token signing secrets
    Secret,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    CreateUser {
        /// Display name (prompted if omitted)
        #[arg(long)]
        name: Option<String>,

        /// Email address (prompted if omitted)
        #[arg(long)]
        email: Option<String>,

        /// User role: user, manager, or admin
        #[arg(long, default_value = "user")]
        role: String,

        /// Password (prompted if omitted)
        #[arg(long, env = "RESERVO_NEW_USER_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Generate a random password
        #[arg(long, conflicts_with = "password")]
        generate_password: bool,
    },

    /// List all users
    ListUsers,

    /// Change a user's role
    SetRole {
        /// Email of the user
        #[arg(long)]
        email: String,

        /// New role: user, manager, or admin
        #[arg(long)]
        role: String,
    },

    /// Enable a user account
    Enable {
        /// Email of the user
        #[arg(long)]
        email: String,
    },

    /// Disable a user account
    Disable {
        /// Email of the user
        #[arg(long)]
        email: String,
    },

    /// Delete a user
    Delete {
        /// Email of the user to delete
        #[arg(long)]
        email: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration, including required secrets
    Validate,

    /// Print the config file path
    Path,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let production = reservo_core::Config::load_default()
        .is_ok_and(|c| c.server.environment.is_production());
    init_tracing(cli.verbose, cli.log_format == LogFormat::Json || production);

    match cli.command {
        Commands::Serve { port, bind } => {
            commands::run_serve(commands::serve::ServeArgs { port, bind }).await?;
        }

        Commands::Status { port } => {
            commands::run_status(port).await?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::CreateUser {
                        name,
                        email,
                        role,
                        password,
                        generate_password,
                    } => commands::admin::AdminAction::CreateUser {
                        name,
                        email,
                        role,
                        password,
                        generate_password,
                    },
                    AdminCommands::ListUsers => commands::admin::AdminAction::ListUsers,
                    AdminCommands::SetRole { email, role } => {
                        commands::admin::AdminAction::SetRole { email, role }
                    }
                    AdminCommands::Enable { email } => {
                        commands::admin::AdminAction::SetActive { email, active: true }
                    }
                    AdminCommands::Disable { email } => {
                        commands::admin::AdminAction::SetActive {
                            email,
                            active: false,
                        }
                    }
                    AdminCommands::Delete { email, yes } => {
                        commands::admin::AdminAction::Delete { email, yes }
                    }
                },
                data_dir,
            };
            commands::run_admin(args).await?;
        }

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(action)?;
        }

        Commands::Secret => {
            commands::run_secret();
        }
    }

    Ok(())
}
