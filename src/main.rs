//! coursetrack - Course catalog CLI
//!
//! Main entry point for the coursetrack CLI.

use clap::{Parser, Subcommand};
use coursetrack::commands::{self, App};
use coursetrack::config::AppConfig;
use std::path::Path;
use std::process;

/// coursetrack - Browse courses and manage enrollment
#[derive(Parser, Debug)]
#[command(name = "coursetrack")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/coursetrack/config.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Create a session for an email
    Login {
        /// Account email
        email: String,
    },

    /// Clear the stored session
    Logout,

    /// Show who is logged in
    Whoami,

    /// List courses
    Courses {
        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(short, long, default_value = "10")]
        limit: u32,

        /// Full-text search term
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show a course with its lessons and enrollment state
    Show {
        /// Course id
        id: i64,
    },

    /// Enroll in a course
    Enroll {
        /// Course id
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = coursetrack::logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> coursetrack::Result<()> {
    // Init only writes the config file; nothing else needs to be wired up
    if let Commands::Init = cli.command {
        return commands::init(cli.config.as_deref());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load(Path::new(path))?,
        None => AppConfig::load_default()?,
    };

    let app = App::build(&config)?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Login { email } => commands::login(&app, &email),
        Commands::Logout => commands::logout(&app),
        Commands::Whoami => commands::whoami(&app),
        Commands::Courses { page, limit, query } => {
            commands::courses(&app, page, limit, query.as_deref()).await
        }
        Commands::Show { id } => commands::show(&app, id).await,
        Commands::Enroll { id } => commands::enroll(&app, id).await,
    }
}
