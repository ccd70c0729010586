//! oidc-session - drive the session engine against a real issuer.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use session_config_and_utils::{init_logging, AuthParams, Config, Paths};

/// Session engine command-line probe.
#[derive(Parser)]
#[command(name = "oidc-session")]
#[command(about = "Inspect and exercise an OIDC session against an issuer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and session files. Defaults to ~/.oidc-jwt
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Current page URL; a `token` parameter is picked up as the session token
    #[arg(long, global = true, default_value = "http://localhost/")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the startup sequence and print the session state
    Status,
    /// Print the access-token claims
    Token,
    /// Print the authorize URL
    AuthorizeUrl {
        /// Extra query parameter as key=value; repeatable
        #[arg(short, long = "param", value_parser = app::parse_param)]
        params: Vec<(String, String)>,
    },
    /// Print the logout URL
    LogoutUrl {
        /// Extra query parameter as key=value; repeatable
        #[arg(short, long = "param", value_parser = app::parse_param)]
        params: Vec<(String, String)>,
    },
    /// Keep the access token refreshed for a while, printing each state
    Monitor {
        /// How long to run
        #[arg(short, long, default_value_t = 60)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    // Initialize logging
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    let session = app::Session::open(&config, &paths, &cli.url)?;

    match cli.command {
        Commands::Status => app::status(&session).await?,
        Commands::Token => app::token(&session).await?,
        Commands::AuthorizeUrl { params } => {
            let params: AuthParams = params.into_iter().collect();
            println!("{}", session.engine().authorize_url(&params)?);
        }
        Commands::LogoutUrl { params } => {
            let params: AuthParams = params.into_iter().collect();
            println!("{}", session.engine().logout_url(&params)?);
        }
        Commands::Monitor { seconds } => app::monitor(&session, seconds).await?,
    }

    Ok(())
}
