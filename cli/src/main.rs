use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use snapgram::config::{ConfigError, SessionConfig, parse_api_url};
use snapgram::net::api::{ApiClient, ApiError};
use snapgram::net::auth::{AuthApi, failure_message};
use snapgram::net::types::{CredentialPair, LoginPayload, RegisterPayload, User};
use snapgram::session::{self, LoginError, SessionState, SessionStore, use_session};
use snapgram::storage::FileTokenStorage;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("api client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Rejected(String),
    #[error("login failed: {0}")]
    Login(#[from] LoginError),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("missing password; pass --password or set SNAPGRAM_PASSWORD")]
    MissingPassword,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "snapgram", about = "Snapgram session CLI")]
struct Cli {
    /// API base URL, e.g. `http://127.0.0.1:8000/api`.
    #[arg(long, env = "SNAPGRAM_API_URL")]
    api_url: Option<String>,

    /// File holding the persisted token pair.
    #[arg(long, env = "SNAPGRAM_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with username/email and password.
    Login {
        #[arg(long)]
        username_or_email: String,
        #[arg(long, env = "SNAPGRAM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in with an already issued token pair.
    LoginToken {
        #[arg(long)]
        access: String,
        #[arg(long)]
        refresh: String,
    },
    /// Create an account, signing in when the server returns tokens.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, env = "SNAPGRAM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Erase the stored tokens.
    Logout,
    /// Print the signed-in user as JSON.
    Whoami,
    /// Print the session phase.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to load .env: {e}");
        }
    }
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(api_url = %config.api_url, token_file = %config.token_file.display(), "session config loaded");

    let storage = Arc::new(FileTokenStorage::new(&config.token_file));
    let client = ApiClient::new(&config, storage.clone())?;
    let api = AuthApi::new(client, &config.refresh_path);
    let store = SessionStore::new(storage, Arc::new(api.clone()), config.refresh_policy);

    session::provide(store, run(&api, cli.command)).await
}

fn load_config(cli: &Cli) -> Result<SessionConfig, CliError> {
    let mut config = SessionConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = parse_api_url(url)?;
    }
    if let Some(path) = &cli.token_file {
        config.token_file.clone_from(path);
    }
    Ok(config)
}

async fn run(api: &AuthApi, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { username_or_email, password } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let payload = LoginPayload { username_or_email, password };
            let pair = api
                .obtain_token(&payload)
                .await
                .map_err(|e| CliError::Rejected(failure_message(&e)))?;
            sign_in(pair).await
        }
        Command::LoginToken { access, refresh } => sign_in(CredentialPair { access, refresh }).await,
        Command::Register { username, password, email, full_name } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let payload = RegisterPayload { username, confirm_password: password.clone(), password, email, full_name };
            let registered = api
                .register(&payload)
                .await
                .map_err(|e| CliError::Rejected(failure_message(&e)))?;
            match registered.token {
                Some(pair) => sign_in(pair).await,
                None => {
                    println!("registered {}; sign in with `snapgram login`", registered.username);
                    Ok(())
                }
            }
        }
        Command::Logout => {
            use_session().logout();
            println!("signed out");
            Ok(())
        }
        Command::Whoami => match use_session().ready().await {
            SessionState::Authenticated(user) => print_user(&user),
            _ => Err(CliError::NotAuthenticated),
        },
        Command::Status => {
            let state = use_session().ready().await;
            match state.user() {
                Some(user) => println!("{} as {}", state.phase(), user.username),
                None => println!("{}", state.phase()),
            }
            Ok(())
        }
    }
}

async fn sign_in(pair: CredentialPair) -> Result<(), CliError> {
    let user = use_session().login(pair).await?;
    print_user(&user)
}

fn print_user(user: &User) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}
