//! zamtory - command line front end for the zamtory session core.
//!
//! Signs in against the zamtory auth endpoint (or the built-in mock), shows
//! the current session, and can keep a session alive in the foreground
//! while the automatic refresh timer runs.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zamtory_core::{Config, Credentials, SessionEvent, SessionManager, SessionState, UserRecord};

// ============================================================================
// Constants
// ============================================================================

/// Rolling log file prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "zamtory.log";

const USAGE: &str = "\
Usage: zamtory [--mock] <command> [options]

Commands:
  login [--email <email>] [--remember]   Sign in (password is prompted)
  status [--json]                        Show the current session
  refresh                                Exchange the stored refresh token
  logout                                 Sign out and clear stored tokens
  watch                                  Keep the session alive until Ctrl-C

Options:
  --mock    Use mock authentication (no network)";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by RUST_LOG (default "warn"). When a log
/// directory is configured, a daily rolling file gets the same events; the
/// returned guard must outlive the program's logging.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[derive(Debug, PartialEq)]
enum Command {
    Login { email: Option<String>, remember: bool },
    Status { json: bool },
    Refresh,
    Logout,
    Watch,
    Help,
}

/// Parse arguments (without the program name). Returns the command and
/// whether `--mock` was given.
fn parse_args(args: &[String]) -> Result<(Command, bool)> {
    let mock = args.iter().any(|a| a == "--mock");
    let mut rest = args.iter().filter(|a| *a != "--mock");

    let command = match rest.next().map(String::as_str) {
        None | Some("help") | Some("--help") | Some("-h") => Command::Help,
        Some("login") => {
            let mut email = None;
            let mut remember = false;
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--email" => {
                        let value = rest.next().context("--email needs a value")?;
                        email = Some(value.clone());
                    }
                    "--remember" => remember = true,
                    other => bail!("Unknown login option: {}", other),
                }
            }
            Command::Login { email, remember }
        }
        Some("status") => {
            let mut json = false;
            for arg in rest {
                match arg.as_str() {
                    "--json" => json = true,
                    other => bail!("Unknown status option: {}", other),
                }
            }
            Command::Status { json }
        }
        Some("refresh") => Command::Refresh,
        Some("logout") => Command::Logout,
        Some("watch") => Command::Watch,
        Some(other) => bail!("Unknown command: {}\n\n{}", other, USAGE),
    };
    Ok((command, mock))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, mock) = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    if mock {
        config.use_mock_authentication = true;
    }

    let _log_guard = init_tracing(&config);
    info!(command = ?command, mock = config.use_mock_authentication, "zamtory starting");

    let session = SessionManager::from_config(&config)?;

    match command {
        Command::Login { email, remember } => login(&session, email, remember).await,
        Command::Status { json } => status(&session, json).await,
        Command::Refresh => refresh(&session).await,
        Command::Logout => logout(&session).await,
        Command::Watch => watch(&session).await,
        Command::Help => Ok(()),
    }
}

async fn login(session: &SessionManager, email: Option<String>, remember: bool) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    let user = session
        .login(&Credentials::new(email, password, remember))
        .await?;

    println!("Signed in as {}", user.display_label());
    if !remember {
        println!("Session not remembered; it ends when this process exits.");
    }
    Ok(())
}

async fn status(session: &SessionManager, json: bool) -> Result<()> {
    session.check_auth().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
        return Ok(());
    }

    match session.user() {
        Some(user) => print_user(&user),
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn refresh(session: &SessionManager) -> Result<()> {
    session.refresh().await?;
    match session.user() {
        Some(user) => println!("Session refreshed for {}", user.display_label()),
        None => println!("Session refreshed"),
    }
    Ok(())
}

async fn logout(session: &SessionManager) -> Result<()> {
    // Attach the stored token so the remote logout is authenticated
    session.check_auth().await;
    session.logout().await;
    println!("Signed out");
    Ok(())
}

async fn watch(session: &SessionManager) -> Result<()> {
    let mut state = session.subscribe();
    let mut events = session.events();

    session.check_auth().await;
    print_state(&state.borrow_and_update());
    if !session.is_authenticated() {
        return Ok(());
    }
    println!("Watching session, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving session in place");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&state.borrow_and_update());
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Refreshed(user)) => {
                    println!(
                        "[{}] Token refreshed for {}",
                        chrono::Local::now().format("%H:%M:%S"),
                        user.display_label()
                    );
                }
                Ok(SessionEvent::Expired) => {
                    println!("Session expired, sign in again");
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn print_state(state: &SessionState) {
    if state.is_loading {
        println!("Checking session...");
        return;
    }
    match state.user {
        Some(ref user) => print_user(user),
        None => println!("Not signed in"),
    }
}

fn print_user(user: &UserRecord) {
    println!("Signed in as {} <{}>", user.display_label(), user.email);
    println!("  User id:      {}", user.id);
    println!("  Member since: {}", user.created_at.format("%Y-%m-%d"));
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}
