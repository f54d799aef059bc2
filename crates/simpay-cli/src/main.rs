//! SimPay - terminal shell for the SimPay client core.
//!
//! Drives the same session and feed logic the mobile screens use: restore on
//! launch, login, account creation, logout and the home feed.

mod app;

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use simpay_core::api::AuthFailure;
use simpay_core::auth::{AuthOutcome, SessionStatus};
use simpay_core::config::Config;
use simpay_core::feed::{FeedCacheState, FeedCondition, RefreshOutcome};

use app::App;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "simpay.log";

const USAGE: &str = "\
Usage: simpay [--verbose] <command>

Commands:
  status            Show the restored session
  login [subject]   Sign in with a CPF or e-mail
  signup [subject]  Create an account and sign in
  logout            Sign out and forget the stored session
  feed              Show the home feed (cached first, then refreshed)";

/// Initialize the tracing subscriber.
///
/// Logs go to a daily file in the cache directory; `--verbose` adds stderr.
/// Use RUST_LOG to control the level (e.g., RUST_LOG=simpay_core=debug).
fn init_tracing(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Login,
    Signup,
    Logout,
    Feed,
    Help,
}

impl Command {
    /// No command means `status`.
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg.unwrap_or("status") {
            "status" => Ok(Command::Status),
            "login" => Ok(Command::Login),
            "signup" => Ok(Command::Signup),
            "logout" => Ok(Command::Logout),
            "feed" => Ok(Command::Feed),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => anyhow::bail!("Unknown command: {}\n\n{}", other, USAGE),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = match args.iter().position(|a| a == "--verbose" || a == "-v") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    let log_dir = Config::default().cache_dir().ok();
    let _guard = init_tracing(log_dir.as_deref(), verbose);
    info!(command = ?args.first(), "SimPay starting");

    // Errors return through main so the log guard flushes on drop
    let command = Command::parse(args.first().map(String::as_str))?;
    let subject = args.get(1).cloned();
    let mut app = App::new()?;

    // Every command starts from the restored launch state
    app.session.restore().await;

    match command {
        Command::Status => print_status(&app),
        Command::Login => {
            let subject = match subject {
                Some(s) => s,
                None => prompt_subject(app.config.last_subject_id.as_deref())?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let outcome = app.session.sign_in(&subject, &password).await;
            app.remember_subject(&outcome);
            print_auth_outcome(&outcome);
        }
        Command::Signup => {
            let subject = match subject {
                Some(s) => s,
                None => prompt_subject(None)?,
            };
            let password = rpassword::prompt_password("Choose a password: ")?;
            let outcome = app.session.sign_up(&subject, &password).await;
            app.remember_subject(&outcome);
            print_auth_outcome(&outcome);
        }
        Command::Logout => {
            app.session.sign_out().await;
            println!("Signed out.");
        }
        Command::Feed => {
            if !app.session.is_authenticated() {
                println!("Not signed in. Run `simpay login` first.");
                return Ok(());
            }
            let (outcome, state) = app.load_feed().await;
            print_feed(&outcome, &state);
        }
        Command::Help => println!("{}", USAGE),
    }

    info!("SimPay shutting down");
    Ok(())
}

fn prompt_subject(default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("CPF or e-mail [{}]: ", d),
        None => print!("CPF or e-mail: "),
    }
    io::stdout().flush()?;

    let mut subject = String::new();
    io::stdin().read_line(&mut subject)?;
    let subject = subject.trim();
    if subject.is_empty() {
        if let Some(d) = default {
            return Ok(d.to_string());
        }
        anyhow::bail!("A CPF or e-mail is required");
    }
    Ok(subject.to_string())
}

fn print_status(app: &App) {
    let state = app.session.state();
    match (state.status(), state.identity()) {
        (SessionStatus::Authenticated, Some(identity)) => {
            println!("Signed in as {} ({})", identity.greeting_name(), identity.subject_id);
        }
        _ => println!("Not signed in."),
    }
}

fn print_auth_outcome(outcome: &AuthOutcome) {
    match outcome {
        AuthOutcome::Authenticated(identity) => {
            println!("Olá, {}!", identity.greeting_name());
        }
        AuthOutcome::Failed(AuthFailure::Network) => {
            println!("Could not reach the server. Check your connection and try again.");
        }
        AuthOutcome::Failed(failure) => println!("{}", failure),
        AuthOutcome::Busy => println!("Another sign-in is already in progress."),
    }
}

fn print_feed(outcome: &RefreshOutcome, state: &FeedCacheState) {
    match state.condition() {
        FeedCondition::Empty => println!("Nothing in your feed yet."),
        FeedCondition::EmptyWithError | FeedCondition::Loading => {
            if let Some(error) = &state.last_error {
                println!("Could not load the feed: {}", error);
            }
        }
        condition => {
            if condition == FeedCondition::StaleWithError {
                let age = state.age_display().unwrap_or_else(|| "earlier".to_string());
                println!("Offline - showing the feed saved {}.", age);
            }
            for entry in &state.entries {
                println!(
                    "{}  {}\n    {}",
                    entry.created_at.format("%d/%m %H:%M"),
                    entry.title,
                    entry.subtitle
                );
            }
        }
    }
    if *outcome == RefreshOutcome::Updated {
        info!(entries = state.entries.len(), "Feed updated");
    }
}
