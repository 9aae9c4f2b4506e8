mod app;
mod cli;
mod clipboard;
mod error;
mod output;
mod screens;
mod shell;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use cli::Command;
use opend::{CaptureOutcome, Clipboard, Principal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use app::{App, AppConfig};
use error::{AppError, Result};
use output::{Message, StatusView};
use screens::collection::CollectionScreen;
use screens::discover::{DiscoverFilter, DiscoverScreen, RankingPolicy};
use screens::login::LoginScreen;
use screens::mint::MintScreen;
use screens::quiz::QuizScreen;
use screens::saved::SavedScreen;
use screens::upvoted::UpvotedScreen;
use screens::wallet::WalletScreen;
use shell::{Route, Shell, StackScreen, Tab, Target};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenvy::dotenv(); // load .env if present

    let cancel = setup_signal_handlers();

    if let Err(e) = run(cli.command, cli.json, cancel).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(command: Command, json: bool, cancel: CancellationToken) -> Result<()> {
    let app = App::terminal(AppConfig::from_env()?);
    let state = app.start().await?;

    match command {
        Command::Login => {
            let screen = LoginScreen::new(app.bridge.clone(), &app.config.opend);
            output::stdout(&screen.login().await?, json)
        }

        Command::Callback { url } => match app.bridge.capture_callback(&url).await? {
            CaptureOutcome::Authenticated(principal) => {
                output::stdout(&Message::new(format!("Logged in as {principal}")), json)
            }
            CaptureOutcome::Duplicate => output::stdout(&Message::new("Callback already used"), json),
            CaptureOutcome::Ignored => Err(AppError::InvalidInput(format!(
                "not an auth callback for scheme {}: {url}",
                app.config.opend.app_scheme
            ))),
        },

        Command::Logout => {
            app.bridge.logout().await?;
            output::stdout(&Message::new("Logged out"), json)
        }

        Command::Whoami { copy } => {
            let principal = app.bridge.principal().ok_or(AppError::NotLoggedIn)?;
            if copy {
                app.platform.clipboard.copy(&principal.to_text())?;
            }
            output::stdout(&Message::new(principal.to_text()), json)
        }

        Command::Status => {
            let route = Shell::route(&state);
            let cycles = match route {
                Route::Main(_) => match app.context()?.market.cycles_status().await {
                    Ok(c) => Some(c),
                    Err(e) => {
                        warn!(error = %e, "failed to load cycles status");
                        None
                    }
                },
                _ => None,
            };
            output::stdout(&StatusView::new(route, &app.bridge.state(), cycles), json)
        }

        Command::Watch { interval_secs } => {
            gate(&app, Target::default())?;
            let watchdog = app
                .bridge
                .spawn_session_watchdog(Duration::from_secs(interval_secs.max(1)), cancel.clone());
            let mut states = app.bridge.subscribe();
            info!("watching session; Ctrl-C to stop");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = states.borrow_and_update().clone();
                        if !next.is_authenticated() {
                            output::stdout(&StatusView::new(Shell::route(&next), &next, None), json)?;
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
            if let Err(e) = watchdog.await {
                warn!(error = %e, "session watchdog task failed");
            }
            Ok(())
        }

        Command::Discover { recommended } => {
            gate(&app, Target::Tab(Tab::Discover))?;
            let screen = DiscoverScreen::new(app.context()?, RankingPolicy::default());
            screen.load().await;
            let filter = if recommended {
                DiscoverFilter::Recommended
            } else {
                DiscoverFilter::All
            };
            output::stdout(&screen.set_filter(filter), json)
        }

        Command::Buy { id } => {
            let id = discover_target(&app, &id)?;
            let screen = DiscoverScreen::new(app.context()?, RankingPolicy::default());
            screen.load().await;
            screen.buy(&id).await?;
            output::stdout(&screen.view(), json)
        }

        Command::Save { id } => {
            let id = discover_target(&app, &id)?;
            let screen = DiscoverScreen::new(app.context()?, RankingPolicy::default());
            screen.load().await;
            let saved = screen.toggle_save(&id).await?;
            let text = if saved { "Saved" } else { "Removed from saved" };
            output::stdout(&Message::new(text), json)
        }

        Command::Upvote { id } => {
            let id = discover_target(&app, &id)?;
            let screen = DiscoverScreen::new(app.context()?, RankingPolicy::default());
            screen.load().await;
            let outcome = screen.toggle_upvote(&id).await?;
            output::stdout(&Message::new(format!("{outcome:?}")), json)
        }

        Command::Collection => {
            gate(&app, Target::Tab(Tab::Collection))?;
            let screen = CollectionScreen::new(app.context()?);
            output::stdout(&screen.load().await, json)
        }

        Command::Sell { id, price } => {
            gate(&app, Target::Tab(Tab::Collection))?;
            let id = screens::parse_principal(&id)?;
            let screen = CollectionScreen::new(app.context()?);
            screen.load().await;
            screen.sell(&id, price).await?;
            output::stdout(&screen.view(), json)
        }

        Command::Saved => {
            gate(&app, Target::Stack(StackScreen::Saved))?;
            output::stdout(&SavedScreen::new(app.context()?).load().await, json)
        }

        Command::Unsave { id } => {
            gate(&app, Target::Stack(StackScreen::Saved))?;
            let id = screens::parse_principal(&id)?;
            SavedScreen::new(app.context()?).unsave(&id).await?;
            output::stdout(&Message::new("Removed from saved"), json)
        }

        Command::Upvoted => {
            gate(&app, Target::Stack(StackScreen::Upvoted))?;
            output::stdout(&UpvotedScreen::new(app.context()?).load().await, json)
        }

        Command::Mint { name, image } => {
            gate(&app, Target::Tab(Tab::Mint))?;
            let bytes = tokio::fs::read(&image).await?;
            let screen = MintScreen::new(app.context()?);
            let result = screen.mint(&name, bytes, mime_type(&image)).await;
            output::stdout(&screen.view(), json)?;
            result.map(|_| ())
        }

        Command::Wallet => {
            gate(&app, Target::Tab(Tab::Wallet))?;
            output::stdout(&WalletScreen::new(app.context()?).load().await, json)
        }

        Command::Transfer { to, amount } => {
            gate(&app, Target::Tab(Tab::Wallet))?;
            let screen = WalletScreen::new(app.context()?);
            let result = screen.transfer(&to, amount).await;
            output::stdout(&screen.view(), json)?;
            result
        }

        Command::Faucet => {
            gate(&app, Target::Tab(Tab::Wallet))?;
            let screen = WalletScreen::new(app.context()?);
            let result = screen.faucet().await;
            output::stdout(&screen.view(), json)?;
            result
        }

        Command::Quiz => {
            gate(&app, Target::Tab(Tab::Quiz))?;
            output::stdout(&QuizScreen::new(app.context()?).load().await, json)
        }

        Command::QuizClaim => {
            gate(&app, Target::Tab(Tab::Quiz))?;
            let screen = QuizScreen::new(app.context()?);
            let result = screen.claim().await;
            if let Ok(0) = result {
                return output::stdout(&Message::new("No points to claim"), json);
            }
            output::stdout(&screen.view(), json)?;
            result.map(|_| ())
        }

        Command::QuizOpen => {
            gate(&app, Target::Tab(Tab::Quiz))?;
            let url = QuizScreen::new(app.context()?).open_quiz().await?;
            output::stdout(&Message::new(url), json)
        }
    }
}

/// Refuse to run a screen command unless the shell would show that screen.
fn gate(app: &App, target: Target) -> Result<()> {
    match Shell::resolve(&app.bridge.state(), target) {
        Route::Main(_) | Route::Stack(_) => Ok(()),
        Route::Splash | Route::Login => Err(AppError::NotLoggedIn),
    }
}

fn discover_target(app: &App, id: &str) -> Result<Principal> {
    gate(app, Target::Tab(Tab::Discover))?;
    screens::parse_principal(id)
}

fn mime_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("received SIGTERM, shutting down");
                    cancel_clone.cancel();
                }
                Err(e) => warn!(error = %e, "failed to register SIGTERM handler"),
            }
        });
    }

    cancel
}
