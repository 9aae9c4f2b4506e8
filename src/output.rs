use std::fmt::Write as _;
use std::io::Write;

use chrono::DateTime;
use opend::types::{OriginalityLayer, OriginalityLayers};
use opend::{AuthState, CyclesStatus, Transaction};
use serde::Serialize;

use crate::error::Result;
use crate::screens::collection::CollectionView;
use crate::screens::discover::DiscoverView;
use crate::screens::login::LoginView;
use crate::screens::mint::MintView;
use crate::screens::quiz::QuizView;
use crate::screens::saved::SavedView;
use crate::screens::upvoted::UpvotedView;
use crate::screens::wallet::WalletView;
use crate::screens::NftCard;
use crate::shell::Route;

/// Plain-text rendering of a view.
pub trait Render {
    fn render(&self, buf: &mut String);
}

/// Write `view` as one JSON line or as text.
pub fn emit<W: Write, T: Serialize + Render>(view: &T, json: bool, writer: &mut W) -> Result<()> {
    let mut buf = String::new();
    if json {
        buf = serde_json::to_string(view)?;
        buf.push('\n');
    } else {
        view.render(&mut buf);
    }
    writer.write_all(buf.as_bytes())?;
    writer.flush()?;
    Ok(())
}

pub fn stdout<T: Serialize + Render>(view: &T, json: bool) -> Result<()> {
    emit(view, json, &mut std::io::stdout().lock())
}

/// One-line message, wrapped so it also renders as JSON.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Render for Message {
    fn render(&self, buf: &mut String) {
        let _ = writeln!(buf, "{}", self.message);
    }
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub route: Route,
    pub state: String,
    pub principal: Option<String>,
    pub cycles: Option<CyclesStatus>,
}

impl StatusView {
    pub fn new(route: Route, state: &AuthState, cycles: Option<CyclesStatus>) -> Self {
        let label = match state {
            AuthState::Uninitialized => "uninitialized".to_string(),
            AuthState::Restoring => "restoring".to_string(),
            AuthState::Authenticated { .. } => "authenticated".to_string(),
            AuthState::AwaitingCallback => "awaiting callback".to_string(),
            AuthState::Unauthenticated { error: None } => "logged out".to_string(),
            AuthState::Unauthenticated { error: Some(e) } => format!("logged out ({e})"),
        };
        Self {
            route,
            state: label,
            principal: state.principal().map(|p| p.to_text()),
            cycles,
        }
    }
}

impl Render for StatusView {
    fn render(&self, buf: &mut String) {
        let _ = writeln!(buf, "session\t{}", self.state);
        if let Some(p) = &self.principal {
            let _ = writeln!(buf, "principal\t{p}");
        }
        if let Some(c) = &self.cycles {
            let _ = writeln!(buf, "cycles\t{}", c.balance);
            let _ = writeln!(buf, "mint cost\t{}", c.required_for_mint);
            let _ = writeln!(buf, "can mint\t{}", c.can_mint);
        }
    }
}

fn render_cards(buf: &mut String, cards: &[NftCard]) {
    if cards.is_empty() {
        buf.push_str("(none)\n");
        return;
    }
    // TSV: id \t name \t owner \t price \t flags \t upvotes
    for c in cards {
        let mut flags = Vec::new();
        if c.is_owner {
            flags.push("own");
        }
        if c.saved {
            flags.push("saved");
        }
        if c.can_buy {
            flags.push("buy");
        }
        if c.can_sell {
            flags.push("sell");
        }
        let _ = writeln!(
            buf,
            "{}\t{}\t{}\t{}\t{}\t{}",
            c.id,
            c.name,
            c.owner,
            c.price_badge.as_deref().unwrap_or("-"),
            if flags.is_empty() { "-".to_string() } else { flags.join(",") },
            c.upvotes,
        );
    }
}

fn render_notes(buf: &mut String, error: &Option<String>, message: &Option<String>) {
    if let Some(m) = message {
        let _ = writeln!(buf, "{m}");
    }
    if let Some(e) = error {
        let _ = writeln!(buf, "error: {e}");
    }
}

impl Render for DiscoverView {
    fn render(&self, buf: &mut String) {
        render_cards(buf, &self.cards);
        render_notes(buf, &self.error, &self.message);
    }
}

impl Render for CollectionView {
    fn render(&self, buf: &mut String) {
        render_cards(buf, &self.cards);
        render_notes(buf, &self.error, &self.message);
    }
}

impl Render for SavedView {
    fn render(&self, buf: &mut String) {
        render_cards(buf, &self.cards);
    }
}

impl Render for UpvotedView {
    fn render(&self, buf: &mut String) {
        render_cards(buf, &self.cards);
    }
}

fn render_layer(buf: &mut String, layer: &Option<OriginalityLayer>) {
    let Some(l) = layer else { return };
    let verdict = match l.passed {
        Some(true) => "pass",
        Some(false) => "fail",
        None => "-",
    };
    let _ = write!(buf, "{}\t{verdict}", l.name);
    if let Some(score) = l.score_percent {
        let _ = write!(buf, "\t{score:.1}%");
    }
    if let Some(m) = &l.message {
        let _ = write!(buf, "\t{m}");
    }
    buf.push('\n');
}

fn render_layers(buf: &mut String, layers: &OriginalityLayers) {
    render_layer(buf, &layers.layer1);
    render_layer(buf, &layers.layer2);
    render_layer(buf, &layers.layer3);
}

impl Render for MintView {
    fn render(&self, buf: &mut String) {
        if let Some(layers) = &self.layers {
            render_layers(buf, layers);
        }
        if let Some(n) = &self.notice {
            let _ = writeln!(buf, "{n}");
        }
        if let Some(id) = &self.minted {
            let _ = writeln!(buf, "minted {id}");
        }
        if let Some(e) = &self.error {
            let _ = writeln!(buf, "error: {e}");
        }
    }
}

fn render_transaction(buf: &mut String, tx: &Transaction) {
    let secs = (tx.timestamp / 1_000_000_000) as i64;
    let when = DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| tx.timestamp.to_string());
    let _ = writeln!(
        buf,
        "{when}\t{}\t{} -> {}\t{}",
        tx.amount, tx.from, tx.to, tx.description
    );
}

impl Render for WalletView {
    fn render(&self, buf: &mut String) {
        let _ = writeln!(buf, "balance\t{} {}", self.balance, self.symbol);
        for tx in &self.transactions {
            render_transaction(buf, tx);
        }
        render_notes(buf, &self.error, &self.message);
    }
}

impl Render for QuizView {
    fn render(&self, buf: &mut String) {
        let _ = writeln!(buf, "points\t{}", self.points);
        let _ = writeln!(buf, "can start\t{}", self.can_start);
        render_notes(buf, &self.error, &self.message);
    }
}

impl Render for LoginView {
    fn render(&self, buf: &mut String) {
        if self.awaiting_callback {
            let _ = writeln!(buf, "Log in at: {}", self.provider_url);
            buf.push_str("Then run `mintvault callback <redirect-url>`.\n");
        }
        if let Some(e) = &self.error {
            let _ = writeln!(buf, "error: {e}");
        }
    }
}
