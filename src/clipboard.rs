use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use opend::{Clipboard, OpendError};

/// Copies through the terminal with an OSC 52 escape sequence.
#[derive(Debug, Default)]
pub struct Osc52Clipboard;

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

impl Clipboard for Osc52Clipboard {
    fn copy(&self, text: &str) -> opend::Result<()> {
        let mut out = std::io::stderr().lock();
        out.write_all(osc52_sequence(text).as_bytes())
            .and_then(|_| out.flush())
            .map_err(OpendError::Io)
    }
}
