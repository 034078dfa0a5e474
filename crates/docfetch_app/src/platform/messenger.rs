//! The outward-facing messaging collaborator.
//!
//! Chat transports plug in behind [`Messenger`]. The bundled
//! [`ConsoleMessenger`] reads commands from stdin and writes everything it
//! would send to a chat as lines on stdout.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use docfetch_core::{Reaction, SourceRef};
use thiserror::Error;

/// Source used for console lines that do not name a chat.
pub const CONSOLE_SOURCE: &str = "console";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not write to the console: {0}")]
    Io(#[from] io::Error),
    #[error("{} does not exist", .0.display())]
    MissingFile(std::path::PathBuf),
}

/// Everything the scheduler needs to say back to a requester.
pub trait Messenger: Send {
    fn react(&self, source: &SourceRef, reaction: Reaction) -> Result<(), DeliveryError>;
    fn reply(&self, source: &SourceRef, text: &str) -> Result<(), DeliveryError>;
    fn send_document(
        &self,
        source: &SourceRef,
        path: &Path,
        caption: &str,
    ) -> Result<(), DeliveryError>;
    fn send_image(&self, source: &SourceRef, path: &Path) -> Result<(), DeliveryError>;
}

/// Writes one tagged line per outbound message.
pub struct ConsoleMessenger<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleMessenger<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleMessenger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_line(&self, source: &SourceRef, tag: &str, body: &str) -> Result<(), DeliveryError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        for (index, line) in body.lines().enumerate() {
            if index == 0 {
                writeln!(out, "[{source}] {tag} {line}")?;
            } else {
                writeln!(out, "[{source}]     {line}")?;
            }
        }
        if body.is_empty() {
            writeln!(out, "[{source}] {tag}")?;
        }
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Messenger for ConsoleMessenger<W> {
    fn react(&self, source: &SourceRef, reaction: Reaction) -> Result<(), DeliveryError> {
        self.write_line(source, "react", reaction_symbol(reaction))
    }

    fn reply(&self, source: &SourceRef, text: &str) -> Result<(), DeliveryError> {
        self.write_line(source, ">", text)
    }

    fn send_document(
        &self,
        source: &SourceRef,
        path: &Path,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        if !path.is_file() {
            return Err(DeliveryError::MissingFile(path.to_path_buf()));
        }
        self.write_line(
            source,
            "document",
            &format!("{} ({caption})", path.display()),
        )
    }

    fn send_image(&self, source: &SourceRef, path: &Path) -> Result<(), DeliveryError> {
        if !path.is_file() {
            return Err(DeliveryError::MissingFile(path.to_path_buf()));
        }
        self.write_line(source, "image", &path.display().to_string())
    }
}

fn reaction_symbol(reaction: Reaction) -> &'static str {
    match reaction {
        Reaction::Received => "👍",
        Reaction::Succeeded => "✅",
        Reaction::Failed => "❌",
    }
}

/// Splits a console line into the chat it claims to come from and its
/// text. `"alice: book Dune"` is from `alice`; a line without a leading
/// single-word `name:` comes from [`CONSOLE_SOURCE`].
pub fn parse_inbound(line: &str) -> (SourceRef, String) {
    let line = line.trim();
    if let Some((chat, text)) = line.split_once(':') {
        let chat = chat.trim();
        if !chat.is_empty() && !chat.contains(char::is_whitespace) {
            return (SourceRef::new(chat), text.trim().to_string());
        }
    }
    (SourceRef::new(CONSOLE_SOURCE), line.to_string())
}
