//! Command dispatch.
//!
//! The endpoint exposes a small set of named commands. The registry mapping
//! names to handlers is built once at startup and handed to the request
//! handler as managed state, so dispatch has no ambient global table and the
//! handler is testable against any registry.

mod backup;
mod restore;

pub use backup::BackupCommand;
pub use restore::RestoreCommand;

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::db::DbTarget;
use crate::importer::ImportError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing form field `{0}`")]
    MissingField(&'static str),
    #[error("mysqldump failed: {0}")]
    DumpFailed(String),
    #[error("could not run mysqldump: {0}")]
    DumpUnavailable(#[from] std::io::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("search-replace reported {count} errors: {details}")]
    ReplaceFailed { count: usize, details: String },
}

/// Everything a command needs for one run: where the database is, where the
/// dump file lives, and any command-specific extras from the request.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub db: DbTarget,
    pub dump_path: PathBuf,
    pub search: Option<String>,
    pub replace: Option<String>,
}

impl CommandContext {
    /// Fetch a command-specific extra, failing the way a missing form field
    /// does.
    fn require<'a>(
        field: &'static str,
        value: &'a Option<String>,
    ) -> Result<&'a str, CommandError> {
        value.as_deref().ok_or(CommandError::MissingField(field))
    }
}

/// Result of a successful command run, summarized for the caller.
#[derive(Debug)]
pub struct CommandOutcome {
    pub message: String,
}

#[rocket::async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &CommandContext) -> Result<CommandOutcome, CommandError>;
}

/// Immutable name-to-handler mapping, built once at startup.
pub struct CommandRegistry {
    commands: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    pub fn register(mut self, command: impl Command + 'static) -> Self {
        self.commands.insert(command.name(), Box::new(command));
        self
    }

    /// The registry the server ships with: backup and restore.
    pub fn builtin() -> Self {
        Self::new()
            .register(BackupCommand)
            .register(RestoreCommand)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Known command names, sorted, for error messages.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
