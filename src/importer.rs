//! Line-oriented SQL dump import.
//!
//! Reads a dump file produced by the backup command (or by `mysqldump`) and
//! executes each semicolon-terminated statement against an open connection,
//! in source order. A statement that fails does not stop the run; the failure
//! is logged and recorded and the loop moves on to the next statement.
//!
//! Statement boundaries are detected with the same single-pass heuristic the
//! dumps are written for: a statement ends on the first line whose trimmed
//! text ends with `;`. The splitter has no quote or escape awareness, so a
//! semicolon closing a line inside a quoted literal will cut the statement
//! short. Dumps written with one row per INSERT never hit this; arbitrary
//! hand-written SQL can.

use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use sqlx::MySqlConnection;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

const LINE_COMMENT: &str = "--";

/// Fatal import failures. Per-statement execution failures are not errors;
/// they are collected in the [`ImportReport`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open dump file {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read dump file {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of feeding one line to the [`StatementSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    /// Still accumulating; no complete statement yet.
    Pending,
    /// The buffer held a complete statement and has been reset.
    Statement(String),
}

/// Accumulates source lines into complete SQL statements.
///
/// Comment lines (leading `--`) and empty lines are dropped before they reach
/// the buffer. A statement is emitted exactly when the current line, trailing
/// whitespace trimmed, ends with `;`; the buffer is empty again immediately
/// afterwards. Input that ends mid-statement is surfaced by
/// [`into_residual`](Self::into_residual) so the caller can decide what to do
/// with it (the importer discards it without executing).
#[derive(Debug, Default)]
pub struct StatementSplitter {
    buffer: String,
}

impl StatementSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) -> Split {
        if line.is_empty() || line.starts_with(LINE_COMMENT) {
            return Split::Pending;
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        if line.trim_end().ends_with(';') {
            let statement = mem::take(&mut self.buffer);
            Split::Statement(statement.trim_end().to_owned())
        } else {
            Split::Pending
        }
    }

    /// Terminal transition: whatever is left in the buffer when input ends.
    pub fn into_residual(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}

/// One complete statement executed against a database session.
///
/// The importer is written against this seam rather than a concrete
/// connection so the statement-splitting behavior is testable without a
/// running server.
#[rocket::async_trait]
pub trait StatementSink {
    async fn execute_statement(&mut self, statement: &str) -> Result<(), sqlx::Error>;
}

#[rocket::async_trait]
impl StatementSink for MySqlConnection {
    async fn execute_statement(&mut self, statement: &str) -> Result<(), sqlx::Error> {
        sqlx::query(statement).execute(&mut *self).await?;
        Ok(())
    }
}

/// A failed statement: its full text and the database error it drew.
#[derive(Debug, Clone)]
pub struct StatementFailure {
    pub statement: String,
    pub error: String,
}

/// Counts for one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub statements_executed: usize,
    pub failures: Vec<StatementFailure>,
}

impl ImportReport {
    pub fn statements_attempted(&self) -> usize {
        self.statements_executed + self.failures.len()
    }
}

/// Stream `path` and execute every complete statement against `sink`.
///
/// Statements run strictly in source order. Execution failures are logged and
/// recorded but do not halt the run; the connection is assumed to still be
/// usable. Trailing content with no terminating semicolon is never executed.
pub async fn import_dump<S: StatementSink + Send>(
    path: &Path,
    sink: &mut S,
) -> Result<ImportReport, ImportError> {
    let file = File::open(path)
        .await
        .map_err(|source| ImportError::SourceUnavailable {
            path: path.to_owned(),
            source,
        })?;

    let mut lines = BufReader::new(file).lines();
    let mut splitter = StatementSplitter::new();
    let mut report = ImportReport::default();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|source| ImportError::SourceRead {
            path: path.to_owned(),
            source,
        })?
    {
        let Split::Statement(statement) = splitter.feed(&line) else {
            continue;
        };

        match sink.execute_statement(&statement).await {
            Ok(()) => report.statements_executed += 1,
            Err(err) => {
                log::error!("error performing statement `{statement}`: {err}");
                report.failures.push(StatementFailure {
                    statement,
                    error: err.to_string(),
                });
            }
        }
    }

    if let Some(residual) = splitter.into_residual() {
        log::debug!(
            "dump ended mid-statement; discarding {} unterminated bytes",
            residual.len()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    /// Records every statement it is handed; statements containing
    /// `fail_contains` draw an injected error.
    #[derive(Default)]
    struct RecordingSink {
        statements: Vec<String>,
        fail_contains: Option<String>,
    }

    #[rocket::async_trait]
    impl StatementSink for RecordingSink {
        async fn execute_statement(&mut self, statement: &str) -> Result<(), sqlx::Error> {
            self.statements.push(statement.to_owned());
            match &self.fail_contains {
                Some(needle) if statement.contains(needle.as_str()) => {
                    Err(sqlx::Error::Protocol("injected failure".into()))
                }
                _ => Ok(()),
            }
        }
    }

    fn dump_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp dump");
        file.write_all(contents.as_bytes()).expect("write dump");
        file
    }

    #[tokio::test]
    async fn executes_statements_in_source_order() {
        let dump = dump_file("INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\n");
        let mut sink = RecordingSink::default();

        let report = import_dump(dump.path(), &mut sink).await.expect("import");

        assert_eq!(report.statements_executed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            sink.statements,
            vec!["INSERT INTO t VALUES (1);", "INSERT INTO t VALUES (2);"]
        );
    }

    #[tokio::test]
    async fn comment_lines_never_reach_the_sink() {
        let dump = dump_file("-- comment\nINSERT INTO t VALUES (1);\n");
        let mut sink = RecordingSink::default();

        let report = import_dump(dump.path(), &mut sink).await.expect("import");

        assert_eq!(report.statements_executed, 1);
        assert_eq!(sink.statements, vec!["INSERT INTO t VALUES (1);"]);
        assert!(!sink.statements[0].contains("comment"));
    }

    #[tokio::test]
    async fn multi_line_statement_concatenates_lines() {
        let dump = dump_file("INSERT INTO t\nVALUES (1);\n");
        let mut sink = RecordingSink::default();

        let report = import_dump(dump.path(), &mut sink).await.expect("import");

        assert_eq!(report.statements_executed, 1);
        assert_eq!(sink.statements, vec!["INSERT INTO t\nVALUES (1);"]);
    }

    #[tokio::test]
    async fn unterminated_trailing_content_is_discarded() {
        let dump = dump_file("INSERT INTO t VALUES (1);\nINCOMPLETE STATEMENT NO SEMICOLON\n");
        let mut sink = RecordingSink::default();

        let report = import_dump(dump.path(), &mut sink).await.expect("import");

        assert_eq!(report.statements_executed, 1);
        assert_eq!(sink.statements, vec!["INSERT INTO t VALUES (1);"]);
    }

    #[tokio::test]
    async fn failing_statement_does_not_halt_the_run() {
        let dump = dump_file(
            "INSERT INTO t VALUES (1);\nINSERT INTO broken VALUES (2);\nINSERT INTO t VALUES (3);\n",
        );
        let mut sink = RecordingSink {
            fail_contains: Some("broken".to_owned()),
            ..RecordingSink::default()
        };

        let report = import_dump(dump.path(), &mut sink).await.expect("import");

        assert_eq!(report.statements_executed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.statements_attempted(), 3);
        assert!(report.failures[0].statement.contains("broken"));
        assert!(report.failures[0].error.contains("injected failure"));
        assert_eq!(sink.statements.len(), 3);
    }

    #[tokio::test]
    async fn missing_dump_file_is_source_unavailable() {
        let mut sink = RecordingSink::default();

        let err = import_dump(Path::new("/nonexistent/dump.sql"), &mut sink)
            .await
            .expect_err("open should fail");

        assert!(matches!(err, ImportError::SourceUnavailable { .. }));
        assert!(sink.statements.is_empty());
    }

    #[test]
    fn splitter_buffer_is_empty_after_emitting() {
        let mut splitter = StatementSplitter::new();

        assert_eq!(splitter.feed("DELETE FROM t;"), Split::Statement("DELETE FROM t;".into()));
        assert_eq!(
            splitter.feed("UPDATE t SET a = 1;"),
            Split::Statement("UPDATE t SET a = 1;".into())
        );
        assert_eq!(splitter.into_residual(), None);
    }

    #[test]
    fn splitter_skips_empty_and_comment_lines() {
        let mut splitter = StatementSplitter::new();

        assert_eq!(splitter.feed(""), Split::Pending);
        assert_eq!(splitter.feed("-- DROP TABLE t;"), Split::Pending);
        assert_eq!(splitter.feed("SELECT 1;"), Split::Statement("SELECT 1;".into()));
    }

    #[test]
    fn splitter_accepts_trailing_whitespace_after_semicolon() {
        let mut splitter = StatementSplitter::new();

        assert_eq!(
            splitter.feed("SELECT 1;   "),
            Split::Statement("SELECT 1;".into())
        );
    }

    #[test]
    fn splitter_reports_residual_for_incomplete_input() {
        let mut splitter = StatementSplitter::new();

        assert_eq!(splitter.feed("INSERT INTO t"), Split::Pending);
        assert_eq!(splitter.into_residual(), Some("INSERT INTO t\n".to_owned()));
    }
}
