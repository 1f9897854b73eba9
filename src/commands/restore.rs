//! Restore: import a dump file, then rewrite hostnames/paths in place.

use super::{Command, CommandContext, CommandError, CommandOutcome};
use crate::importer;
use crate::replace;

pub struct RestoreCommand;

#[rocket::async_trait]
impl Command for RestoreCommand {
    fn name(&self) -> &'static str {
        "restore"
    }

    async fn run(&self, ctx: &CommandContext) -> Result<CommandOutcome, CommandError> {
        // Fail on missing extras before any database work.
        let search = CommandContext::require("search", &ctx.search)?;
        let replace_with = CommandContext::require("replace", &ctx.replace)?;

        let mut conn = ctx.db.connect().await?;

        log::info!(
            "importing {} into `{}`",
            ctx.dump_path.display(),
            ctx.db.database
        );
        let import = importer::import_dump(&ctx.dump_path, &mut conn).await?;
        if !import.failures.is_empty() {
            log::warn!(
                "import of {} finished with {} failed statements",
                ctx.dump_path.display(),
                import.failures.len()
            );
        }

        let report = replace::search_replace(&mut conn, search, replace_with).await?;
        if !report.errors.is_empty() {
            return Err(CommandError::ReplaceFailed {
                count: report.errors.len(),
                details: report.errors.join("; "),
            });
        }

        Ok(CommandOutcome {
            message: format!(
                "restore finished: {} statements executed ({} failed), {} cells rewritten",
                import.statements_executed,
                import.failures.len(),
                report.cells_changed
            ),
        })
    }
}
