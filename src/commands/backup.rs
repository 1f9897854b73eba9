//! Backup: dump the target database to a file with `mysqldump`.

use tokio::process::Command as Process;

use super::{Command, CommandContext, CommandError, CommandOutcome};

/// Dump options match what the restore path expects: every table prefixed
/// with a DROP, one row per INSERT so the importer's line splitter sees one
/// statement per line.
pub struct BackupCommand;

#[rocket::async_trait]
impl Command for BackupCommand {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn run(&self, ctx: &CommandContext) -> Result<CommandOutcome, CommandError> {
        log::info!(
            "dumping database `{}` to {}",
            ctx.db.database,
            ctx.dump_path.display()
        );

        let output = Process::new("mysqldump")
            .arg("--host")
            .arg(&ctx.db.host)
            .arg("--port")
            .arg(ctx.db.port.to_string())
            .arg("--user")
            .arg(&ctx.db.user)
            .arg("--add-drop-table")
            .arg("--skip-extended-insert")
            .arg("--quick")
            .arg("--default-character-set=utf8mb4")
            .arg("--result-file")
            .arg(&ctx.dump_path)
            .arg(&ctx.db.database)
            // Password through the environment, not argv.
            .env("MYSQL_PWD", &ctx.db.password)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CommandError::DumpFailed(stderr));
        }

        log::info!("dump of `{}` finished", ctx.db.database);
        Ok(CommandOutcome {
            message: format!(
                "backup of `{}` written to {}",
                ctx.db.database,
                ctx.dump_path.display()
            ),
        })
    }
}
