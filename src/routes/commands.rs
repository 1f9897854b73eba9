//! The command endpoint.
//!
//! Sync tooling POSTs a form with the shared password, a command name, the
//! coordinates of the database to operate on, and the dump file to use. The
//! handler validates in a fixed order (password, command, credentials, file
//! name) and only then hands off to the command; nothing touches the
//! database before the whole request has validated.

use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::{FromForm, State, post};
use serde::{Deserialize, Serialize};

use crate::auth::PasswordGate;
use crate::commands::{CommandContext, CommandRegistry};
use crate::config::ServerConfig;
use crate::db::DbTarget;
use crate::error::ApiError;

/// Raw form body. Every field is optional at the parsing layer so missing
/// fields surface as this endpoint's own 400s, not the framework's.
#[derive(Debug, FromForm)]
pub struct CommandRequest<'r> {
    pub password: Option<&'r str>,
    pub command: Option<&'r str>,
    pub db_host: Option<&'r str>,
    pub db_port: Option<u16>,
    pub db_user: Option<&'r str>,
    pub db_pass: Option<&'r str>,
    pub db_name: Option<&'r str>,
    pub dump_file_name: Option<&'r str>,
    pub search: Option<&'r str>,
    pub replace: Option<&'r str>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub message: String,
}

/// Dump files live directly under the configured dump directory; a name with
/// path separators could reach outside it.
fn acceptable_dump_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

fn missing(field: &str) -> ApiError {
    ApiError::BadRequest(format!("missing form field `{field}`"))
}

fn db_target(request: &CommandRequest<'_>) -> Result<DbTarget, ApiError> {
    let mut absent = Vec::new();
    if request.db_host.is_none() {
        absent.push("db_host");
    }
    if request.db_port.is_none() {
        absent.push("db_port");
    }
    if request.db_user.is_none() {
        absent.push("db_user");
    }
    if request.db_pass.is_none() {
        absent.push("db_pass");
    }
    if request.db_name.is_none() {
        absent.push("db_name");
    }

    let (Some(host), Some(port), Some(user), Some(password), Some(database)) = (
        request.db_host,
        request.db_port,
        request.db_user,
        request.db_pass,
        request.db_name,
    ) else {
        return Err(ApiError::BadRequest(format!(
            "db credentials missing or incomplete: {}",
            absent.join(", ")
        )));
    };

    Ok(DbTarget {
        host: host.to_owned(),
        port,
        user: user.to_owned(),
        password: password.to_owned(),
        database: database.to_owned(),
    })
}

#[post("/", data = "<request>")]
pub async fn dispatch_command(
    request: Form<CommandRequest<'_>>,
    config: &State<ServerConfig>,
    gate: &State<PasswordGate>,
    registry: &State<CommandRegistry>,
) -> Result<Json<CommandResponse>, ApiError> {
    let password = request.password.ok_or_else(|| missing("password"))?;
    let verified = gate
        .verify(password, &config.password_hash)
        .map_err(|err| ApiError::InternalError(format!("password verification failed: {err}")))?;
    if !verified {
        return Err(ApiError::Unauthorized);
    }

    let name = request.command.ok_or_else(|| missing("command"))?;
    let command = registry.get(name).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unknown command `{name}`; known commands: {}",
            registry.names().join(", ")
        ))
    })?;

    let db = db_target(&request)?;

    let file_name = request.dump_file_name.ok_or_else(|| missing("dump_file_name"))?;
    if !acceptable_dump_file_name(file_name) {
        return Err(ApiError::BadRequest(format!(
            "dump_file_name `{file_name}` must be a bare file name"
        )));
    }

    let ctx = CommandContext {
        db,
        dump_path: config.dump_dir.join(file_name),
        search: request.search.map(str::to_owned),
        replace: request.replace.map(str::to_owned),
    };

    log::info!("dispatching command `{name}` for database `{}`", ctx.db.database);
    let outcome = command.run(&ctx).await?;

    Ok(Json(CommandResponse {
        message: outcome.message,
    }))
}
