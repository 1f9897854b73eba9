//! Remote-control endpoint for WordPress database backup and restore.
//!
//! A sync CLI installs this server next to a site and drives it over HTTP:
//! each request carries the shared password, a command name, and the
//! coordinates of the database to operate on. The server verifies the
//! password, resolves the command from an explicit registry, and runs it.

pub mod access_log;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod replace;
pub mod routes;

use std::sync::Once;

use env_logger::Env;
use rocket::{Build, Rocket, routes};

use crate::access_log::AccessLog;
use crate::auth::PasswordGate;
use crate::commands::CommandRegistry;
use crate::config::ServerConfig;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Build the Rocket instance: logger, dump directory, password gate, command
/// registry, routes. Kept separate from `main` so tests can build the same
/// server against their own configuration.
pub fn rocket(config: ServerConfig) -> Rocket<Build> {
    init_logger();

    std::fs::create_dir_all(&config.dump_dir).expect("failed to create dump directory");
    log::info!("dump directory ready at {}", config.dump_dir.display());

    let gate = PasswordGate::new().expect("argon2 parameters are valid");

    rocket::build()
        .attach(AccessLog)
        .manage(config)
        .manage(gate)
        .manage(CommandRegistry::builtin())
        .mount(
            "/",
            routes![
                routes::health::health_check,
                routes::commands::dispatch_command,
            ],
        )
}
