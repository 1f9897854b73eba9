//! Per-request database connections.
//!
//! The endpoint never holds a pool: every request carries the coordinates of
//! the database it wants operated on, and each command run opens exactly one
//! connection with those credentials.

use sqlx::ConnectOptions;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};

/// Coordinates of the MySQL database a command operates on.
#[derive(Debug, Clone)]
pub struct DbTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbTarget {
    /// Open one connection with a UTF-8 session charset. Bulk import and the
    /// search-replace pass both assume the session is UTF-8.
    pub async fn connect(&self) -> Result<MySqlConnection, sqlx::Error> {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .charset("utf8mb4")
            .connect()
            .await
    }
}
