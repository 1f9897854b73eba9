//! Environment-driven server configuration, resolved once at startup.

use std::env;
use std::path::PathBuf;

use argon2::password_hash::PasswordHash;
use thiserror::Error;

const PASSWORD_HASH_VAR: &str = "WPSYNC_PASSWORD_HASH";
const DUMP_DIR_VAR: &str = "WPSYNC_DUMP_DIR";
const DEFAULT_DUMP_DIR: &str = "./dumps";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{PASSWORD_HASH_VAR} is not set; generate one with the hash-password binary")]
    MissingPasswordHash,
    #[error("{PASSWORD_HASH_VAR} is not a valid PHC hash: {0}")]
    InvalidPasswordHash(String),
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Startup configuration, managed as Rocket state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Argon2 PHC hash the request password is verified against.
    pub password_hash: String,
    /// Directory where backup writes and restore reads dump files.
    pub dump_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_parts(
            env::var(PASSWORD_HASH_VAR).ok(),
            env_string(DUMP_DIR_VAR, DEFAULT_DUMP_DIR),
        )
    }

    fn from_parts(password_hash: Option<String>, dump_dir: String) -> Result<Self, ConfigError> {
        let password_hash = password_hash.ok_or(ConfigError::MissingPasswordHash)?;

        // Catch a mangled hash at startup instead of on the first request.
        PasswordHash::new(&password_hash)
            .map_err(|err| ConfigError::InvalidPasswordHash(err.to_string()))?;

        Ok(Self {
            password_hash,
            dump_dir: PathBuf::from(dump_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordGate;

    #[test]
    fn missing_hash_fails_startup() {
        assert!(matches!(
            ServerConfig::from_parts(None, DEFAULT_DUMP_DIR.to_owned()),
            Err(ConfigError::MissingPasswordHash)
        ));
    }

    #[test]
    fn mangled_hash_fails_startup() {
        assert!(matches!(
            ServerConfig::from_parts(Some("not a hash".to_owned()), DEFAULT_DUMP_DIR.to_owned()),
            Err(ConfigError::InvalidPasswordHash(_))
        ));
    }

    #[test]
    fn accepts_a_hash_produced_by_the_gate() {
        let gate = PasswordGate::new().expect("gate");
        let hash = gate.hash("swordfish").expect("hash");

        let config = ServerConfig::from_parts(Some(hash), "/var/lib/wpsync".to_owned())
            .expect("valid config");
        assert_eq!(config.dump_dir, PathBuf::from("/var/lib/wpsync"));
    }
}
