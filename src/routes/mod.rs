//! HTTP route handlers.
//!
//! The surface is deliberately tiny: a health probe and the single POST
//! endpoint the sync tooling drives commands through.

pub mod commands;
pub mod health;
