// src/lib.rs

//! An OpenID Connect relying party that acts on behalf of registered client
//! applications: it turns JSON commands into authorization URLs, code
//! exchanges and token checks against an OP, and answers access checks for
//! the resources a site protects.

pub mod command;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod jwt;
pub mod keys;
pub mod model;
pub mod op;
pub mod site;
pub mod state;
pub mod validator;

/// The public prelude for the `nila-rp` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::command::{Command, CommandResponse, CommandType};
    pub use crate::config::{Config, ConfigBuilder, ValidationDetails};
    pub use crate::dispatcher::{create, process};
    pub use crate::error::{ErrorKind, NilaRpError};
    pub use crate::op::{Context, Operation};
    pub use crate::site::{InMemorySiteStore, SiteConfiguration, SiteStore};
    pub use crate::state::{InMemoryStateRegistry, NonceRegistry, StateRegistry};
    pub use crate::validator::IdTokenValidator;
    pub use jsonwebtoken::Algorithm;
}
