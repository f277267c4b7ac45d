// src/command.rs

use crate::error::{ErrorKind, NilaRpError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The operations a client application can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    GetAuthorizationUrl,
    GetTokensByCode,
    CheckIdToken,
    CheckAccessToken,
    GetUserInfo,
    RegisterSite,
    UpdateSite,
    GetLogoutUri,
    GetAuthorizationCode,
    AuthorizationCodeFlow,
    ImplicitFlow,
    RsProtect,
    RsCheckAccess,
}

impl CommandType {
    /// The wire name, e.g. `get_tokens_by_code`.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::GetAuthorizationUrl => "get_authorization_url",
            CommandType::GetTokensByCode => "get_tokens_by_code",
            CommandType::CheckIdToken => "check_id_token",
            CommandType::CheckAccessToken => "check_access_token",
            CommandType::GetUserInfo => "get_user_info",
            CommandType::RegisterSite => "register_site",
            CommandType::UpdateSite => "update_site",
            CommandType::GetLogoutUri => "get_logout_uri",
            CommandType::GetAuthorizationCode => "get_authorization_code",
            CommandType::AuthorizationCodeFlow => "authorization_code_flow",
            CommandType::ImplicitFlow => "implicit_flow",
            CommandType::RsProtect => "rs_protect",
            CommandType::RsCheckAccess => "rs_check_access",
        }
    }

    /// Looks up a wire name; `None` when it names no supported command.
    pub fn from_wire(name: &str) -> Option<CommandType> {
        serde_json::from_value(Value::String(name.to_string())).ok()
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request from a client application: `{"command": "...", "params": {...}}`.
///
/// The discriminator is kept as received so that an unknown command can be
/// reported instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command")]
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl Command {
    pub fn new(command_type: CommandType, params: Value) -> Self {
        Self {
            name: command_type.as_str().to_string(),
            params,
        }
    }

    /// The parsed discriminator, if it is a supported one.
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::from_wire(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Error payload of a failed command.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub error_description: String,
    pub kind: ErrorKind,
}

/// The answer to exactly one [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: ResponseStatus,
    pub data: Value,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            data,
        }
    }

    pub fn error(err: &NilaRpError) -> Self {
        let payload = ErrorResponse {
            error: err.code(),
            error_description: err.description(),
            kind: err.kind(),
        };
        Self {
            status: ResponseStatus::Error,
            data: serde_json::to_value(payload).unwrap_or_else(|_| json!({ "error": err.code() })),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// The machine-readable code of an error response.
    pub fn error_code(&self) -> Option<&str> {
        match self.status {
            ResponseStatus::Ok => None,
            ResponseStatus::Error => self.data.get("error").and_then(Value::as_str),
        }
    }
}

/// Every supported wire name, for tests that must cover each command.
#[cfg(test)]
pub(crate) const WIRE_NAMES: [&str; 13] = [
    "get_authorization_url",
    "get_tokens_by_code",
    "check_id_token",
    "check_access_token",
    "get_user_info",
    "register_site",
    "update_site",
    "get_logout_uri",
    "get_authorization_code",
    "authorization_code_flow",
    "implicit_flow",
    "rs_protect",
    "rs_check_access",
];
