// src/dispatcher.rs

use crate::command::{Command, CommandResponse, CommandType};
use crate::error::NilaRpError;
use crate::op::{Context, Operation};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument};

/// Maps a command to the operation that handles it.
///
/// Returns `Ok(None)` for a missing command or an unrecognized discriminator;
/// both are logged, neither is an error. Params that do not fit the command's
/// shape are a bad request.
pub fn create(command: Option<&Command>) -> Result<Option<Operation>, NilaRpError> {
    let Some(command) = command else {
        error!("Command is null");
        return Ok(None);
    };
    let Some(command_type) = command.command_type() else {
        error!("Command is not supported. Command: {}", command.name);
        return Ok(None);
    };

    let params = &command.params;
    let operation = match command_type {
        CommandType::GetAuthorizationUrl => Operation::GetAuthorizationUrl(parse(command_type, params)?),
        CommandType::GetTokensByCode => Operation::GetTokensByCode(parse(command_type, params)?),
        CommandType::CheckIdToken => Operation::CheckIdToken(parse(command_type, params)?),
        CommandType::CheckAccessToken => Operation::CheckAccessToken(parse(command_type, params)?),
        CommandType::GetUserInfo => Operation::GetUserInfo(parse(command_type, params)?),
        CommandType::RegisterSite => Operation::RegisterSite(parse(command_type, params)?),
        CommandType::UpdateSite => Operation::UpdateSite(parse(command_type, params)?),
        CommandType::GetLogoutUri => Operation::GetLogoutUri(parse(command_type, params)?),
        CommandType::GetAuthorizationCode => Operation::GetAuthorizationCode(parse(command_type, params)?),
        CommandType::AuthorizationCodeFlow => Operation::AuthorizationCodeFlow(parse(command_type, params)?),
        CommandType::ImplicitFlow => Operation::ImplicitFlow(parse(command_type, params)?),
        CommandType::RsProtect => Operation::RsProtect(parse(command_type, params)?),
        CommandType::RsCheckAccess => Operation::RsCheckAccess(parse(command_type, params)?),
    };
    Ok(Some(operation))
}

/// Handles one command end to end and wraps the outcome in a response envelope.
#[instrument(skip_all, fields(command = command.map(|c| c.name.as_str()).unwrap_or("null")))]
pub async fn process(command: Option<&Command>, ctx: &Context) -> CommandResponse {
    let operation = match create(command) {
        Ok(Some(operation)) => operation,
        Ok(None) => {
            let name = command.map(|c| c.name.clone()).unwrap_or_else(|| "null".to_string());
            return CommandResponse::error(&NilaRpError::UnsupportedCommand(name));
        }
        Err(e) => {
            error!("Failed to create operation: {}", e);
            return CommandResponse::error(&e);
        }
    };

    let command_type = operation.command_type();
    match operation.execute(ctx).await {
        Ok(data) => {
            debug!("Command {} succeeded", command_type);
            CommandResponse::ok(data)
        }
        Err(e) => {
            error!("Command {} failed: {}", command_type, e);
            CommandResponse::error(&e)
        }
    }
}

// A missing `params` member arrives as null and means "no params".
fn parse<T: DeserializeOwned>(command_type: CommandType, params: &Value) -> Result<T, NilaRpError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| NilaRpError::InvalidParams(format!("{} params: {}", command_type, e)))
}
