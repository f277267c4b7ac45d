// src/op/get_authorization_code.rs

use super::get_authorization_url::{authorization_request, AuthorizationRequest, GetAuthorizationUrlParams};
use super::{require, Context};
use crate::error::NilaRpError;
use crate::http::HttpRequest;
use crate::site::SiteConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info, instrument};
use url::Url;

/// End-user credentials and the authorization request options.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GetAuthorizationCodeParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
    #[serde(default)]
    pub acr_values: Option<Vec<String>>,
}

impl fmt::Debug for GetAuthorizationCodeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetAuthorizationCodeParams")
            .field("oxd_id", &self.oxd_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scope", &self.scope)
            .field("acr_values", &self.acr_values)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCodeResponse {
    pub code: String,
    pub state: String,
    pub nonce: String,
}

#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(
    params: GetAuthorizationCodeParams,
    ctx: &Context,
) -> Result<AuthorizationCodeResponse, NilaRpError> {
    require_credentials(&params)?;
    let site = ctx.site(&params.oxd_id).await?;
    obtain(&params, &site, ctx).await
}

pub(crate) fn require_credentials(params: &GetAuthorizationCodeParams) -> Result<(), NilaRpError> {
    require(&params.username, "username")?;
    require(&params.password, "password")
}

/// Runs an authorization request with `response_type=code` on behalf of the
/// end user and reads the code off the redirect.
///
/// The state and nonce stay registered on success, ready for the code
/// exchange; on failure both are dropped.
pub(crate) async fn obtain(
    params: &GetAuthorizationCodeParams,
    site: &SiteConfiguration,
    ctx: &Context,
) -> Result<AuthorizationCodeResponse, NilaRpError> {
    let request = authorization_request(site, &request_options(params), "code", ctx).await?;

    let result: Result<String, NilaRpError> = async {
        let redirect = authorize_as_user(&request.url, &params.username, &params.password, ctx).await?;
        let values: HashMap<String, String> = redirect.query_pairs().into_owned().collect();
        code_from_redirect(&values, &request)
    }
    .await;

    match result {
        Ok(code) => {
            info!("Authorization code obtained");
            Ok(AuthorizationCodeResponse {
                code,
                state: request.state,
                nonce: request.nonce,
            })
        }
        Err(e) => {
            abandon(&request, ctx).await;
            Err(e)
        }
    }
}

pub(crate) fn request_options(params: &GetAuthorizationCodeParams) -> GetAuthorizationUrlParams {
    GetAuthorizationUrlParams {
        oxd_id: params.oxd_id.clone(),
        scope: params.scope.clone(),
        acr_values: params.acr_values.clone(),
        prompt: None,
    }
}

/// Sends the authorization request with the end user's credentials and
/// returns the URL the OP redirects to.
pub(crate) async fn authorize_as_user(
    url: &Url,
    username: &str,
    password: &str,
    ctx: &Context,
) -> Result<Url, NilaRpError> {
    let request = HttpRequest::get(url.as_str())?.user_auth(username, password);
    let response = ctx.http.execute(request).await?;
    if !response.is_redirect() {
        error!("Authorization endpoint did not redirect, status: {}", response.status);
        return Err(NilaRpError::AuthorizationCodeNotObtained { status: response.status });
    }
    let location = response.header("Location").ok_or_else(|| {
        error!("Authorization redirect has no Location header");
        NilaRpError::NoAuthorizationCode
    })?;
    url.join(location)
        .map_err(|e| NilaRpError::InvalidOpResponse(format!("authorization redirect: {}", e)))
}

/// Checks the `state` echoed by the OP, if any, against the one sent.
pub(crate) fn check_returned_state(
    values: &HashMap<String, String>,
    request: &AuthorizationRequest,
) -> Result<(), NilaRpError> {
    match values.get("state") {
        Some(state) if *state != request.state => {
            error!("State returned by the OP does not match the request");
            Err(NilaRpError::StateNotValid)
        }
        _ => Ok(()),
    }
}

fn code_from_redirect(values: &HashMap<String, String>, request: &AuthorizationRequest) -> Result<String, NilaRpError> {
    if let Some(err) = values.get("error") {
        error!(
            "Authorization failed: {} {}",
            err,
            values.get("error_description").map(String::as_str).unwrap_or_default()
        );
        return Err(NilaRpError::NoAuthorizationCode);
    }
    check_returned_state(values, request)?;
    values
        .get("code")
        .filter(|code| !code.is_empty())
        .cloned()
        .ok_or(NilaRpError::NoAuthorizationCode)
}

/// Drops the state and nonce of a request that will never complete.
pub(crate) async fn abandon(request: &AuthorizationRequest, ctx: &Context) {
    if let Err(e) = ctx.state_registry.invalidate_state(&request.state).await {
        error!("Failed to invalidate state: {}", e);
    }
    if let Err(e) = ctx.nonce_registry.invalidate_nonce(&request.nonce).await {
        error!("Failed to invalidate nonce: {}", e);
    }
}
