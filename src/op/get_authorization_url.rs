// src/op/get_authorization_url.rs

use super::Context;
use crate::error::NilaRpError;
use crate::site::SiteConfiguration;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAuthorizationUrlParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
    #[serde(default)]
    pub acr_values: Option<Vec<String>>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
    pub state: String,
    pub nonce: String,
}

/// An authorization request URL with the state and nonce registered for it.
#[derive(Debug, Clone)]
pub(crate) struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub nonce: String,
}

/// Builds the authorization request URL for a site and registers a fresh
/// state and nonce for it.
#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(
    params: GetAuthorizationUrlParams,
    ctx: &Context,
) -> Result<AuthorizationUrlResponse, NilaRpError> {
    let site = ctx.site(&params.oxd_id).await?;
    let request = authorization_request(&site, &params, "code", ctx).await?;

    Ok(AuthorizationUrlResponse {
        authorization_url: request.url.to_string(),
        state: request.state,
        nonce: request.nonce,
    })
}

/// Scopes come from the params, else the site, else the configured defaults;
/// `openid` is always requested.
pub(crate) async fn authorization_request(
    site: &SiteConfiguration,
    params: &GetAuthorizationUrlParams,
    response_type: &str,
    ctx: &Context,
) -> Result<AuthorizationRequest, NilaRpError> {
    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    let endpoint = discovery
        .authorization_endpoint
        .ok_or(NilaRpError::MissingEndpoint("authorization_endpoint"))?;

    let mut scope = params
        .scope
        .clone()
        .filter(|scope| !scope.is_empty())
        .unwrap_or_else(|| {
            if site.scope.is_empty() {
                ctx.config.default_scopes.clone()
            } else {
                site.scope.clone()
            }
        });
    if !scope.iter().any(|s| s == "openid") {
        scope.insert(0, "openid".to_string());
    }

    let mut url = Url::parse(&endpoint)?;
    let state = ctx.state_registry.generate_state().await;
    let nonce = ctx.nonce_registry.generate_nonce().await;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", response_type)
            .append_pair("client_id", &site.client_id)
            .append_pair("redirect_uri", &site.authorization_redirect_uri)
            .append_pair("scope", &scope.join(" "))
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);
        if let Some(acr_values) = params.acr_values.as_ref().filter(|values| !values.is_empty()) {
            query.append_pair("acr_values", &acr_values.join(" "));
        }
        if let Some(prompt) = params.prompt.as_deref().filter(|prompt| !prompt.is_empty()) {
            query.append_pair("prompt", prompt);
        }
    }
    debug!("Authorization URL issued for client {}", site.client_id);

    Ok(AuthorizationRequest { url, state, nonce })
}
