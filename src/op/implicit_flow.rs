// src/op/implicit_flow.rs

use super::check_access_token::at_hash_matches;
use super::get_authorization_code::{
    self, abandon, authorize_as_user, check_returned_state, GetAuthorizationCodeParams,
};
use super::get_authorization_url::{authorization_request, AuthorizationRequest};
use super::Context;
use crate::error::NilaRpError;
use crate::jwt::Jwt;
use crate::site::SiteConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{error, info, instrument};

pub type ImplicitFlowParams = GetAuthorizationCodeParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitFlowResponse {
    pub access_token: String,
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub id_token_claims: Map<String, Value>,
}

/// Runs an authorization request with `response_type=id_token token` on
/// behalf of the end user and takes both tokens from the redirect fragment.
///
/// The ID Token must carry the request's nonce, pass full validation and bind
/// the access token through `at_hash`. Only then are the tokens stored on the
/// site and the state and nonce consumed.
#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(params: ImplicitFlowParams, ctx: &Context) -> Result<ImplicitFlowResponse, NilaRpError> {
    get_authorization_code::require_credentials(&params)?;
    let site = ctx.site(&params.oxd_id).await?;

    let options = get_authorization_code::request_options(&params);
    let request = authorization_request(&site, &options, "id_token token", ctx).await?;

    match complete(&params, site, &request, ctx).await {
        Ok(response) => Ok(response),
        Err(e) => {
            abandon(&request, ctx).await;
            Err(e)
        }
    }
}

async fn complete(
    params: &ImplicitFlowParams,
    site: SiteConfiguration,
    request: &AuthorizationRequest,
    ctx: &Context,
) -> Result<ImplicitFlowResponse, NilaRpError> {
    let redirect = authorize_as_user(&request.url, &params.username, &params.password, ctx).await?;
    let values: HashMap<String, String> = url::form_urlencoded::parse(redirect.fragment().unwrap_or_default().as_bytes())
        .into_owned()
        .collect();

    if let Some(err) = values.get("error") {
        error!("Implicit authorization failed: {}", err);
        return Err(NilaRpError::NoIdTokenReturned);
    }
    check_returned_state(&values, request)?;

    let id_token = values
        .get("id_token")
        .filter(|t| !t.is_empty())
        .cloned()
        .ok_or(NilaRpError::NoIdTokenReturned)?;
    let access_token = values
        .get("access_token")
        .filter(|t| !t.is_empty())
        .cloned()
        .ok_or(NilaRpError::NoAccessTokenReturned)?;

    let jwt = Jwt::parse(&id_token).map_err(|e| {
        error!("Returned id_token cannot be parsed: {}", e);
        NilaRpError::InvalidIdToken
    })?;

    if jwt.claim_str("nonce") != Some(request.nonce.as_str())
        || !ctx.nonce_registry.is_nonce_valid(&request.nonce).await
    {
        error!("Nonce of the returned id_token is not valid");
        return Err(NilaRpError::InvalidNonce);
    }

    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    if !ctx
        .id_token_validator()
        .is_valid(&jwt, &discovery, &request.nonce, &site.client_id)
        .await
    {
        error!("ID Token is not valid, nothing is persisted");
        return Err(NilaRpError::InvalidIdToken);
    }
    if !at_hash_matches(&jwt, &access_token) {
        error!("at_hash of the id_token does not match the access_token");
        return Err(NilaRpError::InvalidIdToken);
    }

    let mut updated = site;
    updated.id_token = Some(id_token.clone());
    updated.access_token = Some(access_token.clone());
    ctx.site_store.update(updated).await?;
    ctx.state_registry.invalidate_state(&request.state).await?;
    ctx.nonce_registry.invalidate_nonce(&request.nonce).await?;
    info!("Tokens obtained through implicit flow and stored");

    Ok(ImplicitFlowResponse {
        access_token,
        id_token,
        expires_in: values.get("expires_in").and_then(|v| v.parse().ok()),
        scope: values.get("scope").cloned(),
        id_token_claims: jwt.claims().clone(),
    })
}
