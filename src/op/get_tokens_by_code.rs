// src/op/get_tokens_by_code.rs

use super::Context;
use crate::error::NilaRpError;
use crate::http::HttpRequest;
use crate::jwt::Jwt;
use crate::model::TokenEndpointResponse;
use crate::site::SiteConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTokensByCodeParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

/// Tokens obtained for a site, exactly as the OP returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokensResult {
    pub access_token: String,
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub id_token_claims: Map<String, Value>,
}

#[derive(Serialize)]
struct AuthorizationCodeGrant<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
}

/// Checks code and state before the site is looked up, so a malformed
/// request reports the missing parameter rather than an unknown site.
pub async fn execute(params: GetTokensByCodeParams, ctx: &Context) -> Result<TokensResult, NilaRpError> {
    validate(&params, ctx).await?;
    let site = ctx.site(&params.oxd_id).await?;
    exchange_validated(&params, site, ctx).await
}

/// Exchanges an authorization code for tokens on behalf of `site`.
///
/// Tokens are persisted and the state consumed only once the returned ID
/// Token has passed the nonce check and full validation. The state is
/// invalidated after the site update succeeded, so a failed update leaves the
/// exchange retryable.
pub async fn exchange(
    params: &GetTokensByCodeParams,
    site: SiteConfiguration,
    ctx: &Context,
) -> Result<TokensResult, NilaRpError> {
    validate(params, ctx).await?;
    exchange_validated(params, site, ctx).await
}

#[instrument(skip_all, fields(oxd_id = %site.oxd_id), err)]
async fn exchange_validated(
    params: &GetTokensByCodeParams,
    site: SiteConfiguration,
    ctx: &Context,
) -> Result<TokensResult, NilaRpError> {
    let discovery = ctx.discovery.resolve(&site.op_host).await?;

    let grant = AuthorizationCodeGrant {
        grant_type: "authorization_code",
        code: &params.code,
        redirect_uri: &site.authorization_redirect_uri,
    };
    let request = HttpRequest::post_form(&discovery.token_endpoint, &grant)?
        .basic_auth(&site.client_id, &site.client_secret)
        .header("Accept", "application/json");
    let response = ctx.http.execute(request).await?;

    if !(response.is_success() || response.status == 302) {
        error!("Failed to get tokens because response code is: {}", response.status);
        return Err(NilaRpError::TokensNotObtained { status: response.status });
    }

    let tokens: TokenEndpointResponse = response
        .json()
        .map_err(|e| NilaRpError::InvalidOpResponse(format!("token endpoint: {}", e)))?;

    let id_token = tokens.id_token.filter(|t| !t.is_empty()).ok_or_else(|| {
        error!("id_token is not returned. Please check whether 'openid' scope is present for 'get_authorization_url' command");
        NilaRpError::NoIdTokenReturned
    })?;
    let access_token = tokens.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
        error!("access_token is not returned");
        NilaRpError::NoAccessTokenReturned
    })?;

    let jwt = Jwt::parse(&id_token).map_err(|e| {
        error!("Returned id_token cannot be parsed: {}", e);
        NilaRpError::InvalidIdToken
    })?;

    let nonce = jwt.claim_str("nonce").unwrap_or_default();
    if !ctx.nonce_registry.is_nonce_valid(nonce).await {
        error!("Nonce of the returned id_token is not valid");
        return Err(NilaRpError::InvalidNonce);
    }

    if !ctx
        .id_token_validator()
        .is_valid(&jwt, &discovery, nonce, &site.client_id)
        .await
    {
        error!("ID Token is not valid, nothing is persisted");
        return Err(NilaRpError::InvalidIdToken);
    }

    let mut updated = site;
    updated.id_token = Some(id_token.clone());
    updated.access_token = Some(access_token.clone());
    ctx.site_store.update(updated).await?;
    ctx.state_registry.invalidate_state(&params.state).await?;
    ctx.nonce_registry.invalidate_nonce(nonce).await?;
    info!("Tokens obtained and stored");

    Ok(TokensResult {
        access_token,
        id_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        id_token_claims: jwt.claims().clone(),
    })
}

async fn validate(params: &GetTokensByCodeParams, ctx: &Context) -> Result<(), NilaRpError> {
    if params.code.is_empty() {
        return Err(NilaRpError::NoCode);
    }
    if params.state.is_empty() {
        return Err(NilaRpError::NoState);
    }
    if !ctx.state_registry.is_state_valid(&params.state).await {
        return Err(NilaRpError::StateNotValid);
    }
    Ok(())
}
