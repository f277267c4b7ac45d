// src/op/check_id_token.rs

use super::{require, Context};
use crate::error::NilaRpError;
use crate::jwt::Jwt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckIdTokenParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIdTokenResponse {
    pub active: bool,
    pub issued_at: u64,
    pub expires_at: u64,
    pub claims: Map<String, Value>,
}

/// Runs the full ID Token validation for a site's client without touching any
/// stored state. A token that fails validation is reported as inactive.
pub async fn execute(params: CheckIdTokenParams, ctx: &Context) -> Result<CheckIdTokenResponse, NilaRpError> {
    require(&params.id_token, "id_token")?;
    require(&params.nonce, "nonce")?;
    let site = ctx.site(&params.oxd_id).await?;

    let jwt = Jwt::parse(&params.id_token)?;
    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    let active = ctx
        .id_token_validator()
        .is_valid(&jwt, &discovery, &params.nonce, &site.client_id)
        .await;

    Ok(CheckIdTokenResponse {
        active,
        issued_at: jwt.claim_timestamp("iat").unwrap_or(0),
        expires_at: jwt.claim_timestamp("exp").unwrap_or(0),
        claims: jwt.claims().clone(),
    })
}
