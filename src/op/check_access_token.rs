// src/op/check_access_token.rs

use super::{require, Context};
use crate::error::NilaRpError;
use crate::jwt::{self, Jwt};
use crate::validator::unix_now;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckAccessTokenParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAccessTokenResponse {
    pub active: bool,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Checks that `access_token` belongs to `id_token` through its `at_hash`.
///
/// The access token is active when the ID Token carries a matching `at_hash`,
/// is not expired and is signed by one of the OP's keys.
pub async fn execute(
    params: CheckAccessTokenParams,
    ctx: &Context,
) -> Result<CheckAccessTokenResponse, NilaRpError> {
    require(&params.id_token, "id_token")?;
    require(&params.access_token, "access_token")?;
    let site = ctx.site(&params.oxd_id).await?;

    let jwt = Jwt::parse(&params.id_token)?;
    let issued_at = jwt.claim_timestamp("iat").unwrap_or(0);
    let expires_at = jwt.claim_timestamp("exp").unwrap_or(0);

    let active = if !at_hash_matches(&jwt, &params.access_token) {
        warn!("at_hash of the id_token does not match the access_token");
        false
    } else if unix_now() >= expires_at.saturating_add(ctx.config.validation.leeway.as_secs()) {
        debug!("id_token is expired");
        false
    } else {
        let discovery = ctx.discovery.resolve(&site.op_host).await?;
        ctx.id_token_validator().is_signature_valid(&jwt, &discovery).await
    };

    Ok(CheckAccessTokenResponse {
        active,
        issued_at,
        expires_at,
    })
}

pub(crate) fn at_hash_matches(jwt: &Jwt, access_token: &str) -> bool {
    let (Some(at_hash), Some(alg)) = (jwt.claim_str("at_hash"), jwt.algorithm()) else {
        return false;
    };
    jwt::token_hash(alg, access_token)
        .map(|expected| expected == at_hash)
        .unwrap_or(false)
}
