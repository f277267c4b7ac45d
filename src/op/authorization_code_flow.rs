// src/op/authorization_code_flow.rs

use super::get_authorization_code::{self, GetAuthorizationCodeParams};
use super::get_tokens_by_code::{self, GetTokensByCodeParams, TokensResult};
use super::Context;
use crate::error::NilaRpError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Same shape as `get_authorization_code`: end-user credentials plus options.
pub type AuthorizationCodeFlowParams = GetAuthorizationCodeParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCodeFlowResponse {
    pub authorization_code: String,
    #[serde(flatten)]
    pub tokens: TokensResult,
}

/// Obtains a code with the end user's credentials and exchanges it at once,
/// with the same validation and commit as `get_tokens_by_code`.
#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(
    params: AuthorizationCodeFlowParams,
    ctx: &Context,
) -> Result<AuthorizationCodeFlowResponse, NilaRpError> {
    get_authorization_code::require_credentials(&params)?;
    let site = ctx.site(&params.oxd_id).await?;

    let authorization = get_authorization_code::obtain(&params, &site, ctx).await?;
    let exchange = GetTokensByCodeParams {
        oxd_id: params.oxd_id.clone(),
        code: authorization.code.clone(),
        state: authorization.state,
    };
    let tokens = get_tokens_by_code::exchange(&exchange, site, ctx).await?;

    Ok(AuthorizationCodeFlowResponse {
        authorization_code: authorization.code,
        tokens,
    })
}
