// src/op/get_user_info.rs

use super::{require, Context};
use crate::error::NilaRpError;
use crate::http::HttpRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUserInfoParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub claims: Map<String, Value>,
}

#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(params: GetUserInfoParams, ctx: &Context) -> Result<UserInfoResponse, NilaRpError> {
    require(&params.access_token, "access_token")?;
    let site = ctx.site(&params.oxd_id).await?;
    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    let endpoint = discovery
        .userinfo_endpoint
        .ok_or(NilaRpError::MissingEndpoint("userinfo_endpoint"))?;

    let request = HttpRequest::get(&endpoint)?
        .bearer_auth(&params.access_token)
        .header("Accept", "application/json");
    let response = ctx.http.execute(request).await?;
    if !response.is_success() {
        error!("User info request failed with status {}", response.status);
        return Err(NilaRpError::UserInfoNotObtained { status: response.status });
    }

    let claims = response
        .json()
        .map_err(|e| NilaRpError::InvalidOpResponse(format!("userinfo endpoint: {}", e)))?;
    Ok(UserInfoResponse { claims })
}
