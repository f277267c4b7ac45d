// src/op/register_site.rs

use super::{require, Context};
use crate::error::NilaRpError;
use crate::site::SiteConfiguration;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterSiteParams {
    #[serde(default)]
    pub op_host: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub authorization_redirect_uri: String,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteResponse {
    pub oxd_id: String,
}

/// Registers a client application against an OP it already has credentials
/// for. The OP must publish a usable discovery document.
#[instrument(skip_all, fields(op_host = %params.op_host, client_id = %params.client_id), err)]
pub async fn execute(params: RegisterSiteParams, ctx: &Context) -> Result<SiteResponse, NilaRpError> {
    require(&params.op_host, "op_host")?;
    require(&params.client_id, "client_id")?;
    require(&params.client_secret, "client_secret")?;
    require(&params.authorization_redirect_uri, "authorization_redirect_uri")?;

    Url::parse(&params.op_host)?;
    Url::parse(&params.authorization_redirect_uri)?;
    if let Some(uri) = &params.post_logout_redirect_uri {
        Url::parse(uri)?;
    }

    ctx.discovery.resolve(&params.op_host).await?;

    let site = SiteConfiguration {
        oxd_id: Uuid::new_v4().to_string(),
        op_host: params.op_host,
        client_id: params.client_id,
        client_secret: params.client_secret,
        authorization_redirect_uri: params.authorization_redirect_uri,
        post_logout_redirect_uri: params.post_logout_redirect_uri,
        scope: params.scope.unwrap_or_else(|| ctx.config.default_scopes.clone()),
        id_token: None,
        access_token: None,
        resources: Vec::new(),
    };
    let oxd_id = site.oxd_id.clone();
    ctx.site_store.create(site).await?;
    info!("Site {} registered", oxd_id);

    Ok(SiteResponse { oxd_id })
}
