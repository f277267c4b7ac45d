// src/op/update_site.rs

use super::register_site::SiteResponse;
use super::Context;
use crate::error::NilaRpError;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Only redirect URIs and scopes may change; client credentials are not
/// accepted here at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSiteParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub authorization_redirect_uri: Option<String>,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

pub async fn execute(params: UpdateSiteParams, ctx: &Context) -> Result<SiteResponse, NilaRpError> {
    let mut site = ctx.site(&params.oxd_id).await?;

    if let Some(uri) = params.authorization_redirect_uri {
        Url::parse(&uri)?;
        site.authorization_redirect_uri = uri;
    }
    if let Some(uri) = params.post_logout_redirect_uri {
        Url::parse(&uri)?;
        site.post_logout_redirect_uri = Some(uri);
    }
    if let Some(scope) = params.scope {
        site.scope = scope;
    }

    let oxd_id = site.oxd_id.clone();
    ctx.site_store.update(site).await?;
    info!("Site {} updated", oxd_id);

    Ok(SiteResponse { oxd_id })
}
