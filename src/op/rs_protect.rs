// src/op/rs_protect.rs

use super::register_site::SiteResponse;
use super::Context;
use crate::error::NilaRpError;
use crate::model::ProtectedResource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsProtectParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub resources: Vec<ProtectedResource>,
    /// Replace resources registered earlier instead of failing.
    #[serde(default)]
    pub overwrite: bool,
}

/// Registers the paths a resource server protects and the scopes each HTTP
/// method needs. The resources are stored on the site and consulted by
/// `rs_check_access`.
#[instrument(skip_all, fields(oxd_id = %params.oxd_id), err)]
pub async fn execute(params: RsProtectParams, ctx: &Context) -> Result<SiteResponse, NilaRpError> {
    validate(&params.resources)?;
    let mut site = ctx.site(&params.oxd_id).await?;

    if !site.resources.is_empty() && !params.overwrite {
        return Err(NilaRpError::ResourcesAlreadyProtected(site.oxd_id));
    }

    let count = params.resources.len();
    site.resources = params.resources;
    let oxd_id = site.oxd_id.clone();
    ctx.site_store.update(site).await?;
    info!("{} resources protected", count);

    Ok(SiteResponse { oxd_id })
}

fn validate(resources: &[ProtectedResource]) -> Result<(), NilaRpError> {
    if resources.is_empty() {
        return Err(NilaRpError::MissingParameter("resources"));
    }
    let mut paths = HashSet::new();
    for resource in resources {
        if !resource.path.starts_with('/') {
            return Err(NilaRpError::InvalidParams(format!(
                "resource path must start with '/': '{}'",
                resource.path
            )));
        }
        if !paths.insert(resource.path.as_str()) {
            return Err(NilaRpError::InvalidParams(format!("duplicate resource path '{}'", resource.path)));
        }
        if resource.conditions.is_empty() {
            return Err(NilaRpError::InvalidParams(format!("resource '{}' has no conditions", resource.path)));
        }
        if resource.conditions.iter().any(|c| c.http_methods.is_empty()) {
            return Err(NilaRpError::InvalidParams(format!(
                "a condition of resource '{}' names no http_methods",
                resource.path
            )));
        }
    }
    Ok(())
}
