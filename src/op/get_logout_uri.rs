// src/op/get_logout_uri.rs

use super::Context;
use crate::error::NilaRpError;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetLogoutUriParams {
    #[serde(default)]
    pub oxd_id: String,
    #[serde(default)]
    pub id_token_hint: Option<String>,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub session_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutUriResponse {
    pub uri: String,
}

/// Builds an RP-initiated logout URI on the OP's `end_session_endpoint`.
///
/// The hint defaults to the site's last ID Token and the redirect to the
/// site's registered post-logout URI.
pub async fn execute(params: GetLogoutUriParams, ctx: &Context) -> Result<LogoutUriResponse, NilaRpError> {
    let site = ctx.site(&params.oxd_id).await?;
    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    let endpoint = discovery
        .end_session_endpoint
        .ok_or(NilaRpError::MissingEndpoint("end_session_endpoint"))?;

    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
    let id_token_hint = non_empty(params.id_token_hint).or(site.id_token);
    let redirect = non_empty(params.post_logout_redirect_uri).or(site.post_logout_redirect_uri);

    let mut url = Url::parse(&endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(hint) = &id_token_hint {
            query.append_pair("id_token_hint", hint);
        }
        if let Some(redirect) = &redirect {
            query.append_pair("post_logout_redirect_uri", redirect);
        }
        if let Some(state) = non_empty(params.state) {
            query.append_pair("state", &state);
        }
        if let Some(session_state) = non_empty(params.session_state) {
            query.append_pair("session_state", &session_state);
        }
    }
    // An empty query_pairs_mut() still leaves a trailing '?'.
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(LogoutUriResponse { uri: url.to_string() })
}
