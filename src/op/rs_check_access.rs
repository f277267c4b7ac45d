// src/op/rs_check_access.rs

use super::{require, Context};
use crate::error::NilaRpError;
use crate::http::HttpRequest;
use crate::model::{IntrospectionResponse, ResourceCondition};
use crate::validator::unix_now;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsCheckAccessParams {
    #[serde(default)]
    pub oxd_id: String,
    /// The token presented to the resource server; may be empty.
    #[serde(default)]
    pub rpt: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub http_method: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsCheckAccessResponse {
    pub access: Access,
    /// Challenge the resource server should return with a 401 or 403.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub www_authenticate_header: Option<String>,
}

#[derive(Serialize)]
struct IntrospectionRequest<'a> {
    token: &'a str,
    token_type_hint: &'static str,
}

/// Decides whether a request to a protected path may proceed.
///
/// Access is granted only when a condition covers the HTTP method and the
/// OP reports the token active with every scope that condition names.
#[instrument(skip_all, fields(oxd_id = %params.oxd_id, path = %params.path), err)]
pub async fn execute(params: RsCheckAccessParams, ctx: &Context) -> Result<RsCheckAccessResponse, NilaRpError> {
    require(&params.path, "path")?;
    require(&params.http_method, "http_method")?;
    let site = ctx.site(&params.oxd_id).await?;

    let resource = site
        .resources
        .iter()
        .find(|r| r.path == params.path)
        .ok_or_else(|| NilaRpError::PathNotProtected(params.path.clone()))?;

    let Some(condition) = resource.condition_for(&params.http_method) else {
        debug!("No condition covers method {}", params.http_method);
        return Ok(denied(None, &[]));
    };

    if params.rpt.is_empty() {
        return Ok(denied(None, &condition.scopes));
    }

    let discovery = ctx.discovery.resolve(&site.op_host).await?;
    let endpoint = discovery
        .introspection_endpoint
        .ok_or(NilaRpError::MissingEndpoint("introspection_endpoint"))?;
    let form = IntrospectionRequest {
        token: &params.rpt,
        token_type_hint: "access_token",
    };
    let request = HttpRequest::post_form(&endpoint, &form)?
        .basic_auth(&site.client_id, &site.client_secret)
        .header("Accept", "application/json");
    let response = ctx.http.execute(request).await?;
    if !response.is_success() {
        error!("Introspection failed with status {}", response.status);
        return Err(NilaRpError::IntrospectionFailed { status: response.status });
    }
    let introspection: IntrospectionResponse = response
        .json()
        .map_err(|e| NilaRpError::InvalidOpResponse(format!("introspection endpoint: {}", e)))?;

    Ok(decide(&introspection, condition))
}

fn decide(introspection: &IntrospectionResponse, condition: &ResourceCondition) -> RsCheckAccessResponse {
    let expired = introspection.exp.is_some_and(|exp| exp <= unix_now());
    if !introspection.active || expired {
        return denied(Some("invalid_token"), &condition.scopes);
    }
    let granted = introspection.scopes();
    if condition.scopes.iter().all(|s| granted.contains(&s.as_str())) {
        RsCheckAccessResponse {
            access: Access::Granted,
            www_authenticate_header: None,
        }
    } else {
        denied(Some("insufficient_scope"), &condition.scopes)
    }
}

// RFC 6750 §3: no error code when the request carried no token.
fn denied(error: Option<&str>, scopes: &[String]) -> RsCheckAccessResponse {
    let mut params = Vec::new();
    if let Some(error) = error {
        params.push(format!("error=\"{}\"", error));
    }
    if !scopes.is_empty() {
        params.push(format!("scope=\"{}\"", scopes.join(" ")));
    }
    let header = if params.is_empty() {
        "Bearer".to_string()
    } else {
        format!("Bearer {}", params.join(", "))
    };
    RsCheckAccessResponse {
        access: Access::Denied,
        www_authenticate_header: Some(header),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(scopes: &[&str]) -> ResourceCondition {
        ResourceCondition {
            http_methods: vec!["GET".to_string()],
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn introspection(active: bool, scope: &str) -> IntrospectionResponse {
        IntrospectionResponse {
            active,
            scope: Some(scope.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn every_required_scope_must_be_granted() {
        let read_write = condition(&["read", "write"]);
        assert_eq!(decide(&introspection(true, "write read extra"), &read_write).access, Access::Granted);

        let partial = decide(&introspection(true, "read"), &read_write);
        assert_eq!(partial.access, Access::Denied);
        assert_eq!(
            partial.www_authenticate_header.as_deref(),
            Some("Bearer error=\"insufficient_scope\", scope=\"read write\"")
        );
    }

    #[test]
    fn inactive_or_expired_tokens_are_denied() {
        let read = condition(&["read"]);
        let inactive = decide(&introspection(false, "read"), &read);
        assert_eq!(inactive.access, Access::Denied);
        assert_eq!(
            inactive.www_authenticate_header.as_deref(),
            Some("Bearer error=\"invalid_token\", scope=\"read\"")
        );

        let mut expired = introspection(true, "read");
        expired.exp = Some(unix_now() - 1);
        assert_eq!(decide(&expired, &read).access, Access::Denied);
    }

    #[test]
    fn challenge_without_token_has_no_error_code() {
        assert_eq!(denied(None, &[]).www_authenticate_header.as_deref(), Some("Bearer"));
        assert_eq!(
            denied(None, &["read".to_string()]).www_authenticate_header.as_deref(),
            Some("Bearer scope=\"read\"")
        );
    }
}
