// src/op/mod.rs

//! Command handlers.
//!
//! Each module holds the typed params of one command, its response payload,
//! and a free `execute` function taking an explicit [`Context`].

pub mod authorization_code_flow;
pub mod check_access_token;
pub mod check_id_token;
pub mod get_authorization_code;
pub mod get_authorization_url;
pub mod get_logout_uri;
pub mod get_tokens_by_code;
pub mod get_user_info;
pub mod implicit_flow;
pub mod register_site;
pub mod rs_check_access;
pub mod rs_protect;
pub mod update_site;

use crate::command::CommandType;
use crate::config::Config;
use crate::discovery::{Discovery, HttpDiscovery};
use crate::error::NilaRpError;
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::keys::KeyResolver;
use crate::site::{InMemorySiteStore, SiteConfiguration, SiteStore};
use crate::state::{InMemoryStateRegistry, NonceRegistry, StateRegistry};
use crate::validator::IdTokenValidator;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use authorization_code_flow::AuthorizationCodeFlowParams;
use check_access_token::CheckAccessTokenParams;
use check_id_token::CheckIdTokenParams;
use get_authorization_code::GetAuthorizationCodeParams;
use get_authorization_url::GetAuthorizationUrlParams;
use get_logout_uri::GetLogoutUriParams;
use get_tokens_by_code::GetTokensByCodeParams;
use get_user_info::GetUserInfoParams;
use implicit_flow::ImplicitFlowParams;
use register_site::RegisterSiteParams;
use rs_check_access::RsCheckAccessParams;
use rs_protect::RsProtectParams;
use update_site::UpdateSiteParams;

/// The collaborators every handler works with.
///
/// Cloning is cheap; all members are shared and synchronize internally.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub discovery: Arc<dyn Discovery>,
    pub http: Arc<dyn HttpClient>,
    pub site_store: Arc<dyn SiteStore>,
    pub state_registry: Arc<dyn StateRegistry>,
    pub nonce_registry: Arc<dyn NonceRegistry>,
}

impl Context {
    /// Wires the in-process collaborators: a reqwest HTTP client, cached HTTP
    /// discovery, an in-memory site store and an in-memory state registry.
    pub fn with_defaults(config: Config) -> Result<Self, NilaRpError> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(config.http_timeout)?);
        let discovery = Arc::new(HttpDiscovery::new(http.clone(), config.discovery_cache_ttl));
        let registry = Arc::new(InMemoryStateRegistry::new(config.state_ttl));

        Ok(Self {
            config: Arc::new(config),
            discovery,
            http,
            site_store: Arc::new(InMemorySiteStore::new()),
            state_registry: registry.clone(),
            nonce_registry: registry,
        })
    }

    pub fn key_resolver(&self) -> KeyResolver {
        KeyResolver::new(self.http.clone())
    }

    pub fn id_token_validator(&self) -> IdTokenValidator {
        IdTokenValidator::new(self.key_resolver(), self.config.validation.clone())
    }

    /// Loads the site a command refers to.
    pub async fn site(&self, oxd_id: &str) -> Result<SiteConfiguration, NilaRpError> {
        if oxd_id.is_empty() {
            return Err(NilaRpError::MissingParameter("oxd_id"));
        }
        self.site_store
            .get(oxd_id)
            .await?
            .ok_or_else(|| NilaRpError::InvalidOxdId(oxd_id.to_string()))
    }
}

/// A dispatched command: one variant per [`CommandType`], carrying its typed params.
#[derive(Debug, Clone)]
pub enum Operation {
    GetAuthorizationUrl(GetAuthorizationUrlParams),
    GetTokensByCode(GetTokensByCodeParams),
    CheckIdToken(CheckIdTokenParams),
    CheckAccessToken(CheckAccessTokenParams),
    GetUserInfo(GetUserInfoParams),
    RegisterSite(RegisterSiteParams),
    UpdateSite(UpdateSiteParams),
    GetLogoutUri(GetLogoutUriParams),
    GetAuthorizationCode(GetAuthorizationCodeParams),
    AuthorizationCodeFlow(AuthorizationCodeFlowParams),
    ImplicitFlow(ImplicitFlowParams),
    RsProtect(RsProtectParams),
    RsCheckAccess(RsCheckAccessParams),
}

impl Operation {
    pub fn command_type(&self) -> CommandType {
        match self {
            Operation::GetAuthorizationUrl(_) => CommandType::GetAuthorizationUrl,
            Operation::GetTokensByCode(_) => CommandType::GetTokensByCode,
            Operation::CheckIdToken(_) => CommandType::CheckIdToken,
            Operation::CheckAccessToken(_) => CommandType::CheckAccessToken,
            Operation::GetUserInfo(_) => CommandType::GetUserInfo,
            Operation::RegisterSite(_) => CommandType::RegisterSite,
            Operation::UpdateSite(_) => CommandType::UpdateSite,
            Operation::GetLogoutUri(_) => CommandType::GetLogoutUri,
            Operation::GetAuthorizationCode(_) => CommandType::GetAuthorizationCode,
            Operation::AuthorizationCodeFlow(_) => CommandType::AuthorizationCodeFlow,
            Operation::ImplicitFlow(_) => CommandType::ImplicitFlow,
            Operation::RsProtect(_) => CommandType::RsProtect,
            Operation::RsCheckAccess(_) => CommandType::RsCheckAccess,
        }
    }

    /// Runs the handler and serializes its response payload.
    pub async fn execute(self, ctx: &Context) -> Result<Value, NilaRpError> {
        match self {
            Operation::GetAuthorizationUrl(params) => payload(get_authorization_url::execute(params, ctx).await?),
            Operation::GetTokensByCode(params) => payload(get_tokens_by_code::execute(params, ctx).await?),
            Operation::CheckIdToken(params) => payload(check_id_token::execute(params, ctx).await?),
            Operation::CheckAccessToken(params) => payload(check_access_token::execute(params, ctx).await?),
            Operation::GetUserInfo(params) => payload(get_user_info::execute(params, ctx).await?),
            Operation::RegisterSite(params) => payload(register_site::execute(params, ctx).await?),
            Operation::UpdateSite(params) => payload(update_site::execute(params, ctx).await?),
            Operation::GetLogoutUri(params) => payload(get_logout_uri::execute(params, ctx).await?),
            Operation::GetAuthorizationCode(params) => payload(get_authorization_code::execute(params, ctx).await?),
            Operation::AuthorizationCodeFlow(params) => payload(authorization_code_flow::execute(params, ctx).await?),
            Operation::ImplicitFlow(params) => payload(implicit_flow::execute(params, ctx).await?),
            Operation::RsProtect(params) => payload(rs_protect::execute(params, ctx).await?),
            Operation::RsCheckAccess(params) => payload(rs_check_access::execute(params, ctx).await?),
        }
    }
}

fn payload<T: Serialize>(response: T) -> Result<Value, NilaRpError> {
    serde_json::to_value(response).map_err(|e| NilaRpError::Internal(format!("failed to serialize response: {}", e)))
}

/// Rejects an empty required parameter.
pub(crate) fn require(value: &str, name: &'static str) -> Result<(), NilaRpError> {
    if value.is_empty() {
        Err(NilaRpError::MissingParameter(name))
    } else {
        Ok(())
    }
}
