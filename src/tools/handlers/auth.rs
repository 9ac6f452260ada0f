//! Account tools: login (password or browser authorization), registration, profile.
//!
//! `login_user` drives the sign-in state machine:
//! unauthenticated → pending authorization → authenticated. A pending code is
//! tracked in [`crate::auth::PendingAuthStore`] until the backend reports it
//! approved or denied, or until it expires.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::common::{recover, require_login};
use crate::auth::PendingLookup;
use crate::client::{AuthState, NewUser, User};
use crate::envelope::ResponseEnvelope;
use crate::tools::catalog::{ParamDef, ParamType, ToolDefinition};
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::registry::ToolRegistry;
use crate::types::{AuthCode, Error, Result};
use crate::validation::{validate_non_empty, validate_phone};

const INVALID_CREDENTIALS: &str =
    "Invalid email or password. Please check your credentials and try again.";

const MIN_PASSWORD_LEN: usize = 6;

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(LoginUser)?;
    registry.register(RegisterUser)?;
    registry.register(GetCurrentUser)?;
    Ok(())
}

fn display_name(user: Option<&User>) -> String {
    user.map(|u| u.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "there".to_string())
}

fn session_active(user: Option<&User>) -> serde_json::Value {
    json!({
        "status": "approved",
        "sessionActive": true,
        "user": user,
    })
}

// =============================================================================
// login_user
// =============================================================================

#[derive(Debug)]
pub struct LoginUser;

#[derive(Debug, Deserialize)]
struct LoginParams {
    email: Option<String>,
    password: Option<String>,
    auth_code: Option<String>,
}

#[async_trait]
impl ToolHandler for LoginUser {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "login_user",
            "Sign in. Without arguments starts a browser sign-in and returns an auth_code and \
             auth_url for the user to open; call again with that auth_code to finish. \
             Email and password may be given instead. Required before cart, address and order tools.",
        )
        .param(ParamDef::optional("email", ParamType::String, "Account email"))
        .param(ParamDef::optional("password", ParamType::String, "Account password"))
        .param(ParamDef::optional(
            "auth_code",
            ParamType::String,
            "Code returned by a previous login_user call",
        ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: LoginParams = params.parse()?;

        if let Some(code) = p.auth_code.filter(|c| !c.trim().is_empty()) {
            let code = AuthCode::from_string(code.trim().to_string()).map_err(Error::validation)?;
            return complete_authorization(ctx, code).await;
        }

        if ctx.client.is_authenticated().await {
            match ctx.client.get_me().await {
                Ok(user) => {
                    return Ok(ResponseEnvelope::success(format!(
                        "You are already logged in as {}.",
                        display_name(Some(&user))
                    ))
                    .with_data(session_active(Some(&user))));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "stored_session_rejected");
                    ctx.client.clear_session().await;
                }
            }
        }

        match (p.email, p.password) {
            (Some(email), Some(password)) => password_login(ctx, &email, &password).await,
            (None, None) => start_authorization(ctx).await,
            _ => Err(Error::validation(
                "email and password must be provided together",
            )),
        }
    }
}

async fn password_login(ctx: &ToolContext, email: &str, password: &str) -> Result<ResponseEnvelope> {
    validate_non_empty(email, "email")?;
    validate_non_empty(password, "password")?;

    match ctx.client.login(email, password).await {
        Ok(session) => {
            let user = session.user.clone();
            ctx.client.set_session(session.token, session.user).await;
            tracing::info!("login_succeeded");
            Ok(ResponseEnvelope::success(format!(
                "Login successful! Welcome, {}.",
                display_name(user.as_ref())
            ))
            .with_data(session_active(user.as_ref())))
        }
        Err(err) if is_bad_credentials(&err) => Ok(ResponseEnvelope::failure(INVALID_CREDENTIALS)),
        Err(err) => Err(err),
    }
}

fn is_bad_credentials(err: &Error) -> bool {
    match err {
        Error::Api { status, message } => *status == 401 || message.contains("Invalid"),
        _ => false,
    }
}

async fn start_authorization(ctx: &ToolContext) -> Result<ResponseEnvelope> {
    let challenge = ctx.client.request_auth().await?;
    let code = AuthCode::from_string(challenge.code)
        .map_err(|e| Error::transport(format!("backend issued an unusable code: {}", e)))?;

    let pending = ctx
        .pending
        .insert(code, challenge.auth_url, challenge.expires_in)
        .await;
    let expires_in = pending.remaining_secs(pending.created_at);

    tracing::info!(expires_in, "authorization_started");
    Ok(ResponseEnvelope::failure(format!(
        "Sign-in required. Ask the user to open {} and approve the sign-in, then call \
         login_user with auth_code \"{}\". The code expires in {} seconds.",
        pending.auth_url, pending.code, expires_in
    ))
    .with_data(json!({
        "status": "pending",
        "auth_code": pending.code,
        "auth_url": pending.auth_url,
        "expires_in": expires_in,
    }))
    .requiring_user_action())
}

async fn complete_authorization(ctx: &ToolContext, code: AuthCode) -> Result<ResponseEnvelope> {
    let auth_url = match ctx.pending.lookup(&code).await {
        PendingLookup::Expired => {
            return Ok(ResponseEnvelope::failure(format!(
                "Authorization code \"{}\" has expired. Call login_user without auth_code to start a new sign-in.",
                code
            ))
            .with_data(json!({"status": "expired", "auth_code": code})));
        }
        PendingLookup::Active(pending) => Some(pending.auth_url),
        PendingLookup::Unknown => None,
    };

    let status = match ctx.client.check_auth_status(code.as_str()).await {
        Ok(status) => status,
        Err(err) if err.is_not_found() => {
            ctx.pending.remove(&code).await;
            return Ok(ResponseEnvelope::failure(format!(
                "Authorization code \"{}\" is not recognised. Call login_user without auth_code to start a new sign-in.",
                code
            )));
        }
        Err(err) => return Err(err),
    };

    match status.status {
        AuthState::Approved => {
            let Some(token) = status.token else {
                ctx.pending.remove(&code).await;
                return Err(Error::transport("approved authorization carried no token"));
            };
            let user = status.user;
            ctx.client.set_session(token, user.clone()).await;
            ctx.pending.remove(&code).await;
            tracing::info!("authorization_approved");
            Ok(ResponseEnvelope::success(format!(
                "Login successful! Welcome, {}.",
                display_name(user.as_ref())
            ))
            .with_data(session_active(user.as_ref())))
        }
        AuthState::Denied => {
            ctx.pending.remove(&code).await;
            tracing::info!("authorization_denied");
            Ok(ResponseEnvelope::failure(
                "Sign-in was denied. Call login_user without auth_code if the user wants to try again.",
            )
            .with_data(json!({"status": "denied", "auth_code": code})))
        }
        AuthState::Expired => {
            ctx.pending.remove(&code).await;
            Ok(ResponseEnvelope::failure(
                "The sign-in request expired before it was approved. Call login_user without auth_code to start again.",
            )
            .with_data(json!({"status": "expired", "auth_code": code})))
        }
        AuthState::Pending => Ok(ResponseEnvelope::failure(format!(
            "Still waiting for the user to approve the sign-in{}. Call login_user with auth_code \"{}\" again once they have.",
            auth_url
                .as_deref()
                .map(|u| format!(" at {}", u))
                .unwrap_or_default(),
            code
        ))
        .with_data(json!({
            "status": "pending",
            "auth_code": code,
            "auth_url": auth_url,
        }))
        .requiring_user_action()),
    }
}

// =============================================================================
// register_user
// =============================================================================

#[derive(Debug)]
pub struct RegisterUser;

#[derive(Debug, Deserialize)]
struct RegisterParams {
    email: String,
    password: String,
    name: String,
    phone: String,
}

#[async_trait]
impl ToolHandler for RegisterUser {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "register_user",
            "Create a new account and sign in. Phone must be a 10-digit mobile number \
             starting with 6-9; password at least 6 characters.",
        )
        .param(ParamDef::required("email", ParamType::String, "Account email"))
        .param(ParamDef::required("password", ParamType::String, "Password (min 6 characters)"))
        .param(ParamDef::required("name", ParamType::String, "Full name"))
        .param(ParamDef::required("phone", ParamType::String, "10-digit mobile number"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: RegisterParams = params.parse()?;
        validate_non_empty(&p.name, "name")?;
        if !p.email.contains('@') {
            return Err(Error::validation(format!("'{}' is not an email address", p.email)));
        }
        if p.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        validate_phone(&p.phone)?;

        let session = ctx
            .client
            .register(&NewUser {
                email: p.email,
                password: p.password,
                name: p.name,
                phone: p.phone,
            })
            .await?;

        let user = session.user.clone();
        ctx.client.set_session(session.token, session.user).await;
        Ok(ResponseEnvelope::success(format!(
            "Account created. You are now logged in as {}.",
            display_name(user.as_ref())
        ))
        .with_data(session_active(user.as_ref())))
    }
}

// =============================================================================
// get_current_user
// =============================================================================

#[derive(Debug)]
pub struct GetCurrentUser;

#[async_trait]
impl ToolHandler for GetCurrentUser {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_current_user", "Get the signed-in user's profile.")
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        match ctx.client.get_me().await {
            Ok(user) => Ok(ResponseEnvelope::success(format!(
                "Signed in as {} ({}).",
                display_name(Some(&user)),
                user.email
            ))
            .with_data(json!({"user": user}))),
            Err(err) => recover(ctx, err, "User profile not found. Call login_user to sign in again.").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingAuthStore;
    use crate::client::{AuthChallenge, AuthSession, AuthStatus, MockApiClient};
    use crate::types::ToolsConfig;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn user(name: &str) -> User {
        serde_json::from_value(json!({"_id": "u1", "name": name, "email": "a@b.com"})).unwrap()
    }

    fn ctx_with(mock: MockApiClient, pending: Arc<PendingAuthStore>) -> ToolContext {
        ToolContext::new(Arc::new(mock), pending, ToolsConfig::default())
    }

    fn store() -> Arc<PendingAuthStore> {
        Arc::new(PendingAuthStore::new(Duration::from_secs(600)))
    }

    async fn login(ctx: &ToolContext, args: Value) -> ResponseEnvelope {
        LoginUser.call(ctx, Params::new(args)).await.unwrap()
    }

    #[tokio::test]
    async fn test_no_args_starts_pending_authorization() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_request_auth().times(1).returning(|| {
            Ok(AuthChallenge {
                code: "AB12".to_string(),
                auth_url: "https://minutes.example/device?code=AB12".to_string(),
                expires_in: Some(300),
            })
        });
        let pending = store();
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({})).await;
        assert!(!env.success);
        assert!(env.needs_user_action());
        let data = env.data.unwrap();
        assert_eq!(data["status"], "pending");
        assert_eq!(data["auth_code"], "AB12");
        assert_eq!(data["expires_in"], 300);
        assert_eq!(pending.len().await, 1);
    }

    #[tokio::test]
    async fn test_pending_code_stays_pending() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status()
            .withf(|code| code == "AB12")
            .returning(|_| {
                Ok(AuthStatus {
                    status: AuthState::Pending,
                    token: None,
                    user: None,
                })
            });
        let pending = store();
        pending
            .insert(
                AuthCode::from_string("AB12".to_string()).unwrap(),
                "https://auth/AB12".to_string(),
                None,
            )
            .await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({"auth_code": "AB12"})).await;
        assert!(!env.success);
        assert!(env.needs_user_action());
        let data = env.data.unwrap();
        assert_eq!(data["status"], "pending");
        assert_eq!(data["auth_code"], "AB12");
        assert_eq!(data["auth_url"], "https://auth/AB12");
        assert_eq!(pending.len().await, 1);
    }

    #[tokio::test]
    async fn test_approved_code_activates_session() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status().returning(|_| {
            Ok(AuthStatus {
                status: AuthState::Approved,
                token: Some("jwt".to_string()),
                user: Some(user("Asha")),
            })
        });
        mock.expect_set_session()
            .withf(|token, user| token == "jwt" && user.is_some())
            .times(1)
            .returning(|_, _| ());
        let pending = store();
        let code = AuthCode::from_string("AB12".to_string()).unwrap();
        pending.insert(code.clone(), "u".to_string(), None).await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({"auth_code": "AB12"})).await;
        assert!(env.success);
        assert!(env.message.contains("Asha"));
        assert_eq!(env.data.unwrap()["sessionActive"], true);
        assert_eq!(pending.lookup(&code).await, PendingLookup::Unknown);
    }

    #[tokio::test]
    async fn test_denied_code_is_terminal() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status().returning(|_| {
            Ok(AuthStatus {
                status: AuthState::Denied,
                token: None,
                user: None,
            })
        });
        let pending = store();
        let code = AuthCode::from_string("AB12".to_string()).unwrap();
        pending.insert(code.clone(), "u".to_string(), None).await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({"auth_code": "AB12"})).await;
        assert!(!env.success);
        assert!(!env.needs_user_action());
        assert!(env.message.contains("denied"));
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_locally_expired_code_skips_backend() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status().never();
        let pending = store();
        let code = AuthCode::from_string("AB12".to_string()).unwrap();
        pending.insert(code.clone(), "u".to_string(), Some(0)).await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({"auth_code": "AB12"})).await;
        assert!(!env.success);
        assert!(env.message.contains("has expired"));
        let data = env.data.unwrap();
        assert_eq!(data["status"], "expired");
        assert_eq!(data["auth_code"], "AB12");
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_backend_expired_code_is_dropped() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status().returning(|_| {
            Ok(AuthStatus {
                status: AuthState::Expired,
                token: None,
                user: None,
            })
        });
        mock.expect_set_session().never();
        let pending = store();
        let code = AuthCode::from_string("AB12".to_string()).unwrap();
        pending.insert(code.clone(), "u".to_string(), None).await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let env = login(&ctx, json!({"auth_code": "AB12"})).await;
        assert!(!env.success);
        assert!(!env.needs_user_action());
        assert!(env.message.contains("expired before it was approved"));
        assert_eq!(env.data.unwrap()["status"], "expired");
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_approved_without_token_drops_code() {
        let mut mock = MockApiClient::new();
        mock.expect_check_auth_status().returning(|_| {
            Ok(AuthStatus {
                status: AuthState::Approved,
                token: None,
                user: Some(user("Asha")),
            })
        });
        mock.expect_set_session().never();
        let pending = store();
        let code = AuthCode::from_string("AB12".to_string()).unwrap();
        pending.insert(code.clone(), "u".to_string(), None).await;
        let ctx = ctx_with(mock, Arc::clone(&pending));

        let err = LoginUser
            .call(&ctx, Params::new(json!({"auth_code": "AB12"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_already_logged_in_reverifies() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_get_me().times(1).returning(|| Ok(user("Asha")));
        let ctx = ctx_with(mock, store());

        let env = login(&ctx, json!({})).await;
        assert!(env.success);
        assert!(env.message.contains("already logged in"));
        assert_eq!(env.data.unwrap()["sessionActive"], true);
    }

    #[tokio::test]
    async fn test_stale_session_falls_back_to_password_login() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_get_me()
            .returning(|| Err(Error::api(401, "jwt expired")));
        mock.expect_clear_session().times(1).returning(|| ());
        mock.expect_login().times(1).returning(|_, _| {
            Ok(AuthSession {
                token: "fresh".to_string(),
                user: Some(user("Asha")),
            })
        });
        mock.expect_set_session().times(1).returning(|_, _| ());
        let ctx = ctx_with(mock, store());

        let env = login(&ctx, json!({"email": "a@b.com", "password": "secret1"})).await;
        assert!(env.success);
        assert!(env.message.starts_with("Login successful"));
    }

    #[tokio::test]
    async fn test_invalid_credentials_message() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_login()
            .returning(|_, _| Err(Error::api(400, "Invalid credentials")));
        let ctx = ctx_with(mock, store());

        let env = login(&ctx, json!({"email": "a@b.com", "password": "wrong"})).await;
        assert!(!env.success);
        assert_eq!(env.message, INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_email_without_password_is_validation_error() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        let ctx = ctx_with(mock, store());

        let err = LoginUser
            .call(&ctx, Params::new(json!({"email": "a@b.com"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_phone_before_backend() {
        let ctx = ctx_with(MockApiClient::new(), store());
        let err = RegisterUser
            .call(
                &ctx,
                Params::new(json!({
                    "email": "a@b.com", "password": "secret1", "name": "Asha", "phone": "12345"
                })),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("phone"));
    }

    #[tokio::test]
    async fn test_get_current_user_requires_login() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        let ctx = ctx_with(mock, store());
        let env = GetCurrentUser.call(&ctx, Params::new(json!({}))).await.unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }
}
