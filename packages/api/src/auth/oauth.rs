//! # OAuth 2.0 sign-in (Kakao, GitHub, Google)
//!
//! Authorization Code flow with PKCE for whichever [`OAuthService`] is
//! configured.
//!
//! 1. **[`sign_in`](OAuthProvider::sign_in)** builds the authorize URL with a
//!    random PKCE challenge and stores the CSRF state + verifier as a
//!    [`PendingLogin`] that expires after 10 minutes.
//! 2. **[`complete`](OAuthProvider::complete)** is called by `/auth/callback`.
//!    It:
//!    - takes the pending login for the returned state (one use only, and only
//!      before it expires);
//!    - exchanges the code + verifier for an access token;
//!    - fetches the user from the service's user-info endpoint. GitHub may hide
//!      the email on `/user`; the primary verified address from `/user/emails`
//!      is used instead;
//!    - upserts the account keyed on `(service, service user id)`, so returning
//!      users get their name and avatar refreshed, and creates the pending
//!      profile on first login.

use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use store::{Account, AccountStore, OAuthStateStore, PendingLogin, ProfileStore};
use tracing::{info, warn};

use super::config::{OAuthConfig, OAuthService};
use super::{AuthMethod, CredentialProvider, OAuthCallback, SignInOutcome, SignInRequest};
use crate::error::{AppError, AppResult};
use crate::profile::begin_onboarding;
use crate::session::Session;

/// How long an authorize URL stays usable.
const PENDING_LOGIN_TTL_MINUTES: i64 = 10;

const CLIENT_USER_AGENT: &str = "todos";

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// What every service tells us about the user.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OAuthIdentity {
    provider_id: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// Kakao `/v2/user/me`.
#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: i64,
    #[serde(default)]
    kakao_account: KakaoAccount,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    profile: Option<KakaoProfile>,
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

impl From<KakaoUser> for OAuthIdentity {
    fn from(user: KakaoUser) -> Self {
        let (name, avatar_url) = match user.kakao_account.profile {
            Some(profile) => (profile.nickname, profile.profile_image_url),
            None => (None, None),
        };
        Self {
            provider_id: user.id.to_string(),
            email: user.kakao_account.email,
            name,
            avatar_url,
        }
    }
}

/// GitHub `/user`.
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// GitHub `/user/emails` entry.
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl From<GitHubUser> for OAuthIdentity {
    fn from(user: GitHubUser) -> Self {
        Self {
            provider_id: user.id.to_string(),
            email: user.email,
            name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
        }
    }
}

/// Google userinfo v2.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleUser> for OAuthIdentity {
    fn from(user: GoogleUser) -> Self {
        Self {
            provider_id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.picture,
        }
    }
}

fn primary_email(emails: Vec<GitHubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
}

fn oauth_error(e: impl std::fmt::Display) -> AppError {
    AppError::OAuth(e.to_string())
}

pub struct OAuthProvider<S> {
    config: OAuthConfig,
    store: S,
    http: reqwest::Client,
}

impl<S> OAuthProvider<S> {
    pub fn new(config: OAuthConfig, store: S) -> AppResult<Self> {
        // Token endpoints must not redirect.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(oauth_error)?;
        Ok(Self {
            config,
            store,
            http,
        })
    }

    fn client(&self) -> ConfiguredClient {
        let client = BasicClient::new(self.config.client_id.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
            .set_auth_type(AuthType::RequestBody);

        match &self.config.client_secret {
            Some(secret) => client.set_client_secret(secret.clone()),
            None => client,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, access_token: &str) -> AppResult<T> {
        self.http
            .get(url)
            .bearer_auth(access_token)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(oauth_error)?
            .json()
            .await
            .map_err(oauth_error)
    }

    async fn fetch_identity(&self, access_token: &str) -> AppResult<OAuthIdentity> {
        let service = self.config.service;
        let url = service.user_info_url();

        match service {
            OAuthService::Kakao => Ok(self.get_json::<KakaoUser>(url, access_token).await?.into()),
            OAuthService::Google => Ok(self.get_json::<GoogleUser>(url, access_token).await?.into()),
            OAuthService::GitHub => {
                let mut identity: OAuthIdentity =
                    self.get_json::<GitHubUser>(url, access_token).await?.into();
                if identity.email.is_none() {
                    let emails: Vec<GitHubEmail> = self
                        .get_json("https://api.github.com/user/emails", access_token)
                        .await?;
                    identity.email = primary_email(emails);
                }
                Ok(identity)
            }
        }
    }
}

impl<S> CredentialProvider for OAuthProvider<S>
where
    S: AccountStore + ProfileStore + OAuthStateStore + Send + Sync,
{
    fn method(&self) -> AuthMethod {
        AuthMethod::OAuth
    }

    async fn sign_in(&self, request: SignInRequest) -> AppResult<SignInOutcome> {
        if !matches!(request, SignInRequest::OAuth) {
            return Err(AppError::Unsupported("Password sign-in", self.method()));
        }

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = self
            .client()
            .authorize_url(CsrfToken::new_random)
            .add_scopes(
                self.config
                    .service
                    .scopes()
                    .iter()
                    .map(|scope| Scope::new(scope.to_string())),
            )
            .set_pkce_challenge(pkce_challenge)
            .url();

        self.store
            .put_pending_login(PendingLogin {
                state: csrf_state.secret().clone(),
                provider: self.config.service.name().to_string(),
                pkce_verifier: pkce_verifier.secret().clone(),
                expires_at: Utc::now() + Duration::minutes(PENDING_LOGIN_TTL_MINUTES),
            })
            .await?;

        Ok(SignInOutcome::Redirect(auth_url.to_string()))
    }

    async fn complete(&self, callback: OAuthCallback) -> AppResult<Session> {
        let service = self.config.service;

        let Some(verifier) = self
            .store
            .take_pending_login(&callback.state, service.name(), Utc::now())
            .await?
        else {
            warn!("Rejected {} callback with unknown or expired state", service);
            return Err(AppError::OAuthState);
        };

        let token = self
            .client()
            .exchange_code(AuthorizationCode::new(callback.code))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| AppError::OAuth(format!("Token exchange failed: {}", e)))?;

        let identity = self.fetch_identity(token.access_token().secret()).await?;

        let mut account = Account::new(service.name(), identity.provider_id);
        account.email = identity.email;
        account.name = identity.name;
        account.avatar_url = identity.avatar_url;

        let account = self.store.upsert_account(account).await?;
        begin_onboarding(&self.store, &account).await?;

        info!("User signed in with {}: {}", service, account.id);
        Ok(Session::from_account(&account))
    }
}
