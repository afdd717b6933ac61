//! OAuth service endpoints and client configuration.

use std::fmt;

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Where `AUTH_REDIRECT_URI` points when unset.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/auth/callback";

/// Supported OAuth services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthService {
    #[default]
    Kakao,
    #[serde(rename = "github")]
    GitHub,
    Google,
}

impl OAuthService {
    /// Provider name stored on accounts.
    pub fn name(self) -> &'static str {
        match self {
            Self::Kakao => "kakao",
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }

    fn env_prefix(self) -> &'static str {
        match self {
            Self::Kakao => "KAKAO",
            Self::GitHub => "GITHUB",
            Self::Google => "GOOGLE",
        }
    }

    pub fn auth_url(self) -> &'static str {
        match self {
            Self::Kakao => "https://kauth.kakao.com/oauth/authorize",
            Self::GitHub => "https://github.com/login/oauth/authorize",
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    pub fn token_url(self) -> &'static str {
        match self {
            Self::Kakao => "https://kauth.kakao.com/oauth/token",
            Self::GitHub => "https://github.com/login/oauth/access_token",
            Self::Google => "https://oauth2.googleapis.com/token",
        }
    }

    pub fn user_info_url(self) -> &'static str {
        match self {
            Self::Kakao => "https://kapi.kakao.com/v2/user/me",
            Self::GitHub => "https://api.github.com/user",
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
        }
    }

    pub fn scopes(self) -> &'static [&'static str] {
        match self {
            Self::Kakao => &["profile_nickname", "profile_image", "account_email"],
            Self::GitHub => &["user:email", "read:user"],
            Self::Google => &["openid", "email", "profile"],
        }
    }
}

impl fmt::Display for OAuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OAuth client configuration for one service.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service: OAuthService,
    pub client_id: ClientId,
    /// Kakao apps may run without a client secret.
    pub client_secret: Option<ClientSecret>,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

fn invalid_url(e: impl fmt::Display) -> AppError {
    AppError::OAuth(e.to_string())
}

impl OAuthConfig {
    pub fn new(
        service: OAuthService,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_url: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            service,
            client_id: ClientId::new(client_id.into()),
            client_secret: client_secret
                .filter(|secret| !secret.is_empty())
                .map(ClientSecret::new),
            auth_url: AuthUrl::new(service.auth_url().to_string()).map_err(invalid_url)?,
            token_url: TokenUrl::new(service.token_url().to_string()).map_err(invalid_url)?,
            redirect_url: RedirectUrl::new(redirect_url.into()).map_err(invalid_url)?,
        })
    }

    /// Read `{SERVICE}_CLIENT_ID`, `{SERVICE}_CLIENT_SECRET` and
    /// `AUTH_REDIRECT_URI` from the environment (and `.env`).
    pub fn from_env(service: OAuthService) -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let prefix = service.env_prefix();
        let client_id = std::env::var(format!("{prefix}_CLIENT_ID"))
            .map_err(|_| AppError::OAuth(format!("{prefix}_CLIENT_ID not set")))?;
        let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok();
        let redirect_uri = std::env::var("AUTH_REDIRECT_URI")
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());

        Self::new(service, client_id, client_secret, redirect_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names_match_serde() {
        for service in [OAuthService::Kakao, OAuthService::GitHub, OAuthService::Google] {
            let json = format!("\"{}\"", service.name());
            let parsed: OAuthService = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, service);
        }
        assert_eq!(OAuthService::default(), OAuthService::Kakao);
    }

    #[test]
    fn test_empty_secret_is_none() {
        let config = OAuthConfig::new(
            OAuthService::Kakao,
            "client",
            Some(String::new()),
            DEFAULT_REDIRECT_URI,
        )
        .unwrap();
        assert!(config.client_secret.is_none());
        assert_eq!(config.auth_url.as_str(), "https://kauth.kakao.com/oauth/authorize");
    }

    #[test]
    fn test_bad_redirect_is_an_error() {
        let result = OAuthConfig::new(OAuthService::GitHub, "client", None, "not a url");
        assert!(matches!(result, Err(AppError::OAuth(_))));
    }
}
