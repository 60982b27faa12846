use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AuthConfig, AuthMode};

pub const OWNER_HEADER: &str = "X-Owner-Id";

/// Owner id of the authenticated caller, placed in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentOwner(pub String);

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
}

pub struct AuthService {
    mode: AuthMode,
    dev_owner_id: String,
    jwt: Option<(DecodingKey, Validation)>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let jwt = match (config.mode, config.jwt) {
            (AuthMode::Jwt, Some(jwt)) => {
                let mut validation = Validation::new(Algorithm::HS256);
                if let Some(issuer) = &jwt.issuer {
                    validation.set_issuer(&[issuer]);
                }
                Some((DecodingKey::from_secret(jwt.secret.as_bytes()), validation))
            }
            (AuthMode::Jwt, None) => anyhow::bail!("jwt auth mode requires a secret"),
            (AuthMode::None, _) => None,
        };

        Ok(Self {
            mode: config.mode,
            dev_owner_id: config.dev_owner_id,
            jwt,
        })
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Resolve the owner a request acts for, `None` when it must be rejected
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<CurrentOwner> {
        match &self.jwt {
            None => {
                let owner = headers
                    .get(OWNER_HEADER)
                    .and_then(|h| h.to_str().ok())
                    .map(str::trim)
                    .filter(|owner| !owner.is_empty())
                    .unwrap_or(self.dev_owner_id.as_str());
                Some(CurrentOwner(owner.to_string()))
            }
            Some((key, validation)) => {
                let token = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))?;

                match decode::<SessionClaims>(token.trim(), key, validation) {
                    Ok(data) if !data.claims.sub.is_empty() => Some(CurrentOwner(data.claims.sub)),
                    Ok(_) => {
                        debug!("session token has an empty subject");
                        None
                    }
                    Err(e) => {
                        debug!(error = %e, "session token rejected");
                        None
                    }
                }
            }
        }
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(&headers) {
        Some(owner) => {
            request.extensions_mut().insert(owner);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "unauthenticated API request");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid or missing session token" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        iss: Option<&'a str>,
    }

    fn token(sub: &str, iss: Option<&str>, secret: &str) -> String {
        let claims = Claims {
            sub,
            exp: chrono::Utc::now().timestamp() + 3600,
            iss,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn jwt_service(issuer: Option<&str>) -> AuthService {
        AuthService::new(AuthConfig {
            mode: AuthMode::Jwt,
            dev_owner_id: "dev".to_string(),
            jwt: Some(JwtConfig {
                secret: SECRET.to_string(),
                issuer: issuer.map(str::to_string),
            }),
        })
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn none_mode_uses_header_or_dev_owner() {
        let service = AuthService::new(AuthConfig::disabled()).unwrap();
        assert_eq!(
            service.authenticate(&HeaderMap::new()),
            Some(CurrentOwner("dev".to_string()))
        );

        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, "alice".parse().unwrap());
        assert_eq!(
            service.authenticate(&headers),
            Some(CurrentOwner("alice".to_string()))
        );
    }

    #[test]
    fn jwt_mode_takes_owner_from_subject() {
        let service = jwt_service(None);
        let headers = bearer(&token("owner-1", None, SECRET));
        assert_eq!(
            service.authenticate(&headers),
            Some(CurrentOwner("owner-1".to_string()))
        );
    }

    #[test]
    fn jwt_mode_rejects_bad_tokens() {
        let service = jwt_service(Some("https://sessions.example"));

        assert_eq!(service.authenticate(&HeaderMap::new()), None);
        assert_eq!(
            service.authenticate(&bearer(&token("x", Some("https://sessions.example"), "wrong"))),
            None
        );
        assert_eq!(
            service.authenticate(&bearer(&token("x", Some("https://elsewhere"), SECRET))),
            None
        );
        assert_eq!(
            service.authenticate(&bearer(&token("x", Some("https://sessions.example"), SECRET))),
            Some(CurrentOwner("x".to_string()))
        );
    }

    #[test]
    fn jwt_mode_ignores_owner_header() {
        let service = jwt_service(None);
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, "alice".parse().unwrap());
        assert_eq!(service.authenticate(&headers), None);
    }

    #[test]
    fn jwt_mode_without_secret_is_rejected() {
        let config = AuthConfig {
            mode: AuthMode::Jwt,
            dev_owner_id: "dev".to_string(),
            jwt: None,
        };
        assert!(AuthService::new(config).is_err());
    }
}
