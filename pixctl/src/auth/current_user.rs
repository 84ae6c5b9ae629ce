//! Extractor for the authenticated principal.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Token from an `Authorization: Bearer` header
/// Returns:
/// - None: no Authorization header, or not a Bearer token
/// - Some(Ok(token)): Bearer token present
/// - Some(Err(error)): header present but not valid UTF-8
fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let value = headers.get(header::AUTHORIZATION)?;
    let value = match value.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    value.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Value of the session cookie, if any
fn session_cookie<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
}

#[instrument(skip_all)]
fn resolve(headers: &HeaderMap, config: &Config) -> Result<CurrentUser> {
    // An explicit bearer token wins over the cookie, and is not retried with it
    if let Some(token) = bearer_token(headers) {
        let user = session::verify_session_token(token?, config)?;
        debug!("Authenticated via bearer token: {}", user.id);
        return Ok(user);
    }

    match session_cookie(headers, &config.auth.session.cookie_name) {
        Some(token) => {
            let user = session::verify_session_token(token, config)?;
            debug!("Authenticated via session cookie: {}", user.id);
            Ok(user)
        }
        None => {
            trace!("No authentication credentials found in request");
            Err(Error::Unauthenticated { message: None })
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve(&parts.headers, &state.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use uuid::Uuid;

    fn config() -> Config {
        Config {
            secret_key: Some("test-secret".to_string()),
            ..Default::default()
        }
    }

    fn token_for(config: &Config) -> (CurrentUser, String) {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        };
        let token = session::create_session_token(&user, config, Duration::from_secs(600)).unwrap();
        (user, token)
    }

    #[test]
    fn test_no_credentials() {
        let err = resolve(&HeaderMap::new(), &config()).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_bearer_token() {
        let config = config();
        let (user, token) = token_for(&config);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());

        assert_eq!(resolve(&headers, &config).unwrap(), user);
    }

    #[test]
    fn test_session_cookie_among_others() {
        let config = config();
        let (user, token) = token_for(&config);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; pixctl_session={token}; other=1")).unwrap(),
        );

        assert_eq!(resolve(&headers, &config).unwrap(), user);
    }

    #[test]
    fn test_invalid_bearer_does_not_fall_back_to_cookie() {
        let config = config();
        let (_, token) = token_for(&config);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&format!("pixctl_session={token}")).unwrap());

        assert!(matches!(resolve(&headers, &config), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let config = config();
        let (user, token) = token_for(&config);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&format!("pixctl_session={token}")).unwrap());

        assert_eq!(resolve(&headers, &config).unwrap(), user);
    }
}
