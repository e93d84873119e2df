//! Transport of the access token between client and server: a named
//! cookie, with an `Authorization: Bearer` header as fallback on read.

use bastion_core::error::{BastionError, BastionResult};
use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE, HeaderValue, SET_COOKIE};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Reads and writes the access-token cookie on request and response
/// headers.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    cookie_name: String,
    max_age_secs: u64,
}

impl CredentialStore {
    pub fn new(cookie_name: impl Into<String>, max_age_secs: u64) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            max_age_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.cookie_name.clone(), config.cookie_max_age_secs)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The token from the named cookie, or failing that the bearer header.
    pub fn get(&self, headers: &HeaderMap) -> BastionResult<String> {
        self.cookie_value(headers)
            .or_else(|| bearer_token(headers))
            .ok_or_else(|| AuthError::CredentialMissing.into())
    }

    /// Append a `Set-Cookie` carrying `token`.
    pub fn set(&self, headers: &mut HeaderMap, token: &str) -> BastionResult<()> {
        let cookie = self.render(token, self.max_age_secs);
        headers.append(SET_COOKIE, header_value(&cookie)?);
        Ok(())
    }

    /// Append a `Set-Cookie` that expires the credential immediately.
    pub fn delete(&self, headers: &mut HeaderMap) -> BastionResult<()> {
        let cookie = self.render("", 0);
        headers.append(SET_COOKIE, header_value(&cookie)?);
        Ok(())
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        format!(
            "{}={value}; Path=/; Max-Age={max_age}; HttpOnly; Secure; SameSite=None",
            self.cookie_name
        )
    }

    fn cookie_value(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == self.cookie_name && !value.is_empty()).then(|| value.to_string())
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn header_value(raw: &str) -> BastionResult<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| BastionError::validation(format!("invalid cookie value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::from_config(&AuthConfig::default())
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; bastion_token=abc.def.ghi; lang=en"),
        );
        assert_eq!(store().get(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("bastion_token=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(store().get(&headers).unwrap(), "from-cookie");
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(store().get(&headers).unwrap(), "xyz");
    }

    #[test]
    fn basic_auth_is_not_a_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        let err = store().get(&headers).unwrap_err();
        assert!(matches!(
            err,
            BastionError::Unauthorized {
                code: "credential_missing",
                ..
            }
        ));
    }

    #[test]
    fn missing_credential_is_unauthorized() {
        let err = store().get(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, BastionError::Unauthorized { .. }));
    }

    #[test]
    fn set_writes_hardened_cookie() {
        let mut headers = HeaderMap::new();
        store().set(&mut headers, "tok").unwrap();
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert_eq!(
            cookie,
            "bastion_token=tok; Path=/; Max-Age=1800; HttpOnly; Secure; SameSite=None"
        );
    }

    #[test]
    fn delete_expires_cookie() {
        let mut headers = HeaderMap::new();
        store().delete(&mut headers).unwrap();
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("bastion_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn control_characters_are_rejected() {
        let mut headers = HeaderMap::new();
        let err = store().set(&mut headers, "bad\nvalue").unwrap_err();
        assert!(matches!(err, BastionError::Validation { .. }));
    }
}
