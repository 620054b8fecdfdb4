/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/auth.rs
 *
 * WebhookAuth: gates POST /alerts behind one of four modes. `basic` and
 * `bearer` use constant-time comparison (subtle::ConstantTimeEq) so
 * rejection timing does not leak how much of the credential matched.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use base64::Engine;
use subtle::ConstantTimeEq;

use crate::config::Settings;
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic,
    Bearer,
    OAuth2,
}

impl std::str::FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AuthMode::None),
            "basic" => Ok(AuthMode::Basic),
            "bearer" => Ok(AuthMode::Bearer),
            "oauth2" => Ok(AuthMode::OAuth2),
            other => Err(Error::Config(format!("unknown auth mode '{other}'"))),
        }
    }
}

/// The realm-qualified `WWW-Authenticate` value to send on rejection.
pub struct Challenge(pub &'static str);

pub struct WebhookAuth {
    mode: AuthMode,
    username: Option<String>,
    password: Option<String>,
    bearer_token: Option<String>,
}

impl WebhookAuth {
    /// Validates that the selected mode has its required secrets present.
    /// `oauth2` is declared but not implemented and always fails startup.
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let mode: AuthMode = settings.auth_mode.parse()?;
        match mode {
            AuthMode::None => {}
            AuthMode::Basic => {
                if settings.auth_username.is_none() || settings.auth_password.is_none() {
                    return Err(Error::Config(
                        "basic auth requires OPENFERO_AUTH_USERNAME and OPENFERO_AUTH_PASSWORD".to_string(),
                    ));
                }
            }
            AuthMode::Bearer => {
                if settings.auth_bearer_token.is_none() {
                    return Err(Error::Config(
                        "bearer auth requires OPENFERO_AUTH_TOKEN".to_string(),
                    ));
                }
            }
            AuthMode::OAuth2 => {
                return Err(Error::Config(
                    "auth mode 'oauth2' is declared but not implemented".to_string(),
                ));
            }
        }

        Ok(Self {
            mode,
            username: settings.auth_username.clone(),
            password: settings.auth_password.clone(),
            bearer_token: settings.auth_bearer_token.clone(),
        })
    }

    /// Checks the raw `Authorization` header value. `Ok(())` admits the
    /// request; `Err(Challenge)` carries the `WWW-Authenticate` value the
    /// caller should attach to a 401 response.
    pub fn check(&self, authorization: Option<&str>) -> Result<(), Challenge> {
        match self.mode {
            AuthMode::None => Ok(()),
            AuthMode::Basic => self.check_basic(authorization),
            AuthMode::Bearer => self.check_bearer(authorization),
            AuthMode::OAuth2 => Err(Challenge("Bearer realm=\"OpenFero\"")),
        }
    }

    fn check_basic(&self, authorization: Option<&str>) -> Result<(), Challenge> {
        const CHALLENGE: Challenge = Challenge("Basic realm=\"OpenFero\"");
        let header = authorization.ok_or(CHALLENGE)?;
        let encoded = header.strip_prefix("Basic ").ok_or(CHALLENGE)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CHALLENGE)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CHALLENGE)?;
        let (user, pass) = decoded.split_once(':').ok_or(CHALLENGE)?;

        let expected_user = self.username.as_deref().unwrap_or("");
        let expected_pass = self.password.as_deref().unwrap_or("");
        let user_ok: bool = user.as_bytes().ct_eq(expected_user.as_bytes()).into();
        let pass_ok: bool = pass.as_bytes().ct_eq(expected_pass.as_bytes()).into();

        if user_ok && pass_ok {
            Ok(())
        } else {
            Err(CHALLENGE)
        }
    }

    fn check_bearer(&self, authorization: Option<&str>) -> Result<(), Challenge> {
        const CHALLENGE: Challenge = Challenge("Bearer realm=\"OpenFero\"");
        let header = authorization.ok_or(CHALLENGE)?;
        let token = header.strip_prefix("Bearer ").ok_or(CHALLENGE)?;
        let expected = self.bearer_token.as_deref().unwrap_or("");
        let ok: bool = token.as_bytes().ct_eq(expected.as_bytes()).into();
        if ok {
            Ok(())
        } else {
            Err(CHALLENGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(mode: &str) -> Settings {
        let mut s = Settings::defaults_for_test();
        s.auth_mode = mode.to_string();
        s.auth_username = Some("admin".to_string());
        s.auth_password = Some("secret".to_string());
        s.auth_bearer_token = Some("tok123".to_string());
        s
    }

    #[test]
    fn none_mode_always_admits() {
        let auth = WebhookAuth::from_settings(&settings_with("none")).unwrap();
        assert!(auth.check(None).is_ok());
    }

    #[test]
    fn basic_mode_accepts_correct_credentials() {
        let auth = WebhookAuth::from_settings(&settings_with("basic")).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:secret");
        let header = format!("Basic {encoded}");
        assert!(auth.check(Some(&header)).is_ok());
    }

    #[test]
    fn basic_mode_rejects_wrong_password() {
        let auth = WebhookAuth::from_settings(&settings_with("basic")).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:wrong");
        let header = format!("Basic {encoded}");
        let err = auth.check(Some(&header)).unwrap_err();
        assert_eq!(err.0, "Basic realm=\"OpenFero\"");
    }

    #[test]
    fn bearer_mode_accepts_correct_token() {
        let auth = WebhookAuth::from_settings(&settings_with("bearer")).unwrap();
        assert!(auth.check(Some("Bearer tok123")).is_ok());
    }

    #[test]
    fn bearer_mode_rejects_missing_header() {
        let auth = WebhookAuth::from_settings(&settings_with("bearer")).unwrap();
        assert!(auth.check(None).is_err());
    }

    #[test]
    fn oauth2_mode_fails_startup_validation() {
        assert!(WebhookAuth::from_settings(&settings_with("oauth2")).is_err());
    }

    #[test]
    fn basic_mode_without_secrets_fails_startup() {
        let mut s = Settings::defaults_for_test();
        s.auth_mode = "basic".to_string();
        s.auth_username = None;
        assert!(WebhookAuth::from_settings(&s).is_err());
    }
}
