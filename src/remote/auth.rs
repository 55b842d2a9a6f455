use serde::Deserialize;

use crate::error::{Error, Result};

use super::Remote;

/// Outcome of a password login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    Token(String),
    /// The account has two-factor enabled; a code must be verified against `otp_id`.
    TwoFactor { otp_id: String },
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthResponse {
    #[serde(default, alias = "token")]
    pub dev_token: Option<String>,
    #[serde(default)]
    pub is_two_factor: bool,
    #[serde(default)]
    pub otp_id: Option<String>,
}

impl AuthResponse {
    pub(super) fn into_login(self) -> Result<Login> {
        if self.is_two_factor {
            let otp_id = self
                .otp_id
                .ok_or_else(|| Error::Protocol("two-factor login without otp_id".into()))?;
            return Ok(Login::TwoFactor { otp_id });
        }
        self.dev_token
            .filter(|t| !t.is_empty())
            .map(Login::Token)
            .ok_or_else(|| Error::Protocol("login response carried no token".into()))
    }
}

/// Where credentials come from when a token must be obtained or renewed.
pub trait CredentialSource {
    fn email(&mut self) -> Result<String>;

    fn password(&mut self) -> Result<String>;

    fn two_factor_code(&mut self) -> Result<String>;
}

/// Fixed credentials, for flags and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub email: String,
    pub password: String,
}

impl CredentialSource for StaticCredentials {
    fn email(&mut self) -> Result<String> {
        Ok(self.email.clone())
    }

    fn password(&mut self) -> Result<String> {
        Ok(self.password.clone())
    }

    fn two_factor_code(&mut self) -> Result<String> {
        Err(Error::AuthFailure("two-factor code required".into()))
    }
}

/// Logs in with credentials from `source`, completing two-factor
/// verification when the platform asks for it, and installs the token.
pub fn login<R: Remote + ?Sized>(remote: &mut R, source: &mut dyn CredentialSource) -> Result<String> {
    let email = source.email()?;
    let password = source.password()?;
    let token = match remote.authenticate(&email, &password)? {
        Login::Token(token) => token,
        Login::TwoFactor { otp_id } => {
            let code = source.two_factor_code()?;
            remote.verify_two_factor(&email, &otp_id, &code)?
        }
    };
    remote.set_token(&token);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_token() {
        let resp: AuthResponse = serde_json::from_value(json!({"dev_token": "t1"})).unwrap();
        assert_eq!(resp.into_login().unwrap(), Login::Token("t1".into()));
    }

    #[test]
    fn test_auth_response_two_factor() {
        let resp: AuthResponse =
            serde_json::from_value(json!({"is_two_factor": true, "otp_id": "o1"})).unwrap();
        assert_eq!(
            resp.into_login().unwrap(),
            Login::TwoFactor { otp_id: "o1".into() }
        );
    }

    #[test]
    fn test_auth_response_without_token_is_protocol_error() {
        let resp: AuthResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(resp.into_login(), Err(Error::Protocol(_))));
    }
}
