mod jwt;
mod none;
mod session;
mod traits;
mod types;

pub use jwt::*;
pub use none::*;
pub use session::*;
pub use traits::*;
pub use types::*;

use crate::config::AuthConfig;

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::RemoteSession => {
            let session_url = config.session_url.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "session_url must be set when using RemoteSession auth method".to_string(),
                )
            })?;
            let session = RemoteSessionAuthenticator::new(session_url, config.timeout_secs)?;
            if config.issuers.is_empty() {
                Ok(Box::new(session))
            } else {
                Ok(Box::new(
                    session.with_jwt_fallback(JwtAuthenticator::new(&config.issuers)?),
                ))
            }
        }
        AuthMethod::Jwt => Ok(Box::new(JwtAuthenticator::new(&config.issuers)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMethod;
    use crate::testing::fixtures::TEST_RSA_PUBLIC_KEY;
    use std::collections::HashMap;

    fn issuers() -> HashMap<String, String> {
        HashMap::from([("catappult.io".to_string(), TEST_RSA_PUBLIC_KEY.to_string())])
    }

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            session_url: None,
            timeout_secs: 10,
            issuers: HashMap::new(),
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_remote_session() {
        let config = AuthConfig {
            method: AuthMethod::RemoteSession,
            session_url: Some("https://ws.example.com/api/session/".to_string()),
            timeout_secs: 10,
            issuers: HashMap::new(),
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "remote_session");
    }

    #[test]
    fn test_create_authenticator_remote_session_missing_url() {
        let config = AuthConfig {
            method: AuthMethod::RemoteSession,
            session_url: None,
            timeout_secs: 10,
            issuers: HashMap::new(),
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }

    #[test]
    fn test_create_authenticator_remote_session_with_issuers() {
        let config = AuthConfig {
            method: AuthMethod::RemoteSession,
            session_url: Some("https://ws.example.com/api/session/".to_string()),
            timeout_secs: 10,
            issuers: issuers(),
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "remote_session");
    }

    #[test]
    fn test_create_authenticator_jwt() {
        let config = AuthConfig {
            method: AuthMethod::Jwt,
            session_url: None,
            timeout_secs: 10,
            issuers: issuers(),
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "jwt");
    }

    #[test]
    fn test_create_authenticator_jwt_without_issuers() {
        let config = AuthConfig {
            method: AuthMethod::Jwt,
            session_url: None,
            timeout_secs: 10,
            issuers: HashMap::new(),
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}
