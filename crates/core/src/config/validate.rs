use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration.
///
/// Serde already enforces the presence of `[auth]` and `[distribution]`;
/// this checks the values the signing pipeline cannot run without.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::RemoteSession
        && config
            .auth
            .session_url
            .as_deref()
            .map_or(true, str::is_empty)
    {
        return Err(invalid(
            "auth.session_url must be set when using remote_session auth",
        ));
    }

    if config.distribution.uploader_url.is_empty() {
        return Err(invalid("distribution.uploader_url cannot be empty"));
    }
    if config.distribution.notifications_url.is_empty() {
        return Err(invalid("distribution.notifications_url cannot be empty"));
    }
    let has_static_token = config
        .distribution
        .service_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    if !has_static_token && config.distribution.signing_key.is_none() {
        return Err(invalid(
            "distribution.service_token or distribution.signing_key must be set",
        ));
    }
    if config.distribution.signing_key.is_some() && config.distribution.token_ttl_secs == 0 {
        return Err(invalid("distribution.token_ttl_secs must be at least 1"));
    }

    if config.auth.method == AuthMethod::Jwt && config.auth.issuers.is_empty() {
        return Err(invalid("auth.issuers must list at least one issuer for jwt auth"));
    }

    if config.targeting.densities.is_empty() {
        return Err(invalid("targeting.densities cannot be empty"));
    }
    if config.targeting.languages.is_empty() {
        return Err(invalid("targeting.languages cannot be empty"));
    }

    if config.dispatcher.workers == 0 {
        return Err(invalid("dispatcher.workers must be at least 1"));
    }
    if config.dispatcher.queue_capacity == 0 {
        return Err(invalid("dispatcher.queue_capacity must be at least 1"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
