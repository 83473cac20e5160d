use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted multipart body (the bundle plus form fields).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory where inbound bundles are staged until uploaded.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("play-signer")
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Session endpoint that validates bearer tokens (required for `remote_session`).
    #[serde(default)]
    pub session_url: Option<String>,
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
    /// Trusted JWT issuers (`iss` claim) mapped to their PEM RSA public keys.
    /// Required for `jwt`; with `remote_session` they check tokens the session rejects.
    #[serde(default)]
    pub issuers: HashMap<String, String>,
}

fn default_auth_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    RemoteSession,
    Jwt,
}

/// Store publishing API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Base URL for the edits and generated APK endpoints.
    #[serde(default = "default_publisher_url")]
    pub base_url: String,
    /// Base URL for media uploads.
    #[serde(default = "default_publisher_url")]
    pub upload_base_url: String,
    /// Track the bundle is released to before commit. An empty string
    /// disables the assignment.
    #[serde(default = "default_track", deserialize_with = "empty_as_none")]
    pub track: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: default_publisher_url(),
            upload_base_url: default_publisher_url(),
            track: default_track(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

fn default_publisher_url() -> String {
    "https://androidpublisher.googleapis.com".to_string()
}

fn default_track() -> Option<String> {
    Some("internal".to_string())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn default_remote_timeout() -> u64 {
    120
}

/// Downstream distribution service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistributionConfig {
    /// Artifact upload endpoint; the destination account is appended as `accountUid`.
    pub uploader_url: String,
    /// Failure notification endpoint.
    pub notifications_url: String,
    /// Static bearer token presented to the distribution service.
    /// Ignored when `signing_key` is set.
    #[serde(default)]
    pub service_token: Option<String>,
    /// PEM RSA private key; when set, a fresh RS512 JWT is minted per job.
    #[serde(default)]
    pub signing_key: Option<String>,
    /// `iss` claim of minted tokens.
    #[serde(default = "default_token_issuer")]
    pub token_issuer: String,
    /// Lifetime of minted tokens.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_token_issuer() -> String {
    "apptech.aptoide.com".to_string()
}

fn default_token_ttl() -> u64 {
    7200
}

/// Split targeting selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetingConfig {
    #[serde(default = "default_densities")]
    pub densities: Vec<String>,
    /// ISO 639 language codes.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            densities: default_densities(),
            languages: default_languages(),
        }
    }
}

fn default_densities() -> Vec<String> {
    ["XXHDPI", "HDPI", "XXXHDPI", "MDPI", "XHDPI"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_languages() -> Vec<String> {
    ["pt", "ru", "en", "in", "es", "hi"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Jobs that may wait for a free worker before submissions are refused.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    32
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub publisher: PublisherConfig,
    pub distribution: SanitizedDistributionConfig,
    pub targeting: TargetingConfig,
    pub dispatcher: DispatcherConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
    pub trusted_issuers: Vec<String>,
}

/// Distribution config with the service token hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDistributionConfig {
    pub uploader_url: String,
    pub notifications_url: String,
    pub service_token_configured: bool,
    pub signing_key_configured: bool,
    pub token_issuer: String,
    pub token_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::RemoteSession => "remote_session".to_string(),
                    AuthMethod::Jwt => "jwt".to_string(),
                },
                session_url: config.auth.session_url.clone(),
                trusted_issuers: {
                    let mut issuers: Vec<String> = config.auth.issuers.keys().cloned().collect();
                    issuers.sort();
                    issuers
                },
            },
            server: config.server.clone(),
            publisher: config.publisher.clone(),
            distribution: SanitizedDistributionConfig {
                uploader_url: config.distribution.uploader_url.clone(),
                notifications_url: config.distribution.notifications_url.clone(),
                service_token_configured: config
                    .distribution
                    .service_token
                    .as_deref()
                    .is_some_and(|t| !t.is_empty()),
                signing_key_configured: config.distribution.signing_key.is_some(),
                token_issuer: config.distribution.token_issuer.clone(),
                token_ttl_secs: config.distribution.token_ttl_secs,
                timeout_secs: config.distribution.timeout_secs,
            },
            targeting: config.targeting.clone(),
            dispatcher: config.dispatcher.clone(),
        }
    }
}
