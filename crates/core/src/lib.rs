pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod distribution;
pub mod job;
pub mod metrics;
pub mod publisher;
pub mod targeting;
pub mod testing;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, JwtAuthenticator,
    NoneAuthenticator, RemoteSessionAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use dispatcher::{
    create_dispatcher, DispatchError, DispatcherStatus, JobExecutor, JobQueue, JobTicket,
    WorkerPool,
};
pub use distribution::{
    Artifact, DistributionClient, DistributionError, Distributor, FailureNotice, ServiceToken,
    TokenError, UploadOutcome,
};
pub use job::{BundleError, BundleFile, JobReport, JobState, SigningJob, SigningPipeline};
pub use publisher::{
    CommitOutcome, GooglePlayConnector, PublishError, PublishOperation, Publisher,
    PublisherConnector,
};
pub use targeting::{GeneratedArtifactSet, TargetingSelection};
