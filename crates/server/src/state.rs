use std::sync::Arc;

use playsigner_core::{Authenticator, Config, JobQueue, ServiceToken};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    queue: JobQueue,
    service_token: ServiceToken,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        queue: JobQueue,
        service_token: ServiceToken,
    ) -> Self {
        Self {
            config,
            authenticator,
            queue,
            service_token,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Token attached to the job's distribution calls.
    pub fn service_token(&self) -> &ServiceToken {
        &self.service_token
    }
}
