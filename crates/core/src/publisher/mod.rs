//! Client for the store publishing API.
//!
//! A signing job talks to the store through one [`Publisher`] session,
//! created per job by a [`PublisherConnector`] from the caller's credentials.
//! The session drives the edit transaction (open, upload bundle, assign
//! track, commit) and then reads back the store-signed artifacts.

mod error;
mod google_play;
mod service_account;
mod traits;

pub use error::{PublishError, PublishOperation};
pub use google_play::{GooglePlayConnector, GooglePlayPublisher};
pub use traits::{CommitOutcome, Publisher, PublisherConnector};
