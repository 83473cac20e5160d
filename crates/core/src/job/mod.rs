//! The signing job: publish one bundle, then fan out the signed APKs.
//!
//! ```text
//! START → EDIT_OPENED → BUNDLE_UPLOADED → COMMITTED → ARTIFACTS_LISTED
//!       → SPLITS_FILTERED → SPLITS_UPLOADED → UNIVERSAL_UPLOADED → DONE
//! ```
//!
//! Any fatal error moves the job to `FAILED` and sends exactly one failure
//! notification. A commit answered with 400 and per-split delivery problems
//! are not fatal.

mod bundle;
mod pipeline;
mod types;

pub use bundle::{BundleError, BundleFile};
pub use pipeline::SigningPipeline;
pub use types::{ArtifactError, JobError, JobReport, JobState, SigningJob};
