//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the two remote services so the signing job, the
//! dispatcher and the HTTP surface can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use playsigner_core::testing::{fixtures, MockDistributor, MockPublisher};
//!
//! let publisher = MockPublisher::new();
//! let distributor = MockDistributor::new();
//!
//! publisher
//!     .set_manifest(fixtures::manifest(
//!         &[fixtures::density_split("config.xhdpi", "XHDPI")],
//!         "dl-universal",
//!     ))
//!     .await;
//! ```

mod mock_distributor;
mod mock_publisher;

pub use mock_distributor::{MockDistributor, RecordedNotification, RecordedUpload};
pub use mock_publisher::{MockPublisher, PublisherCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::job::{BundleFile, SigningJob};
    use crate::targeting::{GeneratedArtifactSet, SplitArtifact, UniversalArtifact};

    pub const APP_ID: &str = "com.example.app";
    pub const VERSION_CODE: u32 = 42;
    pub const DESTINATION_ID: &str = "acc-1";
    pub const DISTRIBUTION_TOKEN: &str = "svc-token";

    /// RSA key pair for signing and verifying test tokens (PKCS#8 / SPKI PEM).
    pub const TEST_RSA_PRIVATE_KEY: &str = include_str!("../../testdata/rsa_private.pem");
    pub const TEST_RSA_PUBLIC_KEY: &str = include_str!("../../testdata/rsa_public.pem");
    /// Public half of an unrelated key; tokens from the test key never verify with it.
    pub const OTHER_RSA_PUBLIC_KEY: &str = include_str!("../../testdata/other_public.pem");

    /// RS512-sign `claims` with [`TEST_RSA_PRIVATE_KEY`].
    pub fn signed_jwt(claims: Value) -> String {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY.as_bytes())
            .expect("test key parses");
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS512),
            &claims,
            &key,
        )
        .expect("test token signs")
    }

    /// A service account key file as issued by the store's cloud console.
    pub fn service_account(token_uri: &str) -> Value {
        json!({
            "type": "service_account",
            "project_id": "play-signer-test",
            "private_key_id": "key-1",
            "private_key": TEST_RSA_PRIVATE_KEY,
            "client_email": "signer@play-signer-test.iam.gserviceaccount.com",
            "token_uri": token_uri
        })
    }

    /// One split entry of a generated manifest.
    #[derive(Debug, Clone)]
    pub struct SplitFixture {
        pub split_id: String,
        pub density: Option<String>,
        pub language: Option<String>,
    }

    /// A split targeted at one screen density.
    pub fn density_split(split_id: &str, density_alias: &str) -> SplitFixture {
        SplitFixture {
            split_id: split_id.to_string(),
            density: Some(density_alias.to_string()),
            language: None,
        }
    }

    /// A split targeted at one language.
    pub fn language_split(split_id: &str, language: &str) -> SplitFixture {
        SplitFixture {
            split_id: split_id.to_string(),
            density: None,
            language: Some(language.to_string()),
        }
    }

    /// A manifest shaped like the store's, with one variant and one APK set.
    ///
    /// Each split gets download id `dl-<split_id>`.
    pub fn manifest(splits: &[SplitFixture], universal_download_id: &str) -> GeneratedArtifactSet {
        let descriptions: Vec<Value> = splits.iter().map(description).collect();

        GeneratedArtifactSet {
            split_artifacts: splits
                .iter()
                .map(|split| SplitArtifact {
                    download_id: format!("dl-{}", split.split_id),
                    split_id: Some(split.split_id.clone()),
                })
                .collect(),
            universal_artifact: Some(UniversalArtifact {
                download_id: universal_download_id.to_string(),
            }),
            targeting_info: json!({
                "packageName": APP_ID,
                "variant": [{
                    "variantNumber": 0,
                    "apkSet": [{
                        "moduleMetadata": {"name": "base"},
                        "apkDescription": descriptions
                    }]
                }]
            }),
        }
    }

    fn description(split: &SplitFixture) -> Value {
        let mut targeting = json!({});
        if let Some(density) = &split.density {
            targeting["screenDensityTargeting"] = json!({"value": [{"densityAlias": density}]});
        }
        if let Some(language) = &split.language {
            targeting["languageTargeting"] = json!({"value": [language]});
        }

        json!({
            "path": format!("splits/base-{}.apk", split.split_id),
            "splitApkMetadata": {"splitId": split.split_id, "isMasterSplit": false},
            "targeting": targeting
        })
    }

    /// A job for the default app/version with a staged bundle in `dir`.
    pub async fn signing_job(dir: &Path) -> SigningJob {
        let bundle = BundleFile::stage(dir, b"PK\x03\x04 fake bundle")
            .await
            .expect("stage bundle");

        SigningJob {
            job_id: Uuid::new_v4(),
            bundle,
            app_id: APP_ID.to_string(),
            version_code: VERSION_CODE,
            destination_id: DESTINATION_ID.to_string(),
            credentials: json!({"access_token": "ya29.test"}),
            distribution_token: DISTRIBUTION_TOKEN.to_string(),
        }
    }
}
