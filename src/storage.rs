//! Credential persistence backends.
//!
//! User API tokens live in one JSON object keyed by LINE user id,
//! stored either in a local file or in a Cloudflare R2 bucket. Saves
//! merge the given entries into the stored object rather than
//! replacing it.

use crate::config::Settings;
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Object key for the credential map in the R2 bucket.
const CREDENTIALS_KEY: &str = "credentials.json";

/// Stored credential entries keyed by user id.
pub type CredentialMap = HashMap<String, String>;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// R2 download failed.
    #[error("S3 get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// R2 upload failed.
    #[error("S3 put error: {0}")]
    S3Put(Box<SdkError<PutObjectError>>),
    /// Stored payload was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Local file access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Backend settings are incomplete.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Persistence for user API tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads all stored entries. A store that does not exist yet reads
    /// as empty.
    async fn load(&self) -> Result<CredentialMap, StorageError>;

    /// Merges the given entries into the stored map.
    async fn save(&self, entries: &CredentialMap) -> Result<(), StorageError>;
}

/// Credential file on local disk.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a store backed by the given JSON file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileStorage {
    async fn load(&self) -> Result<CredentialMap, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CredentialMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn save(&self, entries: &CredentialMap) -> Result<(), StorageError> {
        let mut stored = self.load().await?;
        stored.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        let json = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Credential object in a Cloudflare R2 bucket.
pub struct R2Storage {
    client: S3Client,
    bucket: String,
}

impl R2Storage {
    /// Builds an R2 client from settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` when any R2 setting is missing.
    pub fn new(settings: &Settings) -> Result<Self, StorageError> {
        let access_key = settings
            .r2_access_key_id
            .clone()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_key = settings
            .r2_secret_access_key
            .clone()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is not set".to_string()))?;
        let endpoint = settings
            .r2_endpoint_url
            .clone()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is not set".to_string()))?;
        let bucket = settings
            .r2_bucket_name
            .clone()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is not set".to_string()))?;

        let credentials =
            aws_credential_types::Credentials::new(access_key, secret_key, None, None, "r2-static");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_types::region::Region::new("auto"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: S3Client::from_conf(config),
            bucket,
        })
    }
}

#[async_trait]
impl CredentialStore for R2Storage {
    async fn load(&self) -> Result<CredentialMap, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(CREDENTIALS_KEY)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
                Ok(serde_json::from_slice(&bytes.into_bytes())?)
            }
            // A bucket without the object yet reads as an empty map.
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => {
                Ok(CredentialMap::new())
            }
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }

    async fn save(&self, entries: &CredentialMap) -> Result<(), StorageError> {
        let mut stored = self.load().await?;
        stored.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        let json = serde_json::to_string(&stored)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(CREDENTIALS_KEY)
            .content_type("application/json")
            .body(ByteStream::from(json.into_bytes()))
            .send()
            .await
            .map_err(|e| StorageError::S3Put(Box::new(e)))?;
        Ok(())
    }
}

/// Selects the storage backend from settings.
///
/// # Errors
///
/// Returns `StorageError::Config` when the R2 backend is selected but
/// incompletely configured.
pub fn build_storage(settings: &Settings) -> Result<Arc<dyn CredentialStore>, StorageError> {
    if settings.use_r2() {
        Ok(Arc::new(R2Storage::new(settings)?))
    } else {
        Ok(Arc::new(FileStorage::new(settings.storage_path())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file() -> PathBuf {
        std::env::temp_dir().join(format!("linegpt-store-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_file_load_missing_is_empty() {
        let store = FileStorage::new(temp_file());
        let loaded = store.load().await.expect("Load should succeed");
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_file_save_merges_entries() {
        let path = temp_file();
        let store = FileStorage::new(path.clone());

        let mut first = CredentialMap::new();
        first.insert("user_a".to_string(), "sk-a".to_string());
        store.save(&first).await.expect("Save should succeed");

        let mut second = CredentialMap::new();
        second.insert("user_b".to_string(), "sk-b".to_string());
        store.save(&second).await.expect("Save should succeed");

        let loaded = store.load().await.expect("Load should succeed");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("user_a").map(String::as_str), Some("sk-a"));
        assert_eq!(loaded.get("user_b").map(String::as_str), Some("sk-b"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_save_replaces_same_user() {
        let path = temp_file();
        let store = FileStorage::new(path.clone());

        let mut entry = CredentialMap::new();
        entry.insert("user_a".to_string(), "sk-old".to_string());
        store.save(&entry).await.expect("Save should succeed");

        entry.insert("user_a".to_string(), "sk-new".to_string());
        store.save(&entry).await.expect("Save should succeed");

        let loaded = store.load().await.expect("Load should succeed");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("user_a").map(String::as_str), Some("sk-new"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_r2_requires_full_config() {
        let settings = Settings::for_tests();
        let result = R2Storage::new(&settings);
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
