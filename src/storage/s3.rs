//! AWS S3 record store.
//!
//! One object per source at `{prefix}/tables/{source}.json`. Objects are
//! replaced whole on every write; S3 gives no partial update, which matches
//! the row-store contract.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::RecordStore;

/// S3-based record store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 store from environment configuration.
    ///
    /// Reads `S3_BUCKET` and `S3_PREFIX`.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let bucket = std::env::var("S3_BUCKET")
            .map_err(|_| AppError::config("S3_BUCKET is not set"))?;
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| "relay".to_string());

        Ok(Self::new(client, bucket, prefix))
    }

    pub fn prefix(&self) -> &str {
        self.prefix.trim_matches('/')
    }

    fn table_key(&self, source: &str) -> String {
        format!("{}/tables/{}.json", self.prefix(), source)
    }

    /// Read an object, returning `None` if the key does not exist.
    pub async fn read_bytes_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    /// Replace an object.
    async fn write_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for S3Store {
    async fn load_row(&self, source: &str) -> Result<Option<String>> {
        let key = self.table_key(source);
        Ok(self
            .read_bytes_optional(&key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn save_row(&self, source: &str, blob: &str) -> Result<()> {
        let key = self.table_key(source);
        self.write_bytes(&key, blob.as_bytes().to_vec()).await?;
        log::debug!("Saved table for {} to s3://{}/{}", source, self.bucket, key);
        Ok(())
    }
}
