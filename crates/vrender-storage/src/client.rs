//! Blob store client (C1) against an S3-compatible object store.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use md5::{Digest, Md5};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// `signed_url` TTL for URLs handed to internal services (§4.1).
pub const INTERNAL_URL_TTL: Duration = Duration::from_secs(60 * 60);
/// `signed_url` TTL for URLs handed to end users viewing a draft (§4.1).
pub const DRAFT_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Above this size, `copy` streams the object through the caller instead of
/// issuing a single server-side `CopyObject` (which some S3-compatible backends
/// reject or silently truncate for very large multipart sources).
const SERVER_SIDE_COPY_LIMIT_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub region: String,
    pub public_base_url: Option<String>,
}

impl BlobStoreConfig {
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BLOB_ENDPOINT_URL")
                .map_err(|_| StorageError::config("BLOB_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("BLOB_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config("BLOB_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BLOB_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config("BLOB_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("BLOB_BUCKET_NAME")
                .map_err(|_| StorageError::config("BLOB_BUCKET_NAME not set"))?,
            region: std::env::var("BLOB_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("BLOB_PUBLIC_BASE_URL").ok(),
        })
    }
}

/// Artifact Store Adapter client. Single logical bucket backs scratch work, the
/// content-addressable cache (C4) and published outputs alike (§9 Open
/// Questions: bucket partitioning, if any, is a deployment concern).
#[derive(Clone)]
pub struct BlobStore {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl BlobStore {
    pub async fn new(config: BlobStoreConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vrender-storage",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    pub async fn from_env() -> StorageResult<Self> {
        Self::new(BlobStoreConfig::from_env()?).await
    }

    /// Check whether `key` exists (used by C4 cache probing and C5 per-scene
    /// cache checks).
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let text = e.to_string();
                if text.contains("NotFound") || text.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::from_aws("head_object", text))
                }
            }
        }
    }

    /// MD5 content digest of a stored object, used to detect whether a cached
    /// artifact still matches the bytes a manifest hash was computed against.
    /// Fails with `NotFound` if the key is absent.
    ///
    /// Prefers the object's `ETag`, which for a non-multipart upload is the
    /// content MD5 S3 computed at write time, over downloading the whole
    /// object just to hash it again. A multipart upload's ETag contains a
    /// `-` and isn't a plain MD5, so that case falls back to downloading.
    pub async fn digest(&self, key: &str) -> StorageResult<String> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("digest:head", e))?;

        if let Some(etag) = head.e_tag() {
            let etag = etag.trim_matches('"');
            if !etag.is_empty() && !etag.contains('-') {
                return Ok(etag.to_lowercase());
            }
        }

        let bytes = self.download_bytes(key).await?;
        let mut hasher = Md5::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!(key, path = %path.display(), "uploading file");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::from_aws("upload_file:read", e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("put_object", e))?;

        info!(key, "uploaded");
        Ok(())
    }

    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!(key, bytes = data.len(), "uploading bytes");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("put_object", e))?;

        Ok(())
    }

    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!(key, "downloading");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("get_object", e))?;

        response
            .body
            .collect()
            .await
            .map(|data| data.into_bytes().to_vec())
            .map_err(|e| StorageError::from_aws("get_object:body", e))
    }

    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;

        info!(key, path = %path.display(), "downloaded");
        Ok(())
    }

    fn object_size(&self, resp: &aws_sdk_s3::operation::head_object::HeadObjectOutput) -> u64 {
        resp.content_length().unwrap_or(0).max(0) as u64
    }

    /// Atomic-from-the-caller's-perspective copy of `src` to `dst`, used when
    /// promoting a cached artifact into a fresh job's output path (§4.1, §4.4).
    /// Objects above [`SERVER_SIDE_COPY_LIMIT_BYTES`] are streamed through this
    /// process instead of relying on a single server-side `CopyObject`, since
    /// some S3-compatible backends cap that operation's source size.
    pub async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(src)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("copy:head", e))?;

        let size = self.object_size(&head);
        if size > SERVER_SIDE_COPY_LIMIT_BYTES {
            warn!(src, dst, size, "copy exceeds server-side limit, streaming instead");
            let bytes = self.download_bytes(src).await?;
            let content_type = head
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            return self.upload_bytes(bytes, dst, &content_type).await;
        }

        let source = format!("{}/{}", self.bucket, urlencoding::encode(src));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(dst)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("copy_object", e))?;

        info!(src, dst, "copied");
        Ok(())
    }

    /// Presigned GET URL. `ttl` is typically [`INTERNAL_URL_TTL`] or
    /// [`DRAFT_URL_TTL`] (§4.1).
    pub async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Fatal(format!("presign config: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::from_aws("presign_get", e))?;

        Ok(presigned.uri().to_string())
    }

    /// Idempotently promote a key to public visibility and return its durable
    /// public URL. Re-publishing an already-public key is a no-op (P-safe per
    /// §4.1: publish is called once per job on the terminal path, but redrive
    /// after a crash mid-publish must not error).
    pub async fn publish(&self, key: &str) -> StorageResult<String> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("put_object_acl", e))?;

        let url = match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.r2.dev/{}", self.bucket, key),
        };
        info!(key, url, "published");
        Ok(url)
    }

    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("delete_object", e))?;
        Ok(())
    }

    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::from_aws("head_bucket", e))?;
        Ok(())
    }
}
