//! Object Store client over the S3 API, used against MinIO in deployment.
//! No crate in the teacher's dependency table speaks S3; `aws-sdk-s3` and
//! `aws-config` are borrowed from the golemcloud-golem example repo, which
//! uses the same pinned versions against the same kind of S3-compatible
//! backend.

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::error::{TaskforgeError, TaskforgeResult};

pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    pub async fn connect(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> TaskforgeResult<Self> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "taskforge-static");
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(true)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
        })
    }

    /// Reachability probe for `/health`: a HEAD on the configured bucket.
    pub async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }

    pub async fn upload_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> TaskforgeResult<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| TaskforgeError::ObjectStoreUnavailable(e.to_string()))?;
        Ok(self.object_url(key))
    }

    pub async fn get_bytes(&self, key: &str) -> TaskforgeResult<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    TaskforgeError::ObjectNotFound {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                    }
                } else {
                    TaskforgeError::ObjectStoreUnavailable(e.to_string())
                }
            })?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| TaskforgeError::ObjectStoreUnavailable(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    pub async fn delete_object(&self, key: &str) -> TaskforgeResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| TaskforgeError::ObjectStoreUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Builds the `s3://bucket/key` form stored in task payloads after
    /// normalization, matching `original_source`'s media URL convention.
    pub fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    /// Parses an `s3://bucket/key` URL produced by [`Self::object_url`] back
    /// into its `(bucket, key)` parts.
    pub fn parse_url(url: &str) -> Option<(&str, &str)> {
        let rest = url.strip_prefix("s3://")?;
        rest.split_once('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_s3_url() {
        let parsed = ObjectStore::parse_url("s3://media/tasks/abc/input.png");
        assert_eq!(parsed, Some(("media", "tasks/abc/input.png")));
    }

    #[test]
    fn rejects_non_s3_url() {
        assert_eq!(ObjectStore::parse_url("https://example.com/x"), None);
    }
}
