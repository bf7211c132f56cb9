use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use percent_encoding::utf8_percent_encode;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{ObjectStore, ObjectStoreError, ProgressSink, StoredObject, COMPONENT, PATH};

/// Refresh the access token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Google Cloud Storage object store backend.
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: tokio::sync::RwLock<CachedToken>,
    credentials_file: Option<String>,
    chunk_size: usize,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListItem {
    name: String,
}

impl GcsStore {
    pub async fn new(
        bucket: &str,
        credentials_file: Option<&str>,
        chunk_size: usize,
    ) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: tokio::sync::RwLock::new(CachedToken {
                token: String::new(),
                expires_at: Instant::now(),
            }),
            credentials_file: credentials_file.map(|s| s.to_string()),
            chunk_size: chunk_size.max(1),
        };

        store.refresh_token().await?;
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<String, anyhow::Error> {
        let resp = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        let mut lock = self.access_token.write().await;
        *lock = CachedToken {
            token: resp.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(resp.expires_in),
        };
        Ok(resp.access_token)
    }

    /// Current access token, refreshed when it is about to expire.
    async fn token(&self) -> Result<String, ObjectStoreError> {
        {
            let cached = self.access_token.read().await;
            if cached.expires_at > Instant::now() + TOKEN_SLACK {
                return Ok(cached.token.clone());
            }
        }
        self.refresh_token()
            .await
            .map_err(|e| ObjectStoreError::backend("auth", e.to_string()))
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            utf8_percent_encode(path, COMPONENT)
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}",
            self.bucket,
            utf8_percent_encode(path, COMPONENT)
        )
    }

    fn list_url(&self) -> String {
        format!("https://storage.googleapis.com/storage/v1/b/{}/o", self.bucket)
    }
}

/// Turn a non-success response into a store error, keeping the status code.
async fn failure(resp: Response, action: &str) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ObjectStoreError::PermissionDenied(format!("GCS {action} rejected ({status}): {body}"))
        }
        _ => ObjectStoreError::backend(
            status.as_str(),
            format!("GCS {action} failed ({status}): {body}"),
        ),
    }
}

fn transport(e: reqwest::Error) -> ObjectStoreError {
    ObjectStoreError::backend("transport", e.to_string())
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: ProgressSink,
    ) -> Result<StoredObject, ObjectStoreError> {
        let token = self.token().await?;
        let total = data.len() as u64;

        // Report each chunk as it is handed to the transport
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| data.slice(start..(start + self.chunk_size).min(data.len())))
            .collect();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let resp = self
            .client
            .post(self.upload_url(path))
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(failure(resp, "upload").await);
        }

        tracing::debug!(bucket = %self.bucket, path = %path, bytes = total, "Stored object in GCS");
        Ok(StoredObject {
            path: path.to_string(),
            byte_size: total,
        })
    }

    async fn public_url(&self, object: &StoredObject) -> Result<String, ObjectStoreError> {
        if !self.exists(&object.path).await? {
            return Err(ObjectStoreError::NotFound(object.path.clone()));
        }
        Ok(format!(
            "https://storage.googleapis.com/{}/{}",
            self.bucket,
            utf8_percent_encode(&object.path, PATH)
        ))
    }

    async fn get(&self, path: &str) -> Result<Bytes, ObjectStoreError> {
        let token = self.token().await?;

        let resp = self
            .client
            .get(format!("{}?alt=media", self.object_url(path)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(path.to_string()));
        }
        if !resp.status().is_success() {
            return Err(failure(resp, "download").await);
        }

        resp.bytes().await.map_err(transport)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        let token = self.token().await?;

        let resp = self
            .client
            .delete(self.object_url(path))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(failure(resp, "delete").await);
        }

        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ObjectStoreError> {
        let token = self.token().await?;

        let resp = self
            .client
            .get(self.object_url(path))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(failure(resp, "metadata lookup").await),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let token = self.token().await?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("prefix", prefix.to_string()),
                ("fields", "items(name),nextPageToken".to_string()),
            ];
            if let Some(ref t) = page_token {
                query.push(("pageToken", t.clone()));
            }

            let resp = self
                .client
                .get(self.list_url())
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(failure(resp, "list").await);
            }

            let page: ListResponse = resp.json().await.map_err(transport)?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        names.sort();
        Ok(names)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM armor and decode the base64 body to DER
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths_are_encoded() {
        assert_eq!(
            utf8_percent_encode("gallery/1-a b.jpg", COMPONENT).to_string(),
            "gallery%2F1-a%20b.jpg"
        );
        assert_eq!(
            utf8_percent_encode("gallery/1-a b.jpg", PATH).to_string(),
            "gallery/1-a%20b.jpg"
        );
    }
}
