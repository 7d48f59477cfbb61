//! HTTP blob API backend, authenticated by bearer token.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{ObjectStream, PutOptions, PutReceipt, RemoteStore, StoreError};
use crate::address::PublicAddress;
use crate::config::AccessToken;
use crate::error::AdapterError;
use crate::key::StorageKey;

/// API version sent with every request.
const API_VERSION: &str = "7";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutBlobResponse {
    url: Url,
    pathname: String,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteBlobRequest {
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Client for the blob HTTP API.
///
/// Writes and deletes go to `api_url` with the token; reads go straight to the
/// public object URL.
///
/// A request timeout bounds whole API calls. Reads only get it as a connect
/// and idle-read limit, so a slow but live download is never cut short.
#[derive(Debug, Clone)]
pub struct BlobApiStore {
    client: Client,
    api_url: Url,
    token: AccessToken,
    address: PublicAddress,
    timeout: Option<Duration>,
}

impl BlobApiStore {
    pub fn new(
        api_url: Url,
        token: AccessToken,
        request_timeout_secs: Option<u64>,
        address: PublicAddress,
    ) -> Result<Self, AdapterError> {
        if api_url.cannot_be_a_base() {
            return Err(AdapterError::Configuration(format!(
                "blob API URL '{}' cannot carry a path",
                api_url
            )));
        }

        let timeout = request_timeout_secs.map(Duration::from_secs);
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AdapterError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            api_url,
            token,
            address,
            timeout,
        })
    }

    /// An authenticated API request, bounded by the request timeout.
    fn api_request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .bearer_auth(self.token.expose())
            .header("x-api-version", API_VERSION);
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// `api_url` with `segments` appended.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Turn a non-success response into a [`StoreError`].
async fn error_from_response(key: &StorageKey, response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => match parsed.error.code {
            Some(code) => format!("{}: {}", code, parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
        StatusCode::NOT_FOUND => StoreError::NotFound(key.to_string()),
        StatusCode::CONFLICT => StoreError::AlreadyExists(key.to_string()),
        status => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RemoteStore for BlobApiStore {
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        opts: &PutOptions,
    ) -> Result<PutReceipt, StoreError> {
        let size = body.len();
        let mut request = self
            .api_request(Method::PUT, self.endpoint(key.segments()))
            .header("x-access", "public")
            .header("x-content-type", &opts.content_type)
            .header("x-add-random-suffix", "0")
            .header(
                "x-allow-overwrite",
                if opts.allow_overwrite { "1" } else { "0" },
            );
        if let Some(max_age) = opts.cache_control_max_age {
            request = request.header("x-cache-control-max-age", max_age.to_string());
        }

        let response = request.body(body).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(key, response).await);
        }

        let put: PutBlobResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if put.pathname != key.as_str() {
            warn!(key = %key, pathname = %put.pathname, "store reported a different pathname");
        }
        debug!(key = %key, size = size, url = %put.url, "blob written");

        Ok(PutReceipt {
            url: put.url,
            content_type: put.content_type,
        })
    }

    async fn delete_object(&self, key: &StorageKey) -> Result<(), StoreError> {
        let request = DeleteBlobRequest {
            urls: vec![self.address.url_for(key).to_string()],
        };
        let response = self
            .api_request(Method::POST, self.endpoint(["delete"]))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(key, response).await);
        }
        Ok(())
    }

    async fn fetch_object_stream(&self, key: &StorageKey) -> Result<ObjectStream, StoreError> {
        let response = self.client.get(self.address.url_for(key)).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(key, response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let size = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(StoreError::Transport)
            .boxed();

        Ok(ObjectStream {
            content_type,
            size,
            body,
        })
    }

    async fn check_ready(&self) -> Result<(), StoreError> {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().append_pair("limit", "1");
        let response = self.api_request(Method::GET, url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized(
                "blob API rejected the token".into(),
            )),
            status => Err(StoreError::Rejected {
                status: status.as_u16(),
                message: "readiness probe failed".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> BlobApiStore {
        let base = Url::parse(&server.uri()).unwrap();
        let address = PublicAddress::new(base.join("/public/").unwrap()).unwrap();
        BlobApiStore::new(base, AccessToken::new("rw_token"), Some(5), address).unwrap()
    }

    fn opts() -> PutOptions {
        PutOptions {
            content_type: "image/png".into(),
            cache_control_max_age: None,
            allow_overwrite: true,
        }
    }

    #[tokio::test]
    async fn test_put_uses_reported_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/media/a.png"))
            .and(header("authorization", "Bearer rw_token"))
            .and(header("x-content-type", "image/png"))
            .and(header("x-add-random-suffix", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/public/media/a.png", server.uri()),
                "pathname": "media/a.png",
                "contentType": "image/png",
                "contentDisposition": "inline; filename=\"a.png\""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "a.png").unwrap();
        let receipt = store
            .put_object(&key, Bytes::from_static(b"png"), &opts())
            .await
            .unwrap();

        assert_eq!(
            receipt.url.as_str(),
            format!("{}/public/media/a.png", server.uri())
        );
        assert_eq!(receipt.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_put_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "code": "forbidden", "message": "Access denied" }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "a.png").unwrap();
        let err = store
            .put_object(&key, Bytes::from_static(b"png"), &opts())
            .await
            .unwrap_err();

        match err {
            StoreError::Unauthorized(msg) => assert_eq!(msg, "forbidden: Access denied"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_too_large_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(413).set_body_string("payload too large"))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "a.png").unwrap();
        let err = store
            .put_object(&key, Bytes::from_static(b"png"), &opts())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Rejected { status: 413, .. }));
    }

    #[tokio::test]
    async fn test_delete_posts_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/delete"))
            .and(body_json(serde_json::json!({
                "urls": [format!("{}/public/media/a.png", server.uri())]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "a.png").unwrap();
        store.delete_object(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_streams_public_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public/media/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png bytes".to_vec()),
            )
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "a.png").unwrap();
        let object = store.fetch_object_stream(&key).await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some("image/png"));
        assert_eq!(object.size, Some(9));

        let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"png bytes");
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let key = StorageKey::new("media", "gone.png").unwrap();
        let err = store.fetch_object_stream(&key).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(k) if k == "media/gone.png"));
    }

    #[tokio::test]
    async fn test_check_ready_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = store.check_ready().await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }
}
