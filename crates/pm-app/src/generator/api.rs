//! REST client for the remote model-generation service.
//!
//! [`ModelApi`] is the seam the poller and [`crate::generator::Generator`]
//! talk to; [`HttpModelApi`] implements it with [`reqwest`]. Every call
//! reserves a slot from the shared [`ApiQuota`] before touching the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use pm_core::{ApiQuota, JobHandle, QuotaError, RemoteStatus};
use reqwest::Url;
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network, TLS, timeout or body decoding failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error("invalid response from model API: {0}")]
    InvalidResponse(String),

    #[error("no model API is configured")]
    NotConfigured,

    #[error("invalid model API url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// `.` and `..` cannot be sent as a path segment without being resolved away.
    #[error("job id {0:?} cannot be used in a request path")]
    UnaddressableJob(String),
}

#[async_trait]
pub trait ModelApi: Send + Sync {
    /// Ask the service to build a model from the image at `image_url`.
    async fn create_job(&self, image_url: &str) -> Result<JobHandle, ApiError>;

    async fn check_status(&self, job: &JobHandle) -> Result<RemoteStatus, ApiError>;

    /// Resolve a completed job to a fetchable asset URL.
    async fn download_url(&self, job: &JobHandle) -> Result<String, ApiError>;
}

#[derive(Debug, Serialize)]
struct CreateJobRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateJobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    url: String,
}

pub struct HttpModelApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    quota: Arc<ApiQuota>,
}

impl HttpModelApi {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        quota: Arc<ApiQuota>,
    ) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), base_url, api_key, quota)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        quota: Arc<ApiQuota>,
    ) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            quota,
        })
    }

    /// Append `segments` to the base path, each escaped as a single segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ApiError::UnaddressableJob(bad.to_string()));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn throttle(&self) -> Result<(), ApiError> {
        let wait = self.quota.reserve()?;
        debug!(
            "Model API usage {}/{} calls today",
            self.quota.calls_today(),
            self.quota.daily_limit()
        );
        if !wait.is_zero() {
            debug!("Throttling model API call for {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(REQUEST_TIMEOUT);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ModelApi for HttpModelApi {
    async fn create_job(&self, image_url: &str) -> Result<JobHandle, ApiError> {
        let url = self.endpoint(&["jobs"])?;
        self.throttle().await?;

        let response = self
            .authorize(self.client.post(url))
            .json(&CreateJobRequest { image_url })
            .send()
            .await?;

        let created: CreateJobResponse = Self::parse_response(response).await?;
        let job = JobHandle::new(created.id)
            .map_err(|_| ApiError::InvalidResponse("empty job id".to_string()))?;

        info!("Created model job {}", job);
        Ok(job)
    }

    async fn check_status(&self, job: &JobHandle) -> Result<RemoteStatus, ApiError> {
        let url = self.endpoint(&["jobs", job.as_str()])?;
        self.throttle().await?;

        let response = self.authorize(self.client.get(url)).send().await?;

        let status: RemoteStatus = Self::parse_response(response).await?;
        debug!("Model job {} is {:?}", job, status.state);
        Ok(status)
    }

    async fn download_url(&self, job: &JobHandle) -> Result<String, ApiError> {
        let url = self.endpoint(&["jobs", job.as_str(), "download"])?;
        self.throttle().await?;

        let response = self.authorize(self.client.get(url)).send().await?;

        let download: DownloadResponse = Self::parse_response(response).await?;
        if download.url.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty download url".to_string()));
        }
        Ok(download.url)
    }
}

/// Stand-in used when no service is configured; every call fails, which
/// the poller turns into fallback substitution.
#[derive(Debug, Default)]
pub struct OfflineApi;

#[async_trait]
impl ModelApi for OfflineApi {
    async fn create_job(&self, _image_url: &str) -> Result<JobHandle, ApiError> {
        Err(ApiError::NotConfigured)
    }

    async fn check_status(&self, _job: &JobHandle) -> Result<RemoteStatus, ApiError> {
        Err(ApiError::NotConfigured)
    }

    async fn download_url(&self, _job: &JobHandle) -> Result<String, ApiError> {
        Err(ApiError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::{get, post};
    use pm_core::RemoteState;

    type Hits = Arc<AtomicUsize>;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fake_service(hits: Hits) -> Router {
        async fn create(
            State(hits): State<Hits>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> Result<Json<serde_json::Value>, StatusCode> {
            hits.fetch_add(1, Ordering::SeqCst);
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
                return Err(StatusCode::UNAUTHORIZED);
            }
            assert_eq!(body["image_url"], "https://img.example/house.jpg");
            Ok(Json(serde_json::json!({ "id": "job-42" })))
        }

        async fn status(
            State(hits): State<Hits>,
            Path(id): Path<String>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(serde_json::json!({ "state": "processing", "progress": 40.0, "id": id }))
        }

        async fn download(
            State(hits): State<Hits>,
            Path(id): Path<String>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(serde_json::json!({ "url": format!("https://cdn.example/{id}.glb") }))
        }

        Router::new()
            .route("/jobs", post(create))
            .route("/jobs/{id}", get(status))
            .route("/jobs/{id}/download", get(download))
            .with_state(hits)
    }

    fn client(base_url: String, api_key: Option<&str>, quota: ApiQuota) -> HttpModelApi {
        HttpModelApi::new(&base_url, api_key.map(str::to_string), Arc::new(quota)).unwrap()
    }

    /// Records every request path and answers with a body both decoders accept.
    async fn spawn_recorder() -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let router = Router::new().fallback(move |uri: Uri| {
            let seen = recorded.clone();
            async move {
                seen.lock().unwrap().push(uri.to_string());
                Json(serde_json::json!({
                    "state": "processing",
                    "url": "https://cdn.example/model.glb",
                }))
            }
        });
        (spawn_server(router).await, seen)
    }

    #[tokio::test]
    async fn create_job_sends_bearer_token() {
        let hits = Hits::default();
        let base = spawn_server(fake_service(hits.clone())).await;
        let api = client(format!("{base}/"), Some("secret"), ApiQuota::unlimited());

        let job = api.create_job("https://img.example/house.jpg").await.unwrap();
        assert_eq!(job.as_str(), "job-42");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_key_surfaces_api_error() {
        let base = spawn_server(fake_service(Hits::default())).await;
        let api = client(base, None, ApiQuota::unlimited());

        let err = api.create_job("https://img.example/house.jpg").await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn status_and_download_decode() {
        let base = spawn_server(fake_service(Hits::default())).await;
        let api = client(base, Some("secret"), ApiQuota::unlimited());
        let job = JobHandle::new("job-7").unwrap();

        let status = api.check_status(&job).await.unwrap();
        assert_eq!(status.state, RemoteState::Processing);
        assert_eq!(status.progress, Some(40.0));

        let url = api.download_url(&job).await.unwrap();
        assert_eq!(url, "https://cdn.example/job-7.glb");
    }

    #[tokio::test]
    async fn exhausted_quota_skips_network() {
        let hits = Hits::default();
        let base = spawn_server(fake_service(hits.clone())).await;
        let api = client(base, Some("secret"), ApiQuota::new(1, Duration::ZERO));
        let job = JobHandle::new("job-7").unwrap();

        api.check_status(&job).await.unwrap();
        let err = api.check_status(&job).await.unwrap_err();

        assert!(matches!(err, ApiError::Quota(QuotaError::DailyLimitReached { limit: 1 })));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn job_id_is_sent_as_one_path_segment() {
        let (base, seen) = spawn_recorder().await;
        let api = client(format!("{base}/v1/"), None, ApiQuota::unlimited());

        for id in ["../x?y#z", "../../admin/reset", "abc?delete=1", "a#frag"] {
            api.check_status(&JobHandle::new(id).unwrap()).await.unwrap();
        }
        api.download_url(&JobHandle::new("a/b").unwrap()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                "/v1/jobs/..%2Fx%3Fy%23z",
                "/v1/jobs/..%2F..%2Fadmin%2Freset",
                "/v1/jobs/abc%3Fdelete=1",
                "/v1/jobs/a%23frag",
                "/v1/jobs/a%2Fb/download",
            ]
        );
    }

    #[tokio::test]
    async fn dot_segments_are_refused_before_sending() {
        let (base, seen) = spawn_recorder().await;
        let api = client(base, None, ApiQuota::unlimited());

        for id in [".", ".."] {
            let err = api.check_status(&JobHandle::new(id).unwrap()).await.unwrap_err();
            assert!(matches!(err, ApiError::UnaddressableJob(_)));
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn rejects_unusable_base_url() {
        let quota = Arc::new(ApiQuota::unlimited());
        for base in ["not a url", "mailto:jobs@example.com"] {
            let err = HttpModelApi::new(base, None, quota.clone()).err().unwrap();
            assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(format!("http://{addr}"), None, ApiQuota::unlimited());
        let err = api.check_status(&JobHandle::new("job-1").unwrap()).await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
    }
}
