//! Client for the contact-resolver sidecar.
//!
//! The sidecar runs a user session that can import a phone contact and
//! report the matching account. Protocol:
//!
//! - `POST {base}/resolve` with `{"phone": "+15550001111"}`
//! - `200 {"user_id": 42, "display_name": "Alice"}` when found
//! - `404` when no reachable account exists
//! - `429 {"retry_after": 30}` (or a `Retry-After` header) on flood-wait

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::PlatformUserId;
use crate::domain::subscription::PhoneNumber;
use crate::ports::{PlatformError, ResolvedIdentity};

#[derive(Serialize)]
struct ResolveRequest<'a> {
    phone: &'a str,
}

#[derive(Deserialize)]
struct ResolveResponse {
    user_id: i64,
    display_name: Option<String>,
}

#[derive(Deserialize, Default)]
struct FloodWaitBody {
    retry_after: Option<u64>,
}

#[derive(Clone)]
pub struct ContactResolverClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ContactResolverClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PlatformError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub async fn resolve(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ResolvedIdentity>, PlatformError> {
        let response = self
            .http_client
            .post(format!("{}/resolve", self.base_url))
            .json(&ResolveRequest {
                phone: phone.as_str(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout
                } else {
                    PlatformError::Unavailable(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                let header_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let body: FloodWaitBody = response.json().await.unwrap_or_default();
                let secs = body.retry_after.or(header_secs).unwrap_or(1);
                Err(PlatformError::RateLimited {
                    retry_after: Duration::from_secs(secs),
                })
            }
            status if status.is_success() => {
                let found: ResolveResponse = response
                    .json()
                    .await
                    .map_err(|e| PlatformError::Unavailable(format!("Invalid resolver response: {}", e)))?;
                Ok(Some(ResolvedIdentity {
                    user_id: PlatformUserId::new(found.user_id),
                    display_name: found.display_name,
                }))
            }
            status if status.is_server_error() => Err(PlatformError::Unavailable(format!(
                "resolver returned {}",
                status
            ))),
            status => Err(PlatformError::rejected(format!("resolver returned {}", status))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> ContactResolverClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ContactResolverClient::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("+15550001111").unwrap()
    }

    #[tokio::test]
    async fn found_contact_is_resolved() {
        let app = Router::new().route(
            "/resolve",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["phone"], "+15550001111");
                Json(json!({"user_id": 42, "display_name": "Alice"}))
            }),
        );

        let found = serve(app).await.resolve(&phone()).await.unwrap().unwrap();

        assert_eq!(found.user_id, PlatformUserId::new(42));
        assert_eq!(found.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn missing_contact_is_none() {
        let app = Router::new().route("/resolve", post(|| async { StatusCode::NOT_FOUND }));
        assert!(serve(app).await.resolve(&phone()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flood_wait_reads_retry_after() {
        let app = Router::new().route(
            "/resolve",
            post(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("retry-after", HeaderValue::from_static("5"));
                (StatusCode::TOO_MANY_REQUESTS, headers, Json(json!({"retry_after": 30})))
                    .into_response()
            }),
        );

        let err = serve(app).await.resolve(&phone()).await.unwrap_err();

        assert_eq!(
            err,
            PlatformError::RateLimited {
                retry_after: Duration::from_secs(30)
            }
        );
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let app = Router::new().route(
            "/resolve",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let err = serve(app).await.resolve(&phone()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable(_)));
    }
}
