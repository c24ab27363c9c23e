use crate::error::AppError;
use crate::pool::TokenRecord;
use crate::translate::UpstreamRequest;
use axum::http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Network,
    Http,
}

#[derive(Debug, Clone)]
pub struct UpstreamCallError {
    pub kind: UpstreamErrorKind,
    pub status: Option<StatusCode>,
    pub message: String,
}

impl UpstreamCallError {
    pub fn new(kind: UpstreamErrorKind, status: Option<StatusCode>, message: String) -> Self {
        Self {
            kind,
            status,
            message,
        }
    }

    pub fn into_app_error(self) -> AppError {
        let detail = match self.status {
            Some(status) => format!("upstream status {}: {}", status, self.message),
            None => format!("upstream unavailable: {}", self.message),
        };
        AppError::new(StatusCode::BAD_GATEWAY, "upstream_unavailable", detail)
    }
}

/// POSTs the translated request to the tenant's chat-stream endpoint. The
/// response body is a stream of newline-delimited JSON events, consumed by
/// the relay. No retry on failure.
pub async fn call_chat_stream(
    client: &reqwest::Client,
    credentials: &TokenRecord,
    body: &UpstreamRequest,
) -> Result<reqwest::Response, UpstreamCallError> {
    let url = join_tenant_url(&credentials.tenant_url, "chat-stream");
    let resp = client
        .post(url)
        .bearer_auth(&credentials.token)
        .json(body)
        .send()
        .await
        .map_err(|err| {
            UpstreamCallError::new(UpstreamErrorKind::Network, None, err.to_string())
        })?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let upstream_status =
            StatusCode::from_u16(status.as_u16()).ok();
        return Err(UpstreamCallError::new(
            UpstreamErrorKind::Http,
            upstream_status,
            text,
        ));
    }
    Ok(resp)
}

fn join_tenant_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    format!("{}/{}", base, path.trim_start_matches('/'))
}
