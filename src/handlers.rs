use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::pool::{PoolError, TokenRecord};
use crate::relay;
use crate::translate;
use crate::upstream;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

/// Optional bearer check. With no secret configured every request passes;
/// with one configured, a missing or mismatched token is a 401.
fn check_access(headers: &HeaderMap, state: &AppState) -> AppResult<()> {
    let Some(secret) = state.runtime.access_secret.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    if presented != secret {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

fn pool_error_to_app(err: PoolError) -> AppError {
    match err {
        PoolError::NoCredentialsAvailable => AppError::no_credentials(),
        PoolError::Store(message) => AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            message,
        ),
    }
}

pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    check_access(&headers, &state)?;
    let data: Vec<Value> = crate::app::MODEL_CATALOG
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": 0,
                "owned_by": "agentgate"
            })
        })
        .collect();
    Ok(Json(json!({ "object": "list", "data": data })).into_response())
}

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    check_access(&headers, &state)?;
    metrics::counter!("agentgate_requests_total").increment(1);

    let request: crate::openai::ChatCompletionRequest = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request(format!("invalid chat request: {err}")))?;
    let model = request
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| crate::app::MODEL_CATALOG[0].to_string());
    let stream = request.stream.unwrap_or(false);

    let credentials = state.pool.acquire().await.map_err(pool_error_to_app)?;
    let upstream_req = translate::translate(&request);
    let prompt_tokens = upstream_req.prompt_token_estimate();

    let resp = upstream::call_chat_stream(&state.http, &credentials, &upstream_req)
        .await
        .map_err(|err| {
            metrics::counter!("agentgate_upstream_errors_total").increment(1);
            err.into_app_error()
        })?;

    if stream {
        let (tx, rx) = mpsc::channel::<Event>(64);
        tokio::spawn(async move {
            relay::stream_chat(model, resp.bytes_stream(), tx).await;
        });
        let events = tokio_stream::wrappers::ReceiverStream::new(rx)
            .map(Ok::<_, std::convert::Infallible>);
        return Ok(Sse::new(events).into_response());
    }

    let text = relay::aggregate_chat(resp.bytes_stream()).await;
    Ok(Json(relay::completion_json(&model, &text, prompt_tokens)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub token: String,
    pub tenant_url: String,
}

pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IssueTokenRequest>,
) -> AppResult<Response> {
    check_access(&headers, &state)?;
    if body.token.trim().is_empty() || body.tenant_url.trim().is_empty() {
        return Err(AppError::bad_request("token and tenant_url are required"));
    }
    let record = TokenRecord {
        token: body.token,
        tenant_url: body.tenant_url,
        issued_at: chrono::Utc::now().timestamp(),
    };
    state.pool.put(record).await.map_err(pool_error_to_app)?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

pub async fn list_tokens(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    check_access(&headers, &state)?;
    let records = state.pool.list().await.map_err(pool_error_to_app)?;
    let data: Vec<Value> = records
        .into_iter()
        .map(|record| {
            json!({
                "token": mask_token(&record.token),
                "tenant_url": record.tenant_url,
                "issued_at": record.issued_at
            })
        })
        .collect();
    Ok(Json(json!({ "status": "ok", "tokens": data })).into_response())
}

pub async fn delete_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> AppResult<Response> {
    check_access(&headers, &state)?;
    state.pool.delete(&token).await.map_err(pool_error_to_app)?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

fn mask_token(token: &str) -> String {
    // Tokens are opaque strings; count and split on chars, not bytes.
    let count = token.chars().count();
    if count <= 8 {
        return "********".to_string();
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_hides_middle() {
        assert_eq!(mask_token("abcd1234efgh5678"), "abcd...5678");
        assert_eq!(mask_token("short"), "********");
    }

    #[test]
    fn mask_handles_multibyte_tokens() {
        assert_eq!(mask_token("你好你好你好"), "********");
        assert_eq!(mask_token("你好你好你好你好好"), "你好你好...好你好好");
        assert_eq!(mask_token("tok_好好好好好好"), "tok_...好好好好");
    }
}
