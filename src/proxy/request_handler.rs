//! # 代理请求处理器
//!
//! 每个请求依次经过：共享密钥校验 → 选择上游密钥 → 转发 → 记录健康结果 → 回传响应。
//! 任一步骤失败都在这里转换为纯文本错误响应。

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use super::forwarding::{RequestForwarder, masked_headers};
use super::state::ProxyState;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo};

/// 所有代理路由共用的处理函数
pub async fn proxy_handler(State(state): State<ProxyState>, request: Request) -> Response {
    let request_id = Uuid::new_v4().to_string();

    match handle_request(&state, &request_id, request).await {
        Ok(response) => response,
        Err(err) => {
            if !matches!(err, ProxyError::Authentication { .. }) {
                let (status, code) = err.to_http_response_parts();
                lerror!(
                    request_id,
                    LogStage::Error,
                    LogComponent::Handler,
                    "request_failed",
                    "Request failed",
                    status = status.as_u16(),
                    code = code,
                    error = %err
                );
            }
            err.into_response()
        }
    }
}

async fn handle_request(state: &ProxyState, request_id: &str, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();

    linfo!(
        request_id,
        LogStage::RequestStart,
        LogComponent::Handler,
        "request_received",
        "Incoming request",
        method = %parts.method,
        path = parts.uri.path(),
        query = parts.uri.query().unwrap_or("")
    );
    if state.forwarder.options().log_request_headers {
        ldebug!(
            request_id,
            LogStage::RequestStart,
            LogComponent::Handler,
            "inbound_headers",
            "入站请求头",
            headers = ?masked_headers(&parts.headers)
        );
    }

    state.gate.authenticate(request_id, &parts.headers)?;

    let credential = state.selector.select(request_id).await?;

    let upstream = state
        .forwarder
        .forward(request_id, &parts, body, &credential)
        .await?;
    let status = upstream.status();

    linfo!(
        request_id,
        LogStage::Response,
        LogComponent::Handler,
        "upstream_responded",
        "Upstream responded",
        status = status.as_u16(),
        key = %credential
    );

    if let Some(tracker) = &state.tracker {
        tracker.record_outcome(request_id, &credential, status).await;
    }

    Ok(RequestForwarder::relay_response(upstream))
}
