//! # 请求转发
//!
//! 构建出站请求（目标地址、认证头改写、请求体流式透传），发送到上游，
//! 并在回传前调整响应头。请求体与响应体都不在内存中缓冲。

use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::response::Response;
use sync_wrapper::SyncStream;

use super::types::AuthScheme;
use super::upstream_url::{UpstreamAddress, parse_base_url};
use crate::auth::GOOG_API_KEY_HEADER;
use crate::config::{ProxyOptions, UpstreamConfig};
use crate::error::network::NetworkError;
use crate::error::{ProxyError, Result};
use crate::key_pool::Credential;
use crate::logging::{LogComponent, LogStage, mask_secret};
use crate::{ldebug, linfo};

/// 不向上游转发的逐跳头
const HOP_BY_HOP_HEADERS: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// 事件流响应强制使用的 Content-Type
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// 上游请求转发器
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    client: reqwest::Client,
    upstream: UpstreamAddress,
    options: ProxyOptions,
}

impl RequestForwarder {
    /// 创建转发器
    pub fn new(upstream: &UpstreamConfig, options: ProxyOptions) -> Result<Self> {
        let address = parse_base_url(&upstream.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(upstream.connect_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::internal_with_source("创建上游 HTTP 客户端失败", e))?;

        Ok(Self {
            client,
            upstream: address,
            options,
        })
    }

    /// 上游地址
    #[must_use]
    pub const fn upstream(&self) -> &UpstreamAddress {
        &self.upstream
    }

    /// 转发选项
    #[must_use]
    pub const fn options(&self) -> ProxyOptions {
        self.options
    }

    /// 按请求路径选择上游认证方式
    #[must_use]
    pub fn auth_scheme_for(&self, path: &str) -> AuthScheme {
        AuthScheme::for_path(path, self.options.check_dual_auth_headers)
    }

    /// 发送出站请求，返回上游响应（响应体尚未读取）
    pub async fn forward(
        &self,
        request_id: &str,
        parts: &Parts,
        body: Body,
        credential: &Credential,
    ) -> Result<reqwest::Response> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
        let url = self.upstream.url_for(path_and_query);
        let scheme = self.auth_scheme_for(parts.uri.path());
        let headers = self.build_outbound_headers(&parts.headers, credential, scheme)?;

        if self.options.log_request_headers {
            ldebug!(
                request_id,
                LogStage::UpstreamRequest,
                LogComponent::Forwarder,
                "outbound_headers",
                "出站请求头",
                headers = ?masked_headers(&headers)
            );
        }

        let body_is_empty = body.size_hint().exact() == Some(0);

        linfo!(
            request_id,
            LogStage::UpstreamRequest,
            LogComponent::Forwarder,
            "forward_request",
            "Forwarding request upstream",
            method = %parts.method,
            url = %url,
            auth_scheme = %scheme,
            key = %credential,
            streamed_body = !body_is_empty
        );

        let mut builder = self
            .client
            .request(parts.method.clone(), url)
            .headers(headers);
        if !body_is_empty {
            builder = builder.body(reqwest::Body::wrap_stream(SyncStream::new(
                body.into_data_stream(),
            )));
        }

        Ok(builder.send().await.map_err(NetworkError::from)?)
    }

    /// 构建出站请求头
    ///
    /// 保留下游的其余请求头；改写 `Host`，移除 `Accept-Encoding` 与逐跳头，
    /// 并按认证方式写入上游凭据。
    pub fn build_outbound_headers(
        &self,
        inbound: &HeaderMap,
        credential: &Credential,
        scheme: AuthScheme,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
        for (name, value) in inbound {
            if is_hop_by_hop(name) || name == header::HOST || name == header::ACCEPT_ENCODING {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        headers.insert(header::HOST, header_value(&self.upstream.host_header)?);

        match scheme {
            AuthScheme::OpenAiCompatible => {
                headers.remove(GOOG_API_KEY_HEADER);
                headers.insert(
                    header::AUTHORIZATION,
                    header_value(&format!("Bearer {}", credential.as_str()))?,
                );
            }
            AuthScheme::Native => {
                headers.remove(header::AUTHORIZATION);
                headers.insert(
                    HeaderName::from_static(GOOG_API_KEY_HEADER),
                    header_value(credential.as_str())?,
                );
            }
        }

        Ok(headers)
    }

    /// 将上游响应转换为下游响应，响应体以流的形式透传
    #[must_use]
    pub fn relay_response(upstream: reqwest::Response) -> Response {
        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        adjust_response_headers(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// 调整回传给下游的响应头
///
/// 事件流响应强制 `Content-Type`/`Cache-Control`/`Connection`；
/// 始终移除 `Content-Encoding` 与 `Transfer-Encoding`。
pub fn adjust_response_headers(headers: &mut HeaderMap) {
    let is_event_stream = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/event-stream"));

    if is_event_stream {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::TRANSFER_ENCODING);
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| NetworkError::InvalidRequest(format!("无效的请求头值: {e}")).into())
}

/// 脱敏后的请求头列表（日志用）
#[must_use]
pub fn masked_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let raw = value.to_str().unwrap_or("<binary>");
            let shown = if name == header::AUTHORIZATION || name.as_str() == GOOG_API_KEY_HEADER {
                mask_secret(raw)
            } else {
                raw.to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use pretty_assertions::assert_eq;

    fn forwarder(check_dual_auth_headers: bool) -> RequestForwarder {
        let config = AppConfig::default();
        let options = ProxyOptions {
            check_dual_auth_headers,
            ..ProxyOptions::default()
        };
        RequestForwarder::new(&config.upstream, options).unwrap()
    }

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local:8080"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer shared"));
        headers.insert(GOOG_API_KEY_HEADER, HeaderValue::from_static("shared"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));
        headers
    }

    #[test]
    fn test_native_scheme_headers() {
        let forwarder = forwarder(true);
        let headers = forwarder
            .build_outbound_headers(&inbound(), &Credential::new("upstream-key"), AuthScheme::Native)
            .unwrap();

        assert_eq!(headers.get(GOOG_API_KEY_HEADER).unwrap(), "upstream-key");
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(
            headers.get(header::HOST).unwrap(),
            "generativelanguage.googleapis.com"
        );
        assert!(headers.get(header::ACCEPT_ENCODING).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_openai_scheme_headers() {
        let forwarder = forwarder(true);
        let headers = forwarder
            .build_outbound_headers(
                &inbound(),
                &Credential::new("upstream-key"),
                AuthScheme::OpenAiCompatible,
            )
            .unwrap();

        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer upstream-key"
        );
        assert!(headers.get(GOOG_API_KEY_HEADER).is_none());
    }

    #[test]
    fn test_single_header_mode_always_native() {
        let single = forwarder(false);
        assert_eq!(
            single.auth_scheme_for("/v1beta/openai/chat/completions"),
            AuthScheme::Native
        );
        assert_eq!(
            forwarder(true).auth_scheme_for("/v1beta/openai/chat/completions"),
            AuthScheme::OpenAiCompatible
        );
    }

    #[test]
    fn test_event_stream_headers_forced() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert("x-goog-trace", HeaderValue::from_static("abc"));

        adjust_response_headers(&mut headers);

        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), EVENT_STREAM_CONTENT_TYPE);
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(header::CONNECTION).unwrap(), "keep-alive");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(headers.get("x-goog-trace").unwrap(), "abc");
    }

    #[test]
    fn test_non_stream_headers_untouched_except_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private"));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        adjust_response_headers(&mut headers);

        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "private");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_masked_headers_hide_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(GOOG_API_KEY_HEADER, HeaderValue::from_static("AIzaSyA1234567890abcdef"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        let masked = masked_headers(&headers);
        assert!(masked.contains(&("x-goog-api-key".to_string(), "AIzaSyA123...".to_string())));
        assert!(masked.contains(&("accept".to_string(), "*/*".to_string())));
    }
}
