//! 上游地址解析工具
//!
//! 统一处理 `base_url` 可能包含的 scheme / path / port，输出请求源与 `Host` 头。
//! 下游请求的路径与查询串原样拼接到源之后。

use crate::ensure;
use crate::error::{Result, config::ConfigError};
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAddress {
    /// `scheme://host[:port]`
    pub origin: String,
    /// 出站请求的 `Host` 头
    pub host_header: String,
}

impl UpstreamAddress {
    /// 拼接下游的路径与查询串
    #[must_use]
    pub fn url_for(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{path_and_query}", self.origin)
        } else {
            format!("{}/{path_and_query}", self.origin)
        }
    }
}

/// 解析上游 `base_url`；缺少 scheme 时按 https 处理，路径部分被忽略
pub fn parse_base_url(raw: &str) -> Result<UpstreamAddress> {
    let trimmed = raw.trim();
    ensure!(
        !trimmed.is_empty(),
        ConfigError::Load("base_url 不能为空".to_string())
    );

    let url = if trimmed.contains("://") {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("https://{trimmed}"))?
    };

    let host = url
        .host()
        .ok_or_else(|| ConfigError::Load(format!("base_url 缺少 host: {trimmed}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConfigError::Load(format!("base_url 缺少端口: {trimmed}")))?;

    let host_display = match host {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => format!("[{ip}]"),
    };

    let host_header = if url.port().is_some() {
        format!("{host_display}:{port}")
    } else {
        host_display
    };

    Ok(UpstreamAddress {
        origin: format!("{}://{host_header}", url.scheme()),
        host_header,
    })
}
