use url::Url;

/// 主机名（小写，去掉 `www.` 前缀），无法解析时返回 None
pub fn domain_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// robots策略的缓存键：scheme + host + port
pub fn origin_of(parsed: &Url) -> String {
    parsed.origin().ascii_serialization()
}
