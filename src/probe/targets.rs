/// Discovery paths Datadog has documented at one time or another, relative to
/// `https://api.{site}`.
const DOCUMENTED_DISCOVERY_PATHS: [&str; 7] = [
    "api/v1/mcp/discovery",
    "api/v1/model-monitoring/mcp/discovery",
    "api/v1/mcp-server/discovery",
    "api/v2/mcp/discovery",
    "api/v2/model-monitoring/mcp/discovery",
    "api/v2/mcp-server/discovery",
    "api/v2/mcp-server/mcp/v1/discovery",
];

/// The MCP server URL without its trailing `/mcp` segment.
pub fn mcp_base(mcp_server_url: &str) -> &str {
    let url = mcp_server_url.trim_end_matches('/');
    url.strip_suffix("/mcp").unwrap_or(url)
}

/// Every URL worth trying for an MCP server, most specific first.
pub fn candidate_endpoints(mcp_server_url: &str, site: &str) -> Vec<String> {
    let url = mcp_server_url.trim_end_matches('/');
    let base = mcp_base(url);

    let mut candidates = vec![url.to_string(), base.to_string()];
    for root in [url, base] {
        candidates.push(format!("{}/v1/discovery", root));
        candidates.push(format!("{}/discovery", root));
    }
    candidates.extend(
        DOCUMENTED_DISCOVERY_PATHS
            .iter()
            .map(|path| format!("https://api.{}/{}", site, path)),
    );

    dedup_in_order(candidates)
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}
