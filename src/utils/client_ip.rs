use actix_web::HttpRequest;

const ORIGINAL_IP_HEADER: &str = "x-original-ip";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";

/// Resolves the client address used for rate limiting. `x-original-ip` is the
/// trusted hint set at the edge and wins outright; otherwise the first
/// `x-forwarded-for` hop, then `x-real-ip`, then the peer address.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(ip) = header_value(req, ORIGINAL_IP_HEADER) {
        return ip;
    }
    if let Some(list) = header_value(req, FORWARDED_FOR_HEADER) {
        if let Some(first) = list.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(ip) = header_value(req, REAL_IP_HEADER) {
        return ip;
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
