//! Address normalization and host extraction.

/// Trim whitespace and drop one leading `http://` or `https://`
/// (ASCII case-insensitive). Never fails.
pub fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    for prefix in ["http://", "https://"] {
        if let Some(head) = trimmed.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return &trimmed[prefix.len()..];
            }
        }
    }
    trimmed
}

/// Host portion of a normalized address: everything before the first
/// `:<digit>`, then everything before the first `/`.
///
/// Bracketed IPv6 literals (`[fe80::1]:8080`) yield the bare literal.
pub fn host_of(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }

    let bytes = address.as_bytes();
    let cut = bytes
        .windows(2)
        .position(|w| w[0] == b':' && w[1].is_ascii_digit())
        .unwrap_or(address.len());
    let host = &address[..cut];
    match host.find('/') {
        Some(slash) => &host[..slash],
        None => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_case_insensitively() {
        assert_eq!(normalize("https://Foo.Bar:80/x"), "Foo.Bar:80/x");
        assert_eq!(normalize("HTTP://10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize("http://printer.local/status"), "printer.local/status");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize("  host  "), "host");
        assert_eq!(normalize("\thttp://host:8080\n"), "host:8080");
    }

    #[test]
    fn leaves_other_input_alone() {
        assert_eq!(normalize("ftp://host"), "ftp://host");
        assert_eq!(normalize("httpx"), "httpx");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("é"), "é");
    }

    #[test]
    fn strips_only_one_prefix() {
        assert_eq!(normalize("http://http://host"), "http://host");
    }

    #[test]
    fn host_drops_port_and_path() {
        assert_eq!(host_of("192.168.1.20:8080/status"), "192.168.1.20");
        assert_eq!(host_of("printer.local/status"), "printer.local");
        assert_eq!(host_of("10.0.0.1:9999"), "10.0.0.1");
        assert_eq!(host_of("sensor"), "sensor");
    }

    #[test]
    fn host_keeps_colon_without_digits() {
        // Only `:<digit>` starts a port.
        assert_eq!(host_of("host:abc/x"), "host:abc");
    }

    #[test]
    fn host_of_ipv6_literal() {
        assert_eq!(host_of("[fe80::1]:8080/x"), "fe80::1");
    }
}
