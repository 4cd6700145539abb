use url::Url;

/// Truncate to at most `max` characters, counting `char`s so multi-byte
/// content never splits mid-codepoint.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// A link is usable only if it parses as an absolute http(s) URL.
pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => url.scheme() == "http" || url.scheme() == "https",
        Err(_) => false,
    }
}

/// Normalize a link before fingerprinting: surrounding whitespace carries no
/// identity.
pub fn normalize_link(link: &str) -> String {
    link.trim().to_string()
}
