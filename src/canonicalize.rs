/// Canonical forms for shortlinks and their destinations
use regex::Regex;
use std::sync::LazyLock;

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("scheme pattern is valid"));

static SCHEME_WITH_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://.*/").expect("scheme pattern is valid"));

/// Canonicalize a shortlink or destination
///
/// Rules:
/// 1. No `http://` / `https://` scheme (case-insensitive):
///    → prefix `http://`, and append `/` if the input has no `/` anywhere
/// 2. Scheme present but nothing after it contains a `/`:
///    → append `/`
///
/// Examples:
/// - `m` → `http://m/`
/// - `c/` → `http://c/`
/// - `https://mail.google.com` → `https://mail.google.com/`
/// - `HTTP://x/y` → `HTTP://x/y`
pub fn canonicalize(link: &str) -> String {
    if !SCHEME.is_match(link) {
        let mut canonical = format!("http://{}", link);
        if !link.contains('/') {
            canonical.push('/');
        }
        canonical
    } else if !SCHEME_WITH_PATH.is_match(link) {
        format!("{}/", link)
    } else {
        link.to_string()
    }
}

/// Strip the scheme from a canonical link for display
pub fn strip_scheme(canonical: &str) -> String {
    SCHEME.replace(canonical, "").into_owned()
}
