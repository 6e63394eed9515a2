// Cookie parsing and Set-Cookie serialization.

use std::collections::HashMap;

/// Attributes of a single Set-Cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub value: String,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Prefix browsers only accept on cookies set with `Secure` from https.
pub const SECURE_COOKIE_PREFIX: &str = "__Secure-";

pub fn strip_secure_cookie_prefix(cookie_name: &str) -> &str {
    cookie_name
        .strip_prefix(SECURE_COOKIE_PREFIX)
        .unwrap_or(cookie_name)
}

/// Parse a `Cookie` request header into name → value.
///
/// Pairs without `=` are skipped; on duplicate names the first wins.
pub fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                map.entry(name.to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    map
}

/// Serialize a cookie into a `Set-Cookie` header value.
pub fn serialize_cookie(name: &str, attrs: &CookieAttributes) -> String {
    let mut parts = vec![format!("{}={}", name, attrs.value)];

    if let Some(max_age) = attrs.max_age {
        parts.push(format!("Max-Age={}", max_age));
    }
    if let Some(ref domain) = attrs.domain {
        parts.push(format!("Domain={}", domain));
    }
    if let Some(ref path) = attrs.path {
        parts.push(format!("Path={}", path));
    }
    if attrs.secure {
        parts.push("Secure".into());
    }
    if attrs.http_only {
        parts.push("HttpOnly".into());
    }
    if let Some(same_site) = attrs.same_site {
        parts.push(format!("SameSite={}", same_site));
    }

    parts.join("; ")
}

/// Parse one `Set-Cookie` header value back into its name and attributes.
pub fn parse_set_cookie(set_cookie: &str) -> Option<(String, CookieAttributes)> {
    let mut parts = set_cookie.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut attrs = CookieAttributes {
        value: value.to_string(),
        max_age: None,
        domain: None,
        path: None,
        secure: false,
        http_only: false,
        same_site: None,
    };

    for attr in parts {
        let (attr_name, attr_value) = match attr.split_once('=') {
            Some((n, v)) => (n.trim().to_lowercase(), Some(v.trim().to_string())),
            None => (attr.to_lowercase(), None),
        };
        match attr_name.as_str() {
            "max-age" => attrs.max_age = attr_value.as_deref().and_then(|v| v.parse().ok()),
            "domain" => attrs.domain = attr_value,
            "path" => attrs.path = attr_value,
            "secure" => attrs.secure = true,
            "httponly" => attrs.http_only = true,
            "samesite" => {
                attrs.same_site = attr_value.as_deref().map(|v| match v.to_lowercase().as_str() {
                    "strict" => SameSite::Strict,
                    "none" => SameSite::None,
                    _ => SameSite::Lax,
                });
            }
            _ => {}
        }
    }

    Some((name.to_string(), attrs))
}
