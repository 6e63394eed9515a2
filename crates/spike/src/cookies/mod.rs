// Session cookie definition and the Set-Cookie accumulator handed back to the
// HTTP layer.

pub mod utils;

pub use utils::*;

use spike_core::options::SpikeOptions;

/// A cookie definition: final name plus the attributes every write uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub http_only: bool,
    pub max_age: Option<i64>,
}

impl AuthCookie {
    pub fn to_attributes(&self, value: &str) -> CookieAttributes {
        CookieAttributes {
            value: value.to_string(),
            max_age: self.max_age,
            domain: None,
            path: Some(self.path.clone()),
            secure: self.secure,
            http_only: self.http_only,
            same_site: Some(self.same_site),
        }
    }

    /// Same attributes, empty value, `Max-Age=0`.
    pub fn expired(&self) -> CookieAttributes {
        CookieAttributes {
            max_age: Some(0),
            ..self.to_attributes("")
        }
    }
}

/// Build a cookie named `{__Secure-}{prefix}.{cookie_name}`.
pub fn create_auth_cookie(
    cookie_name: &str,
    prefix: &str,
    secure: bool,
    max_age: Option<i64>,
) -> AuthCookie {
    let secure_prefix = if secure { SECURE_COOKIE_PREFIX } else { "" };
    AuthCookie {
        name: format!("{}{}.{}", secure_prefix, prefix, cookie_name),
        secure,
        same_site: SameSite::Lax,
        path: "/".to_string(),
        http_only: true,
        max_age,
    }
}

/// The session token cookie for these options.
pub fn session_cookie(options: &SpikeOptions) -> AuthCookie {
    let max_age = i64::try_from(options.session.expires_in).unwrap_or(i64::MAX);
    create_auth_cookie(
        "session_token",
        &options.session.cookie_prefix,
        options.uses_https(),
        Some(max_age),
    )
}

/// Read the session token out of a `Cookie` header.
///
/// Accepts the name with or without the `__Secure-` prefix, so a token
/// issued before a scheme change still resolves.
pub fn get_session_token(cookie_header: &str, cookie: &AuthCookie) -> Option<String> {
    let plain = strip_secure_cookie_prefix(&cookie.name);
    let secure = format!("{}{}", SECURE_COOKIE_PREFIX, plain);

    let cookies = parse_cookies(cookie_header);
    cookies
        .get(&cookie.name)
        .or_else(|| cookies.get(plain))
        .or_else(|| cookies.get(&secure))
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Accumulator for Set-Cookie headers.
///
/// Route handlers push cookies here; the HTTP framework layer turns them into
/// response headers.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    /// (cookie name, serialized Set-Cookie value)
    cookies: Vec<(String, String)>,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cookie(&mut self, name: &str, attrs: &CookieAttributes) {
        let header = serialize_cookie(name, attrs);
        self.cookies.push((name.to_string(), header));
    }

    pub fn expire_cookie(&mut self, cookie: &AuthCookie) {
        self.set_cookie(&cookie.name, &cookie.expired());
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn into_headers(self) -> Vec<(String, String)> {
        self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_cookie() {
        let cookie = session_cookie(&SpikeOptions::new("secret"));
        assert_eq!(cookie.name, "spike.session_token");
        assert!(!cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site, SameSite::Lax);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.max_age, Some(2_592_000));
    }

    #[test]
    fn test_https_session_cookie_is_secure() {
        let options = SpikeOptions::new("secret").base_url("https://league.example");
        let cookie = session_cookie(&options);
        assert_eq!(cookie.name, "__Secure-spike.session_token");
        assert!(cookie.secure);
    }

    #[test]
    fn test_get_session_token() {
        let cookie = session_cookie(&SpikeOptions::new("secret"));
        assert_eq!(
            get_session_token("a=1; spike.session_token=tok", &cookie).as_deref(),
            Some("tok")
        );
        assert_eq!(
            get_session_token("__Secure-spike.session_token=tok2", &cookie).as_deref(),
            Some("tok2")
        );
        assert!(get_session_token("spike.session_token=", &cookie).is_none());
        assert!(get_session_token("", &cookie).is_none());
    }

    #[test]
    fn test_response_cookies_expire() {
        let cookie = session_cookie(&SpikeOptions::new("secret"));
        let mut cookies = ResponseCookies::new();
        assert!(cookies.is_empty());
        cookies.expire_cookie(&cookie);

        let headers = cookies.into_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, "spike.session_token");
        assert!(headers[0].1.starts_with("spike.session_token=; Max-Age=0"));
        assert!(headers[0].1.contains("HttpOnly"));
    }
}
