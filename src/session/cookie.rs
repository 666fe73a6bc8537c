use crate::session::TokenStorage;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, HeaderValue};
use std::sync::Mutex;

enum Pending {
    Untouched,
    Written(String),
    Cleared,
}

/// Token cookie of a single request/response exchange: reads the request's
/// `Cookie` header and answers writes with `Set-Cookie`.
pub struct CookieStorage {
    name: String,
    incoming: Option<String>,
    max_age_secs: u64,
    secure: bool,
    pending: Mutex<Pending>,
}

impl CookieStorage {
    pub fn new(
        name: impl Into<String>,
        incoming: Option<String>,
        max_age_secs: u64,
        secure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            incoming,
            max_age_secs,
            secure,
            pending: Mutex::new(Pending::Untouched),
        }
    }
}

/// Finds `name` in a `Cookie` header and percent-decodes its value.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim_start)
        .find_map(|part| part.strip_prefix(name)?.strip_prefix('='))?;
    if raw.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(raw)
            .map(|it| it.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

pub fn build_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{name}={}; Path=/; Max-Age={max_age_secs}; SameSite=Strict{}",
        urlencoding::encode(value),
        if secure { "; Secure" } else { "" }
    )
}

pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; SameSite=Strict")
}

impl TokenStorage for CookieStorage {
    fn read(&self) -> Option<String> {
        match &*self.pending.lock().unwrap() {
            Pending::Written(token) => Some(token.clone()),
            Pending::Cleared => None,
            Pending::Untouched => self
                .incoming
                .as_deref()
                .and_then(|header| read_cookie(header, &self.name)),
        }
    }
    fn write(&self, token: &str) {
        *self.pending.lock().unwrap() = Pending::Written(token.to_string());
    }
    fn clear(&self) {
        *self.pending.lock().unwrap() = Pending::Cleared;
    }
    fn pending_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let cookie = match &*self.pending.lock().unwrap() {
            Pending::Untouched => return Vec::new(),
            Pending::Written(token) => build_cookie(&self.name, token, self.max_age_secs, self.secure),
            Pending::Cleared => expired_cookie(&self.name),
        };
        match HeaderValue::from_str(&cookie) {
            Ok(value) => vec![(SET_COOKIE, value)],
            Err(err) => {
                tracing::warn!(reason = %err, "session cookie is not a valid header value");
                Vec::new()
            }
        }
    }
}
