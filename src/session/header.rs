use crate::session::TokenStorage;
use axum::http::{HeaderName, HeaderValue};
use std::sync::Mutex;

/// Secondary store: the client keeps the token in its own persistent storage
/// and echoes it in a request header. Writes are sent back in the same header;
/// a clear sends it empty.
pub struct HeaderStorage {
    name: HeaderName,
    incoming: Option<String>,
    pending: Mutex<Option<Option<String>>>,
}

impl HeaderStorage {
    pub fn new(name: HeaderName, incoming: Option<String>) -> Self {
        Self {
            name,
            incoming,
            pending: Mutex::new(None),
        }
    }
}

impl TokenStorage for HeaderStorage {
    fn read(&self) -> Option<String> {
        match &*self.pending.lock().unwrap() {
            Some(pending) => pending.clone(),
            None => self.incoming.clone().filter(|it| !it.is_empty()),
        }
    }
    fn write(&self, token: &str) {
        *self.pending.lock().unwrap() = Some(Some(token.to_string()));
    }
    fn clear(&self) {
        *self.pending.lock().unwrap() = Some(None);
    }
    fn pending_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let value = match &*self.pending.lock().unwrap() {
            None => return Vec::new(),
            Some(Some(token)) => HeaderValue::from_str(token),
            Some(None) => Ok(HeaderValue::from_static("")),
        };
        match value {
            Ok(value) => vec![(self.name.clone(), value)],
            Err(err) => {
                tracing::warn!(reason = %err, "session token is not a valid header value");
                Vec::new()
            }
        }
    }
}
