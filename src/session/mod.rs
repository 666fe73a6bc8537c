//! Session token persistence across two redundant stores.
//!
//! The cookie store is authoritative for reads; the persistent store is the
//! fallback. Writes and clears always touch both. A store without a browser
//! context (background tasks, server-side work) turns every call into a no-op.

mod cookie;
mod header;
mod memory;

pub use cookie::{CookieStorage, build_cookie, expired_cookie, read_cookie};
pub use header::HeaderStorage;
pub use memory::MemoryStorage;

use axum::http::{HeaderName, HeaderValue};

/// A single place a token can be read from and written to.
pub trait TokenStorage: Send + Sync {
    fn read(&self) -> Option<String>;
    fn write(&self, token: &str);
    fn clear(&self);
    /// Response headers that carry the writes and clears back to the client.
    fn pending_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        Vec::new()
    }
}

struct StoreContext {
    cookie: Box<dyn TokenStorage>,
    persistent: Box<dyn TokenStorage>,
}

pub struct SessionStore {
    context: Option<StoreContext>,
}

impl SessionStore {
    pub fn new(
        cookie: impl TokenStorage + 'static,
        persistent: impl TokenStorage + 'static,
    ) -> Self {
        Self {
            context: Some(StoreContext {
                cookie: Box::new(cookie),
                persistent: Box::new(persistent),
            }),
        }
    }

    /// A store with no browser context.
    pub fn detached() -> Self {
        Self { context: None }
    }

    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub fn set_token(&self, token: &str) {
        let Some(context) = &self.context else {
            return;
        };
        context.persistent.write(token);
        context.cookie.write(token);
    }

    pub fn get_token(&self) -> Option<String> {
        let context = self.context.as_ref()?;
        context
            .cookie
            .read()
            .filter(|it| !it.is_empty())
            .or_else(|| context.persistent.read().filter(|it| !it.is_empty()))
    }

    pub fn clear_token(&self) {
        let Some(context) = &self.context else {
            return;
        };
        context.persistent.clear();
        context.cookie.clear();
    }

    pub fn pending_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        match &self.context {
            Some(context) => {
                let mut headers = context.cookie.pending_headers();
                headers.extend(context.persistent.pending_headers());
                headers
            }
            None => Vec::new(),
        }
    }
}
