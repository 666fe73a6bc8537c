use crate::session::TokenStorage;
use std::sync::{Arc, Mutex};

/// In-process token cell. Clones share the same value.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(token.into()))),
        }
    }
}

impl TokenStorage for MemoryStorage {
    fn read(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }
    fn write(&self, token: &str) {
        *self.value.lock().unwrap() = Some(token.to_string());
    }
    fn clear(&self) {
        self.value.lock().unwrap().take();
    }
}
