//! Symbol interning
//!
//! Function, class and file names repeat on almost every tick. Interning turns
//! each distinct name into one shared `Arc<str>` so samples stay cheap to clone
//! and compare.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Canonical handle for an interned name
pub type Symbol = Arc<str>;

/// Deduplicates raw symbol bytes into canonical handles
pub trait SymbolTable: Send + Sync {
    /// Return the canonical handle for `raw`, registering it if new
    ///
    /// Invalid UTF-8 is replaced, never rejected: the bytes come from a
    /// foreign process and may be mid-update.
    fn intern(&self, raw: &[u8]) -> Symbol;
}

impl<T: SymbolTable + ?Sized> SymbolTable for Arc<T> {
    fn intern(&self, raw: &[u8]) -> Symbol {
        (**self).intern(raw)
    }
}

/// In-memory intern table shared between the sampler thread and consumers
#[derive(Debug, Default)]
pub struct InternTable {
    entries: Mutex<HashSet<Symbol>>,
}

impl InternTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct symbols registered
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SymbolTable for InternTable {
    fn intern(&self, raw: &[u8]) -> Symbol {
        let text = String::from_utf8_lossy(raw);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(text.as_ref()) {
            return Arc::clone(existing);
        }

        let symbol: Symbol = Arc::from(text.as_ref());
        entries.insert(Arc::clone(&symbol));
        symbol
    }
}
