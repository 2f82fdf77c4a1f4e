//! Reasoning field cache
//!
//! Remembers the non-standard fields (reasoning text, provider metadata) of
//! completed assistant messages so they can be put back when the same turn is
//! replayed as history. Providers return these fields but clients drop them.

use crate::models::Message;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Separator between content text and tool call ids in a cache key
const KEY_SEPARATOR: &str = "|||";

/// Delimiter between tool call ids in a cache key
const ID_DELIMITER: &str = "|";

/// Default entry lifetime (one hour)
pub const DEFAULT_TTL_SECS: i64 = 60 * 60;

/// One remembered message
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Independent copy of the message as it was remembered
    pub data: Message,
    pub cached_at: DateTime<Utc>,
}

/// Derive the cache key of a message from its content and tool call ids.
///
/// Provider fields are not part of the key, so two messages with the same
/// visible content and call ids share an entry.
pub fn canonical_key(message: &Message) -> String {
    let mut key = message.content_text();
    key.push_str(KEY_SEPARATOR);
    key.push_str(&message.tool_call_ids().join(ID_DELIMITER));
    key
}

/// TTL-bounded store of extra message fields
#[derive(Debug)]
pub struct ReasoningCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ReasoningCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remember a completed message if it carries extra fields
    pub fn remember(&self, message: &Message) {
        self.remember_at(message, Utc::now());
    }

    pub fn remember_at(&self, message: &Message, now: DateTime<Utc>) {
        if !message.is_cacheable() {
            debug!("🚫 Not caching message without extra fields");
            return;
        }

        let key = canonical_key(message);
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Reasoning cache lock poisoned, skipping remember");
            return;
        };

        let fields: Vec<&str> = message.extra.keys().map(String::as_str).collect();
        debug!("💾 Caching extra fields {:?} ({} entries)", fields, entries.len() + 1);
        entries.insert(
            key,
            CacheEntry {
                data: message.clone(),
                cached_at: now,
            },
        );
    }

    /// Look up the fields remembered for an outgoing assistant message.
    ///
    /// Returns the cached extra fields minus call-identity fields, or `None`
    /// on a miss, an expired entry (which is removed) or a non-assistant message.
    pub fn lookup_and_strip(&self, message: &Message) -> Option<Map<String, Value>> {
        self.lookup_and_strip_at(message, Utc::now())
    }

    pub fn lookup_and_strip_at(
        &self,
        message: &Message,
        now: DateTime<Utc>,
    ) -> Option<Map<String, Value>> {
        if !message.is_assistant() {
            return None;
        }

        let key = canonical_key(message);
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Reasoning cache lock poisoned, treating lookup as a miss");
            return None;
        };

        let entry = entries.get(&key)?;
        if now - entry.cached_at > self.ttl {
            debug!("♻️ Expired reasoning cache entry removed");
            entries.remove(&key);
            return None;
        }

        if !entry.data.is_cacheable() {
            return None;
        }

        let fields = entry.data.replayable_extra();
        if fields.is_empty() {
            return None;
        }

        debug!("✅ Reasoning cache hit with {} field(s)", fields.len());
        Some(fields)
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for ReasoningCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}
