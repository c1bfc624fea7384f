// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bookmarks and bookmark managers
//!
//! A bookmark manager tracks causal consistency tokens across sessions. One
//! manager may be shared by many concurrent queries, so implementations must
//! be safe for concurrent use.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::RwLock;

/// Opaque causal consistency token issued by the server
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bookmark(String);

impl Bookmark {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Bookmark {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Bookmark {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Tracks bookmarks across sessions and transactions
#[async_trait]
pub trait BookmarkManager: Send + Sync + fmt::Debug {
    /// Bookmarks a new transaction should wait for
    async fn get_bookmarks(&self) -> Vec<Bookmark>;

    /// Replace the bookmarks a transaction started from with the ones it produced
    async fn update_bookmarks(&self, previous: &[Bookmark], new: &[Bookmark]);
}

/// Bookmark manager kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryBookmarkManager {
    bookmarks: RwLock<BTreeSet<Bookmark>>,
}

impl InMemoryBookmarkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known set of bookmarks
    pub fn with_initial(bookmarks: impl IntoIterator<Item = Bookmark>) -> Self {
        Self {
            bookmarks: RwLock::new(bookmarks.into_iter().collect()),
        }
    }
}

#[async_trait]
impl BookmarkManager for InMemoryBookmarkManager {
    async fn get_bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.read().await.iter().cloned().collect()
    }

    async fn update_bookmarks(&self, previous: &[Bookmark], new: &[Bookmark]) {
        // an empty update keeps what we have
        if new.is_empty() {
            return;
        }
        let mut bookmarks = self.bookmarks.write().await;
        for bookmark in previous {
            bookmarks.remove(bookmark);
        }
        bookmarks.extend(new.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_update_replaces_previous() {
        let manager = InMemoryBookmarkManager::with_initial(vec![Bookmark::new("bm:1")]);

        manager
            .update_bookmarks(&[Bookmark::new("bm:1")], &[Bookmark::new("bm:2")])
            .await;

        assert_eq!(manager.get_bookmarks().await, vec![Bookmark::new("bm:2")]);
    }

    #[tokio::test]
    async fn test_empty_update_is_ignored() {
        let manager = InMemoryBookmarkManager::with_initial(vec![Bookmark::new("bm:1")]);
        manager.update_bookmarks(&[Bookmark::new("bm:1")], &[]).await;
        assert_eq!(manager.get_bookmarks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let manager = Arc::new(InMemoryBookmarkManager::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    manager
                        .update_bookmarks(&[], &[Bookmark::new(format!("bm:{}", i))])
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.get_bookmarks().await.len(), 8);
    }
}
