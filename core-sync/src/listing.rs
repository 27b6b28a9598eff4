//! Per-section memo of remote folder listings.

use bridge_traits::remote::{RemoteEntry, RemoteHost, Session};
use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;

/// Children of each folder fetched during one section run, keyed by slug
/// (`None` is the account root). Failed fetches are not cached.
#[derive(Debug, Default)]
pub struct FolderListingCache {
    listings: HashMap<Option<String>, Vec<RemoteEntry>>,
    fetches: usize,
}

impl FolderListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children of `slug`, listing the folder remotely on first use.
    pub async fn children(
        &mut self,
        host: &dyn RemoteHost,
        session: &Session,
        slug: Option<&str>,
    ) -> Result<Vec<RemoteEntry>> {
        let key = slug.map(str::to_string);
        if let Some(entries) = self.listings.get(&key) {
            return Ok(entries.clone());
        }

        let entries = host.list_folder(session, slug).await?;
        self.fetches += 1;
        debug!(
            folder = slug.unwrap_or("<root>"),
            count = entries.len(),
            "Cached folder listing"
        );
        self.listings.insert(key, entries.clone());
        Ok(entries)
    }

    pub fn contains(&self, slug: Option<&str>) -> bool {
        self.listings.contains_key(&slug.map(str::to_string))
    }

    /// Remote listings performed through this cache.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{folder, FakeHost};

    #[tokio::test]
    async fn test_each_folder_listed_once() {
        let host = FakeHost::new().with_folder(None, vec![folder("a", "A")]);

        let session = Session::new("t");
        let mut cache = FolderListingCache::new();
        cache.children(&host, &session, None).await.unwrap();
        let again = cache.children(&host, &session, None).await.unwrap();

        assert_eq!(again.len(), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(host.list_calls(None), 1);
        assert!(cache.contains(None));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let host = FakeHost::new().failing_listing("x");

        let session = Session::new("t");
        let mut cache = FolderListingCache::new();
        assert!(cache.children(&host, &session, Some("x")).await.is_err());
        assert!(cache.children(&host, &session, Some("x")).await.is_err());
        assert!(!cache.contains(Some("x")));
        assert_eq!(host.list_calls(Some("x")), 2);
    }
}
