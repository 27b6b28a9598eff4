//! In-memory remote host for unit tests.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::remote::{RemoteEntry, RemoteFileInfo, RemoteHost, Session};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn folder(slug: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        slug: slug.to_string(),
        name: name.to_string(),
        is_folder: true,
        size: None,
    }
}

pub fn file(slug: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        slug: slug.to_string(),
        name: name.to_string(),
        is_folder: false,
        size: Some(1024),
    }
}

#[derive(Default)]
pub struct FakeHost {
    folders: HashMap<Option<String>, Vec<RemoteEntry>>,
    failing: HashSet<String>,
    list_calls: Mutex<HashMap<Option<String>, usize>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, slug: Option<&str>, children: Vec<RemoteEntry>) -> Self {
        self.folders.insert(slug.map(str::to_string), children);
        self
    }

    /// Listing for `slug` fails with a transient error.
    pub fn failing_listing(mut self, slug: &str) -> Self {
        self.failing.insert(slug.to_string());
        self
    }

    pub fn list_calls(&self, slug: Option<&str>) -> usize {
        self.list_calls
            .lock()
            .map(|calls| calls.get(&slug.map(str::to_string)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_list_calls(&self) -> usize {
        self.list_calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteHost for FakeHost {
    async fn login(&self) -> Result<Session> {
        Ok(Session::new("fake-token"))
    }

    async fn list_folder(&self, _session: &Session, slug: Option<&str>) -> Result<Vec<RemoteEntry>> {
        let key = slug.map(str::to_string);
        if let Ok(mut calls) = self.list_calls.lock() {
            *calls.entry(key.clone()).or_default() += 1;
        }

        if slug.is_some_and(|s| self.failing.contains(s)) {
            return Err(BridgeError::OperationFailed("listing unavailable".into()));
        }

        self.folders
            .get(&key)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(slug.unwrap_or("<root>").to_string()))
    }

    /// Unit tests only exercise listings.
    async fn get_file_detail(&self, _session: &Session, slug: &str) -> Result<RemoteFileInfo> {
        Err(BridgeError::NotFound(slug.to_string()))
    }
}
