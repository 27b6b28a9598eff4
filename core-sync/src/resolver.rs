//! # Folder Resolver
//!
//! Turns a configured folder reference into a remote folder slug.
//!
//! Strategies, in order:
//!
//! 1. **Direct** - treat the reference as a slug and list it.
//! 2. **Path walk** - for references containing `/`, match each segment from
//!    the account root against child folders by slug or normalized name.
//! 3. **Breadth-first search** - otherwise, search the account tree level by
//!    level for a folder whose slug or normalized name equals the reference.
//!
//! All strategies go through the section's [`FolderListingCache`], so no
//! folder is listed twice while resolving.

use bridge_traits::remote::{RemoteEntry, RemoteHost, Session};
use core_catalog::normalize::normalize_name;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::listing::FolderListingCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    Direct,
    PathWalk,
    BreadthFirst,
}

/// A located section root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub slug: String,
    /// Folder names from the account root down to and including the match.
    /// Empty for direct lookups, where the tree position is unknown.
    pub segments: Vec<String>,
    pub strategy: ResolveStrategy,
}

pub struct FolderResolver<'a> {
    host: &'a dyn RemoteHost,
    session: &'a Session,
    max_depth: usize,
}

struct Pending {
    slug: Option<String>,
    path: Vec<String>,
    depth: usize,
}

fn matches_reference(entry: &RemoteEntry, reference: &str, normalized: &str) -> bool {
    entry.is_folder && (entry.slug == reference || normalize_name(&entry.name) == normalized)
}

impl<'a> FolderResolver<'a> {
    pub fn new(host: &'a dyn RemoteHost, session: &'a Session, max_depth: usize) -> Self {
        Self {
            host,
            session,
            max_depth,
        }
    }

    /// Resolve `reference` to a folder slug.
    ///
    /// # Errors
    ///
    /// - `SyncError::Auth` if the session is rejected at any point
    /// - `SyncError::Resolution` if no strategy locates the folder
    #[instrument(skip(self, cache))]
    pub async fn resolve(
        &self,
        reference: &str,
        cache: &mut FolderListingCache,
    ) -> Result<ResolvedFolder> {
        let reference = reference.trim();
        let unresolved = || SyncError::Resolution {
            reference: reference.to_string(),
        };

        if reference.is_empty() {
            return Err(unresolved());
        }

        if let Some(found) = self.direct(reference, cache).await? {
            return Ok(found);
        }

        let found = if reference.contains('/') {
            self.walk_path(reference, cache).await?
        } else {
            self.breadth_first(reference, cache).await?
        };

        match found {
            Some(resolved) => {
                info!(
                    slug = %resolved.slug,
                    strategy = ?resolved.strategy,
                    "Resolved folder reference"
                );
                Ok(resolved)
            }
            None => {
                warn!("Folder reference could not be resolved");
                Err(unresolved())
            }
        }
    }

    async fn direct(
        &self,
        reference: &str,
        cache: &mut FolderListingCache,
    ) -> Result<Option<ResolvedFolder>> {
        match cache
            .children(self.host, self.session, Some(reference))
            .await
        {
            Ok(_) => Ok(Some(ResolvedFolder {
                slug: reference.to_string(),
                segments: Vec::new(),
                strategy: ResolveStrategy::Direct,
            })),
            Err(SyncError::Auth(msg)) => Err(SyncError::Auth(msg)),
            Err(e) => {
                debug!(error = %e, "Direct lookup missed");
                Ok(None)
            }
        }
    }

    async fn walk_path(
        &self,
        reference: &str,
        cache: &mut FolderListingCache,
    ) -> Result<Option<ResolvedFolder>> {
        let mut current: Option<String> = None;
        let mut segments = Vec::new();

        for segment in reference.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let children = match self.list(current.as_deref(), cache).await? {
                Some(children) => children,
                None => return Ok(None),
            };

            let normalized = normalize_name(segment);
            let Some(next) = children
                .into_iter()
                .find(|child| matches_reference(child, segment, &normalized))
            else {
                debug!(segment, "Path segment not found");
                return Ok(None);
            };

            segments.push(next.name);
            current = Some(next.slug);
        }

        Ok(current.map(|slug| ResolvedFolder {
            slug,
            segments,
            strategy: ResolveStrategy::PathWalk,
        }))
    }

    async fn breadth_first(
        &self,
        reference: &str,
        cache: &mut FolderListingCache,
    ) -> Result<Option<ResolvedFolder>> {
        let normalized = normalize_name(reference);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([Pending {
            slug: None,
            path: Vec::new(),
            depth: 0,
        }]);

        while let Some(pending) = queue.pop_front() {
            if pending.depth >= self.max_depth {
                continue;
            }

            let Some(children) = self.list(pending.slug.as_deref(), cache).await? else {
                continue;
            };

            for child in children.into_iter().filter(|c| c.is_folder) {
                let mut path = pending.path.clone();
                path.push(child.name.clone());

                if matches_reference(&child, reference, &normalized) {
                    return Ok(Some(ResolvedFolder {
                        slug: child.slug,
                        segments: path,
                        strategy: ResolveStrategy::BreadthFirst,
                    }));
                }

                if visited.insert(child.slug.clone()) {
                    queue.push_back(Pending {
                        slug: Some(child.slug),
                        path,
                        depth: pending.depth + 1,
                    });
                }
            }
        }

        Ok(None)
    }

    /// List a folder, treating everything except auth failures as a dead end.
    async fn list(
        &self,
        slug: Option<&str>,
        cache: &mut FolderListingCache,
    ) -> Result<Option<Vec<RemoteEntry>>> {
        match cache.children(self.host, self.session, slug).await {
            Ok(children) => Ok(Some(children)),
            Err(SyncError::Auth(msg)) => Err(SyncError::Auth(msg)),
            Err(e) => {
                warn!(folder = slug.unwrap_or("<root>"), error = %e, "Skipping unlistable folder");
                Ok(None)
            }
        }
    }
}
