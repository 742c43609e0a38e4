//! Download link resources.
//!
//! Each opened file gets an object URL that serves its bytes for download.
//! URLs are owned by [`DownloadLink`] guards and revoked exactly once, either
//! explicitly through [`DownloadLink::release`] or when the guard is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Object URL of a registered resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUrl(String);

impl ResourceUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes and content type served behind a [`ResourceUrl`].
#[derive(Debug, Clone)]
pub struct Resource {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: HashMap<ResourceUrl, Resource>,
    revoked: u64,
}

/// Store of live object URLs.
///
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `bytes` and returns a guard owning the new URL.
    pub fn create(&self, bytes: Arc<[u8]>, mime_type: &str, file_name: &str) -> DownloadLink {
        let url = {
            let mut state = self.lock();
            state.next_id += 1;
            let url = ResourceUrl(format!("blob:kbview/{}", state.next_id));
            state.live.insert(url.clone(), Resource { bytes, mime_type: mime_type.to_owned() });
            url
        };

        log::debug!("created download link {url} for {file_name}");

        DownloadLink {
            url,
            file_name: file_name.to_owned(),
            registry: self.clone(),
            released: false,
        }
    }

    /// Removes `url`. Returns `false` if it was not live.
    pub fn revoke(&self, url: &ResourceUrl) -> bool {
        let mut state = self.lock();
        let removed = state.live.remove(url).is_some();
        if removed {
            state.revoked += 1;
        }
        removed
    }

    pub fn resolve(&self, url: &ResourceUrl) -> Option<Resource> {
        self.lock().live.get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Number of URLs revoked over the registry's lifetime.
    pub fn revoked_count(&self) -> u64 {
        self.lock().revoked
    }
}

/// Scoped owner of one object URL.
#[derive(Debug)]
pub struct DownloadLink {
    url: ResourceUrl,
    file_name: String,
    registry: ResourceRegistry,
    released: bool,
}

impl DownloadLink {
    pub fn url(&self) -> &ResourceUrl {
        &self.url
    }

    /// Suggested file name for the download.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Revokes the URL now.
    pub fn release(mut self) {
        self.revoke_once();
    }

    fn revoke_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.registry.revoke(&self.url) {
            log::debug!("revoked download link {}", self.url);
        } else {
            log::warn!("download link {} was already revoked", self.url);
        }
    }
}

impl Drop for DownloadLink {
    fn drop(&mut self) {
        self.revoke_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(data: &[u8]) -> Arc<[u8]> {
        Arc::from(data)
    }

    #[test]
    fn create_and_resolve() {
        let registry = ResourceRegistry::new();
        let link = registry.create(bytes(b"%PDF"), "application/pdf", "a.pdf");

        let resource = registry.resolve(link.url()).expect("link should be live");
        assert_eq!(&*resource.bytes, b"%PDF");
        assert_eq!(resource.mime_type, "application/pdf");
        assert_eq!(link.file_name(), "a.pdf");
        assert!(link.url().as_str().starts_with("blob:"));
    }

    #[test]
    fn urls_are_unique() {
        let registry = ResourceRegistry::new();
        let first = registry.create(bytes(b"1"), "text/plain", "1.txt");
        let second = registry.create(bytes(b"2"), "text/plain", "2.txt");

        assert_ne!(first.url(), second.url());
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn release_revokes_exactly_once() {
        let registry = ResourceRegistry::new();
        let link = registry.create(bytes(b"x"), "application/pdf", "x.pdf");
        let url = link.url().clone();

        link.release();

        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.revoked_count(), 1);
        assert!(registry.resolve(&url).is_none());
    }

    #[test]
    fn drop_revokes() {
        let registry = ResourceRegistry::new();
        {
            let _link = registry.create(bytes(b"x"), "application/pdf", "x.pdf");
            assert_eq!(registry.live_count(), 1);
        }

        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.revoked_count(), 1);
    }

    #[test]
    fn external_revoke_is_not_counted_twice() {
        let registry = ResourceRegistry::new();
        let link = registry.create(bytes(b"x"), "application/pdf", "x.pdf");

        assert!(registry.revoke(link.url()));
        drop(link);

        assert_eq!(registry.revoked_count(), 1);
    }
}
