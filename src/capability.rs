//! Capability providers and the process-wide capability cache.
//!
//! External capabilities (a rasterizer, a document library) are obtained
//! through a [`CapabilityProvider`] and loaded at most once per process via
//! [`CapabilityCache::ensure_loaded`]. Only successful loads are cached: a
//! provider that failed to load is tried again on the next export.

use crate::{Error, Result};
use log::{debug, info, warn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Rasterizer,
    DocumentAuthoring,
}

/// Identity of a capability; the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityId {
    pub kind: CapabilityKind,
    pub name: String,
}

impl CapabilityId {
    pub fn rasterizer(name: impl Into<String>) -> Self {
        Self {
            kind: CapabilityKind::Rasterizer,
            name: name.into(),
        }
    }

    pub fn document(name: impl Into<String>) -> Self {
        Self {
            kind: CapabilityKind::DocumentAuthoring,
            name: name.into(),
        }
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CapabilityKind::Rasterizer => "rasterizer",
            CapabilityKind::DocumentAuthoring => "document",
        };
        write!(f, "{}:{}", kind, self.name)
    }
}

/// Knows how to obtain one external capability.
///
/// `load` may block (launching a browser, fetching a page); the cache runs it
/// on a blocking thread.
pub trait CapabilityProvider: Send + Sync {
    type Output: ?Sized + Send + Sync + 'static;

    fn id(&self) -> CapabilityId;

    fn load(&self) -> Result<Arc<Self::Output>>;
}

type Slot = Box<dyn Any + Send + Sync>;

/// Loaded capabilities keyed by [`CapabilityId`].
#[derive(Default)]
pub struct CapabilityCache {
    loaded: Mutex<HashMap<CapabilityId, Slot>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Arc<CapabilityCache> {
        static GLOBAL: OnceLock<Arc<CapabilityCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(CapabilityCache::new())))
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CapabilityId, Slot>> {
        self.loaded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_loaded(&self, id: &CapabilityId) -> bool {
        self.slots().contains_key(id)
    }

    /// Drop a cached capability so the next `ensure_loaded` reloads it.
    pub fn evict(&self, id: &CapabilityId) -> bool {
        self.slots().remove(id).is_some()
    }

    fn lookup<T>(&self, id: &CapabilityId) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.slots().get(id) {
            None => Ok(None),
            Some(slot) => slot
                .downcast_ref::<Arc<T>>()
                .map(|cap| Some(Arc::clone(cap)))
                .ok_or_else(|| {
                    Error::ExportFailed(format!("capability {} is cached with a different type", id))
                }),
        }
    }

    /// Return the cached capability for `provider`, loading it first if needed.
    pub async fn ensure_loaded<P>(&self, provider: Arc<P>) -> Result<Arc<P::Output>>
    where
        P: CapabilityProvider + ?Sized + 'static,
    {
        let id = provider.id();
        if let Some(cap) = self.lookup::<P::Output>(&id)? {
            debug!("capability {} already loaded", id);
            return Ok(cap);
        }

        info!("loading capability {}", id);
        let loader = Arc::clone(&provider);
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| Error::ExportFailed(format!("loader for {} aborted: {}", id, e)))
            .and_then(|res| res)
            .map_err(|e| {
                warn!("capability {} failed to load: {}", id, e);
                load_failure(&id, e)
            })?;

        // Another export may have loaded the same capability meanwhile; keep the first.
        let mut slots = self.slots();
        let slot = slots
            .entry(id.clone())
            .or_insert_with(|| Box::new(Arc::clone(&loaded)));
        slot.downcast_ref::<Arc<P::Output>>()
            .map(Arc::clone)
            .ok_or_else(|| Error::ExportFailed(format!("capability {} is cached with a different type", id)))
    }
}

fn load_failure(id: &CapabilityId, err: Error) -> Error {
    match (id.kind, err) {
        (CapabilityKind::Rasterizer, e @ Error::CaptureFailed(_)) => e,
        (CapabilityKind::Rasterizer, other) => {
            Error::CaptureFailed(format!("{} is unavailable: {}", id, other))
        }
        (CapabilityKind::DocumentAuthoring, e @ Error::ExportFailed(_)) => e,
        (CapabilityKind::DocumentAuthoring, other) => {
            Error::ExportFailed(format!("{} is unavailable: {}", id, other))
        }
    }
}
