use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{Backend, BackendId, CodecBackend, OptimizerBackend, PixelBackend, TinifyBackend};
use crate::error::BackendError;
use crate::format::ContainerType;
use crate::selector;

struct Registered {
    backend: Arc<dyn Backend>,
    /// Probe outcome, recorded once at registration
    availability: Result<(), String>,
}

/// Backends known to a compressor, plus the candidate table used to pick
/// which of them race for each container type.
pub struct Registry {
    backends: Vec<Registered>,
    candidates: HashMap<ContainerType, Vec<BackendId>>,
}

impl Registry {
    /// An empty registry using the default candidate table.
    pub fn new() -> Self {
        let candidates = [
            ContainerType::Png,
            ContainerType::Jpeg,
            ContainerType::Webp,
            ContainerType::Gif,
        ]
        .into_iter()
        .map(|c| (c, selector::default_candidates(c).to_vec()))
        .collect();

        Self {
            backends: Vec::new(),
            candidates,
        }
    }

    /// Registry with every built-in backend registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CodecBackend);
        registry.register(OptimizerBackend);
        registry.register(PixelBackend);
        registry.register(TinifyBackend::new());
        registry
    }

    /// Register a backend, replacing any earlier one with the same id.
    /// The backend is probed once here.
    pub fn register<B: Backend + 'static>(&mut self, backend: B) {
        let availability = backend.probe().map_err(|e| e.to_string());
        if let Err(reason) = &availability {
            log::warn!("Backend {} not available: {}", backend.id(), reason);
        }
        let id = backend.id();
        self.backends.retain(|r| r.backend.id() != id);
        self.backends.push(Registered {
            backend: Arc::new(backend),
            availability,
        });
    }

    pub fn with<B: Backend + 'static>(mut self, backend: B) -> Self {
        self.register(backend);
        self
    }

    /// Replace the ordered candidate list for a container type.
    pub fn set_candidates(&mut self, container: ContainerType, backends: Vec<BackendId>) {
        self.candidates.insert(container.selection_key(), backends);
    }

    pub fn with_candidates(mut self, container: ContainerType, backends: Vec<BackendId>) -> Self {
        self.set_candidates(container, backends);
        self
    }

    pub fn candidates(&self, container: ContainerType) -> &[BackendId] {
        self.candidates
            .get(&container.selection_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find(&self, id: BackendId) -> Option<&Registered> {
        self.backends.iter().find(|r| r.backend.id() == id)
    }

    /// Unregistered ids cannot promise anything, so they count as not capable.
    pub fn preserves_metadata(&self, id: BackendId) -> bool {
        self.find(id).is_some_and(|r| r.backend.preserves_metadata())
    }

    pub fn is_available(&self, id: BackendId) -> bool {
        self.find(id).is_some_and(|r| r.availability.is_ok())
    }

    /// The backend ready to be invoked, or why it cannot be.
    pub(crate) fn resolve(&self, id: BackendId) -> Result<Arc<dyn Backend>, BackendError> {
        let registered = self.find(id).ok_or_else(|| BackendError::Unavailable {
            backend: id,
            reason: "not registered".into(),
        })?;
        match &registered.availability {
            Ok(()) => Ok(Arc::clone(&registered.backend)),
            Err(reason) => Err(BackendError::Unavailable {
                backend: id,
                reason: reason.clone(),
            }),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
