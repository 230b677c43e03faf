use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vigil_core::error::{Result, VigilError};
use vigil_core::{BindError, ExtensionFlags, ExtensionId, ExtensionKind, ModuleId};

use super::binder::{Binder, BoundCallable};
use super::descriptor::ExtensionDescriptor;

/// A registered extension: its descriptor plus binding state.
pub struct Extension {
    descriptor: ExtensionDescriptor,
    bound: RwLock<Option<BoundCallable>>,
    // serializes Setup and invalidation of this one extension
    setup_lock: Mutex<()>,
    enabled: AtomicBool,
    // set once the extension leaves the registry; Setup refuses afterwards
    retired: AtomicBool,
}

impl Extension {
    fn new(descriptor: ExtensionDescriptor) -> Self {
        let enabled = !descriptor.flags.contains(ExtensionFlags::DISABLED);
        Self {
            descriptor,
            bound: RwLock::new(None),
            setup_lock: Mutex::new(()),
            enabled: AtomicBool::new(enabled),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ExtensionId {
        self.descriptor.identity
    }

    pub fn kind(&self) -> ExtensionKind {
        self.descriptor.kind
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_bound(&self) -> bool {
        self.bound.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Clone of the current binding. The read guard is released on return,
    /// so callers never hold it across an invocation.
    pub fn bound(&self) -> Option<BoundCallable> {
        self.bound.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Run Setup and apply the outcome all-or-nothing: success replaces the
    /// binding, failure leaves it empty. Safe to call again after a failure.
    ///
    /// The result is only stored if the extension is still registered and
    /// its module is still loaded once resolution finishes.
    pub fn setup(&self, binder: &Binder<'_>) -> std::result::Result<(), BindError> {
        let _serial = self.setup_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = binder.setup(&self.descriptor).and_then(|bound| {
            if self.is_retired() {
                Err(BindError::Internal(format!(
                    "extension {} was unregistered during setup",
                    self.id()
                )))
            } else if !binder.is_loaded(&bound.module) {
                Err(BindError::InvalidModule {
                    module: bound.module,
                    detail: "module was unloaded during setup".into(),
                })
            } else {
                Ok(bound)
            }
        });
        let mut slot = self.bound.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(bound) => {
                *slot = Some(bound);
                Ok(())
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }

    /// Drop the binding for good; later invocations fail with `NotBound`.
    ///
    /// Called when the extension leaves the registry. Waits for an in-flight
    /// Setup of this extension to finish first.
    fn retire(&self) {
        let _serial = self.setup_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.retired.store(true, Ordering::Release);
        *self.bound.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Ordered set of registered extensions.
///
/// Read-mostly: checks take a snapshot under the read lock and release it
/// before invoking anything, so slow extensions never block registration.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: RwLock<Vec<Arc<Extension>>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Extension>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Extension>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append in registration order. The descriptor's identity must be new.
    pub fn register(&self, descriptor: ExtensionDescriptor) -> Result<Arc<Extension>> {
        let mut entries = self.write();
        if entries.iter().any(|e| e.id() == descriptor.identity) {
            return Err(VigilError::BadRequest(format!(
                "extension {} is already registered",
                descriptor.identity
            )));
        }
        let ext = Arc::new(Extension::new(descriptor));
        entries.push(Arc::clone(&ext));
        Ok(ext)
    }

    pub fn unregister(&self, id: ExtensionId) -> Result<Arc<Extension>> {
        let removed = {
            let mut entries = self.write();
            let pos = entries
                .iter()
                .position(|e| e.id() == id)
                .ok_or(VigilError::UnknownExtension(id))?;
            entries.remove(pos)
        };
        removed.retire();
        Ok(removed)
    }

    /// Unregister and retire everything owned by `module`.
    pub fn remove_module(&self, module: &ModuleId) -> Vec<Arc<Extension>> {
        let removed: Vec<Arc<Extension>> = {
            let mut entries = self.write();
            let (gone, kept): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|e| &e.descriptor.owner_module == module);
            *entries = kept;
            gone
        };
        for ext in &removed {
            ext.retire();
        }
        removed
    }

    pub fn get(&self, id: ExtensionId) -> Option<Arc<Extension>> {
        self.read().iter().find(|e| e.id() == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<Extension>> {
        self.read().clone()
    }

    /// Enabled extensions of one kind, in registration order.
    pub fn active(&self, kind: ExtensionKind) -> Vec<Arc<Extension>> {
        self.read()
            .iter()
            .filter(|e| e.kind() == kind && e.is_enabled())
            .cloned()
            .collect()
    }

    pub fn owned_by(&self, module: &ModuleId) -> Vec<Arc<Extension>> {
        self.read()
            .iter()
            .filter(|e| &e.descriptor.owner_module == module)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: ExtensionKind) -> usize {
        self.read().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
