use std::sync::Arc;

use dashmap::DashMap;

use vigil_core::error::{Result, VigilError};
use vigil_core::ModuleId;

use super::code_unit::CodeUnit;

/// A loaded capability provider.
pub trait ExtensionModule: Send + Sync {
    fn id(&self) -> ModuleId;

    /// The module's published code unit.
    ///
    /// `Ok(None)` means the module is loaded but has nothing bindable;
    /// `Err` is a failure of the module system itself.
    fn code_unit(&self) -> Result<Option<Arc<CodeUnit>>>;
}

/// Module whose code unit is fixed at construction.
pub struct StaticModule {
    id: ModuleId,
    unit: Option<Arc<CodeUnit>>,
}

impl StaticModule {
    pub fn new(id: impl Into<ModuleId>, unit: CodeUnit) -> Self {
        Self {
            id: id.into(),
            unit: Some(Arc::new(unit)),
        }
    }

    /// A module that loaded but exposes no code unit.
    pub fn empty(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            unit: None,
        }
    }
}

impl ExtensionModule for StaticModule {
    fn id(&self) -> ModuleId {
        self.id.clone()
    }

    fn code_unit(&self) -> Result<Option<Arc<CodeUnit>>> {
        Ok(self.unit.clone())
    }
}

/// Loaded modules keyed by id. Descriptors only ever hold the id.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: DashMap<ModuleId, Arc<dyn ExtensionModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: DashMap::new(),
        }
    }

    pub fn load(&self, module: Arc<dyn ExtensionModule>) -> Result<ModuleId> {
        let id = module.id();
        if id.is_empty() {
            return Err(VigilError::BadRequest("module id must not be empty".into()));
        }
        match self.modules.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(VigilError::DuplicateModule(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(module);
                Ok(id)
            }
        }
    }

    pub fn unload(&self, id: &ModuleId) -> Option<Arc<dyn ExtensionModule>> {
        self.modules.remove(id).map(|(_, m)| m)
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<dyn ExtensionModule>> {
        self.modules.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn loaded_ids(&self) -> Vec<ModuleId> {
        self.modules.iter().map(|e| e.key().clone()).collect()
    }
}
