//! Setup: resolve a descriptor's named target into a callable.
//!
//! Resolution runs four ordered stages, each with its own error:
//! module -> type -> method -> signature. Panics raised by a module while
//! publishing its code unit are caught and reported as `Internal`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use vigil_core::{BindError, ModuleId};

use super::descriptor::ExtensionDescriptor;
use crate::module::{bind_callable, resolve_method, resolve_type, Callable, ModuleRegistry};

/// Result of a successful Setup.
#[derive(Debug, Clone)]
pub struct BoundCallable {
    pub module: ModuleId,
    pub callable: Callable,
}

pub struct Binder<'a> {
    modules: &'a ModuleRegistry,
}

impl<'a> Binder<'a> {
    pub fn new(modules: &'a ModuleRegistry) -> Self {
        Self { modules }
    }

    /// Whether `module` is (still) loaded.
    pub fn is_loaded(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }

    /// Run all four stages. Never panics; always returns a result.
    pub fn setup(&self, descriptor: &ExtensionDescriptor) -> Result<BoundCallable, BindError> {
        match catch_unwind(AssertUnwindSafe(|| self.resolve(descriptor))) {
            Ok(result) => result,
            Err(payload) => Err(BindError::Internal(format!(
                "module {} panicked during setup: {}",
                descriptor.owner_module,
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn resolve(&self, d: &ExtensionDescriptor) -> Result<BoundCallable, BindError> {
        // 1) module
        if d.owner_module.is_empty() {
            return Err(BindError::InvalidModule {
                module: d.owner_module.clone(),
                detail: "no owning module".into(),
            });
        }
        let module = self.modules.get(&d.owner_module).ok_or_else(|| BindError::InvalidModule {
            module: d.owner_module.clone(),
            detail: "module is not loaded".into(),
        })?;
        let unit = module
            .code_unit()
            .map_err(|e| BindError::Internal(format!("module {}: {e}", d.owner_module)))?
            .ok_or_else(|| BindError::InvalidModule {
                module: d.owner_module.clone(),
                detail: "module exposes no code unit".into(),
            })?;

        // 2) type
        let ty = resolve_type(&unit, &d.target_type_name, d.lookup_flags).ok_or_else(|| {
            BindError::TypeNotFound {
                module: d.owner_module.clone(),
                type_name: d.target_type_name.clone(),
            }
        })?;

        // 3) method
        let method = resolve_method(&ty, &d.target_method_name, d.lookup_flags).ok_or_else(|| {
            BindError::MethodNotFound {
                type_name: ty.name.clone(),
                method_name: d.target_method_name.clone(),
            }
        })?;

        // 4) signature + declared capabilities
        if !method.flags.contains(d.capability_flags) {
            return Err(BindError::SignatureMismatch {
                method_name: method.name.clone(),
                detail: format!(
                    "method declares {:?}, descriptor requires {:?}",
                    method.flags, d.capability_flags
                ),
            });
        }
        let callable = bind_callable(&method, d.kind).ok_or_else(|| BindError::SignatureMismatch {
            method_name: method.name.clone(),
            detail: format!(
                "method is a {} callback, descriptor is a {}",
                method.callable.signature(),
                d.kind
            ),
        })?;

        Ok(BoundCallable {
            module: d.owner_module.clone(),
            callable,
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
