//! Engine facade.
//!
//! Owns the module registry, the extension registry and the two consumers
//! (policy coordinator, trace dispatcher), and is the only place that ties
//! registration, binding and metrics together.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::error::{Result, VigilError};
use vigil_core::{
    BindError, BreakpointKind, ExtensionId, ExtensionKind, ModuleId, Signal, TraceEvent, Verdict,
};

use crate::config::{DefaultDecision, EngineConfig, EngineSection};
use crate::extension::{Binder, Extension, ExtensionDescriptor, ExtensionRegistry, Invoker};
use crate::module::{ExtensionModule, ModuleRegistry};
use crate::obs::EngineMetrics;
use crate::policy::{CheckReport, PolicyCoordinator};
use crate::trace::{TraceDispatcher, TraceReport};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// How `DefaultApplied` resolves in `authorize`.
    pub default_allow: bool,
    pub invoke_timeout: Option<Duration>,
    /// Abort `from_config` on the first bind failure.
    pub fail_fast_on_bind_error: bool,
}

impl From<&EngineSection> for EngineSettings {
    fn from(s: &EngineSection) -> Self {
        Self {
            default_allow: s.default_decision == DefaultDecision::Allow,
            invoke_timeout: s.invoke_timeout_ms.map(Duration::from_millis),
            fail_fast_on_bind_error: s.fail_fast_on_bind_error,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    settings: EngineSettings,
    modules: ModuleRegistry,
    extensions: Arc<ExtensionRegistry>,
    policies: PolicyCoordinator,
    traces: TraceDispatcher,
    metrics: Arc<EngineMetrics>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        let extensions = Arc::new(ExtensionRegistry::new());
        let metrics = Arc::new(EngineMetrics::default());
        let invoker = match settings.invoke_timeout {
            Some(limit) => Invoker::with_timeout(limit),
            None => Invoker::new(),
        };

        let policies =
            PolicyCoordinator::new(Arc::clone(&extensions), invoker.clone(), Arc::clone(&metrics));
        let traces = TraceDispatcher::new(Arc::clone(&extensions), invoker, Arc::clone(&metrics));

        Self {
            inner: Arc::new(EngineInner {
                settings,
                modules: ModuleRegistry::new(),
                extensions,
                policies,
                traces,
                metrics,
            }),
        }
    }

    /// Build an engine from a validated config.
    ///
    /// `modules` are loaded first, then every configured extension is
    /// registered in file order. A bind failure is logged and the extension
    /// stays registered but unbound, unless the config asks to fail fast.
    pub fn from_config(
        cfg: &EngineConfig,
        modules: impl IntoIterator<Item = Arc<dyn ExtensionModule>>,
    ) -> Result<Self> {
        cfg.validate()?;
        let engine = Self::new(EngineSettings::from(&cfg.engine));

        for module in modules {
            engine.load_module(module)?;
        }

        for ext in &cfg.extensions {
            match engine.register_extension(ext.to_descriptor()) {
                Ok(_) => {}
                Err(e @ VigilError::Bind { .. }) => {
                    if engine.inner.settings.fail_fast_on_bind_error {
                        return Err(e);
                    }
                    tracing::warn!(name = %ext.name, error = %e, "extension registered unbound");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            policies = engine.inner.extensions.count(ExtensionKind::Policy),
            traces = engine.inner.extensions.count(ExtensionKind::Trace),
            "engine configured"
        );
        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn extensions(&self) -> Arc<ExtensionRegistry> {
        Arc::clone(&self.inner.extensions)
    }

    pub fn extension(&self, id: ExtensionId) -> Option<Arc<Extension>> {
        self.inner.extensions.get(id)
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.inner.modules
    }

    pub fn load_module(&self, module: Arc<dyn ExtensionModule>) -> Result<ModuleId> {
        let id = self.inner.modules.load(module)?;
        tracing::info!(module = %id, "module loaded");
        Ok(id)
    }

    /// Unload a module and drop every extension it owns.
    ///
    /// Owned extensions are unregistered and their bindings invalidated
    /// before this returns. Returns how many were removed.
    pub fn unload_module(&self, id: &ModuleId) -> Result<usize> {
        if self.inner.modules.unload(id).is_none() {
            return Err(VigilError::UnknownModule(id.clone()));
        }
        let removed = self.inner.extensions.remove_module(id);
        for ext in &removed {
            self.inner
                .metrics
                .extensions_registered
                .dec(&[("kind", ext.kind().as_str())]);
        }
        tracing::info!(module = %id, extensions = removed.len(), "module unloaded");
        Ok(removed.len())
    }

    /// Register a descriptor, then bind it.
    ///
    /// A bind failure leaves the extension registered but unbound and is
    /// returned as `VigilError::Bind` carrying its id, so it can be
    /// rebound later.
    pub fn register_extension(&self, descriptor: ExtensionDescriptor) -> Result<ExtensionId> {
        let ext = self.inner.extensions.register(descriptor)?;
        let id = ext.id();
        self.inner
            .metrics
            .extensions_registered
            .inc(&[("kind", ext.kind().as_str())]);
        tracing::debug!(extension = %id, name = %ext.name(), kind = %ext.kind(), "extension registered");

        self.setup(&ext)
            .map_err(|source| VigilError::Bind { extension: id, source })?;
        Ok(id)
    }

    pub fn unregister_extension(&self, id: ExtensionId) -> Result<()> {
        let ext = self.inner.extensions.unregister(id)?;
        self.inner
            .metrics
            .extensions_registered
            .dec(&[("kind", ext.kind().as_str())]);
        tracing::debug!(extension = %id, name = %ext.name(), "extension unregistered");
        Ok(())
    }

    /// Run Setup again, e.g. after the owning module was reloaded.
    pub fn rebind(&self, id: ExtensionId) -> std::result::Result<(), BindError> {
        let ext = self
            .inner
            .extensions
            .get(id)
            .ok_or_else(|| BindError::Internal(format!("unknown extension {id}")))?;
        self.setup(&ext)
    }

    pub fn set_enabled(&self, id: ExtensionId, enabled: bool) -> Result<()> {
        let ext = self
            .inner
            .extensions
            .get(id)
            .ok_or(VigilError::UnknownExtension(id))?;
        ext.set_enabled(enabled);
        Ok(())
    }

    fn setup(&self, ext: &Extension) -> std::result::Result<(), BindError> {
        let binder = Binder::new(&self.inner.modules);
        ext.setup(&binder).map_err(|e| {
            self.inner
                .metrics
                .bind_failures
                .inc(&[("stage", e.stage())]);
            tracing::warn!(
                extension = %ext.id(),
                name = %ext.name(),
                stage = e.stage(),
                error = %e,
                "setup failed"
            );
            e
        })
    }

    pub async fn check_operation(&self, operation: &str, args: &[String]) -> Verdict {
        self.inner.policies.check_operation(operation, args).await
    }

    pub async fn check_detailed(&self, operation: &str, args: &[String]) -> CheckReport {
        self.inner.policies.check_detailed(operation, args).await
    }

    /// Check and turn the verdict into a go/no-go for the host.
    pub async fn authorize(&self, operation: &str, args: &[String]) -> Result<()> {
        let report = self.check_detailed(operation, args).await;
        match report.verdict {
            Verdict::Allowed => Ok(()),
            Verdict::Denied => Err(VigilError::Denied(report.denial_message())),
            Verdict::DefaultApplied if self.inner.settings.default_allow => Ok(()),
            Verdict::DefaultApplied => Err(VigilError::Denied(format!(
                "{operation}: no policy approved"
            ))),
        }
    }

    pub async fn notify(&self, kind: BreakpointKind, data: serde_json::Value) -> Signal {
        self.inner.traces.notify(kind, data).await
    }

    pub async fn notify_detailed(&self, event: &TraceEvent) -> TraceReport {
        self.inner.traces.notify_detailed(event).await
    }

    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render()
    }
}
