use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use vigil_core::error::Result;
use vigil_core::{Ballot, CapabilityFlags, ExtensionKind, LookupFlags, Signal, TraceEvent};

/// Opaque payload handed to a callable on every invocation.
pub type ClientData = Arc<dyn Any + Send + Sync>;

/// Command-policy callback. Votes through the ballot or abstains.
#[async_trait]
pub trait PolicyCallback: Send + Sync {
    async fn check(&self, ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()>;
}

/// Trace callback. Observes one breakpoint event.
#[async_trait]
pub trait TraceCallback: Send + Sync {
    async fn trace(&self, event: &TraceEvent, client_data: Option<&ClientData>) -> Result<Signal>;
}

/// Adapter turning a plain closure into a [`PolicyCallback`].
pub struct PolicyFn<F>(pub F);

#[async_trait]
impl<F> PolicyCallback for PolicyFn<F>
where
    F: Fn(&mut Ballot, Option<&ClientData>) -> Result<()> + Send + Sync,
{
    async fn check(&self, ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
        (self.0)(ballot, client_data)
    }
}

/// Adapter turning a plain closure into a [`TraceCallback`].
pub struct TraceFn<F>(pub F);

#[async_trait]
impl<F> TraceCallback for TraceFn<F>
where
    F: Fn(&TraceEvent, Option<&ClientData>) -> Result<Signal> + Send + Sync,
{
    async fn trace(&self, event: &TraceEvent, client_data: Option<&ClientData>) -> Result<Signal> {
        (self.0)(event, client_data)
    }
}

/// A callable published by a module, tagged with its signature.
#[derive(Clone)]
pub enum Callable {
    Policy(Arc<dyn PolicyCallback>),
    Trace(Arc<dyn TraceCallback>),
}

impl Callable {
    pub fn policy(cb: impl PolicyCallback + 'static) -> Self {
        Callable::Policy(Arc::new(cb))
    }

    pub fn trace(cb: impl TraceCallback + 'static) -> Self {
        Callable::Trace(Arc::new(cb))
    }

    /// Synchronous policy from a closure.
    pub fn policy_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Ballot, Option<&ClientData>) -> Result<()> + Send + Sync + 'static,
    {
        Callable::policy(PolicyFn(f))
    }

    /// Synchronous trace from a closure.
    pub fn trace_fn<F>(f: F) -> Self
    where
        F: Fn(&TraceEvent, Option<&ClientData>) -> Result<Signal> + Send + Sync + 'static,
    {
        Callable::trace(TraceFn(f))
    }

    /// Which extension kind this callable's signature fits.
    pub fn signature(&self) -> ExtensionKind {
        match self {
            Callable::Policy(_) => ExtensionKind::Policy,
            Callable::Trace(_) => ExtensionKind::Trace,
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callable::{}", self.signature())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    NonPublic,
}

impl Visibility {
    fn visible_under(self, flags: LookupFlags) -> bool {
        match self {
            Visibility::Public => flags.contains(LookupFlags::PUBLIC),
            Visibility::NonPublic => flags.contains(LookupFlags::NON_PUBLIC),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Static,
    Instance,
}

impl Binding {
    fn visible_under(self, flags: LookupFlags) -> bool {
        match self {
            Binding::Static => flags.contains(LookupFlags::STATIC),
            Binding::Instance => flags.contains(LookupFlags::INSTANCE),
        }
    }
}

/// One method published by a type.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub visibility: Visibility,
    pub binding: Binding,
    /// Capabilities the method is declared with.
    pub flags: CapabilityFlags,
    pub callable: Callable,
}

impl MethodEntry {
    /// Public static method.
    pub fn new(name: impl Into<String>, flags: CapabilityFlags, callable: Callable) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            binding: Binding::Static,
            flags,
            callable,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }
}

/// A named table of methods.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub name: String,
    pub visibility: Visibility,
    methods: HashMap<String, Arc<MethodEntry>>,
}

impl TypeEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            methods: HashMap::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn method(mut self, entry: MethodEntry) -> Self {
        self.methods.insert(entry.name.clone(), Arc::new(entry));
        self
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }
}

/// Everything a module publishes at load time.
#[derive(Debug, Clone, Default)]
pub struct CodeUnit {
    pub name: String,
    types: HashMap<String, Arc<TypeEntry>>,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: HashMap::new(),
        }
    }

    pub fn with_type(mut self, entry: TypeEntry) -> Self {
        self.types.insert(entry.name.clone(), Arc::new(entry));
        self
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }
}

/// Exact-name map hit first; a scan only when IGNORE_CASE asks for it.
///
/// Only entries passing `visible` are candidates, so a hidden exact hit never
/// shadows a visible case-folded one. Among several case-folded candidates
/// the lexically smallest published name wins.
fn lookup<'a, T>(
    map: &'a HashMap<String, Arc<T>>,
    name: &str,
    flags: LookupFlags,
    visible: impl Fn(&T) -> bool,
) -> Option<&'a Arc<T>> {
    if let Some(hit) = map.get(name).filter(|v| visible(v)) {
        return Some(hit);
    }
    if !flags.contains(LookupFlags::IGNORE_CASE) {
        return None;
    }
    map.iter()
        .filter(|(published, v)| flags.name_matches(published, name) && visible(v))
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(_, v)| v)
}

/// Look up a type by name under `flags`.
pub fn resolve_type(unit: &CodeUnit, type_name: &str, flags: LookupFlags) -> Option<Arc<TypeEntry>> {
    lookup(&unit.types, type_name, flags, |ty| ty.visibility.visible_under(flags)).cloned()
}

/// Look up a method on a resolved type under `flags`.
pub fn resolve_method(
    ty: &TypeEntry,
    method_name: &str,
    flags: LookupFlags,
) -> Option<Arc<MethodEntry>> {
    lookup(&ty.methods, method_name, flags, |m| {
        m.visibility.visible_under(flags) && m.binding.visible_under(flags)
    })
    .cloned()
}

/// Produce a callable of the requested signature, or `None` if the method
/// was published with the other one.
pub fn bind_callable(method: &MethodEntry, kind: ExtensionKind) -> Option<Callable> {
    (method.callable.signature() == kind).then(|| method.callable.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_policy() -> Callable {
        Callable::policy_fn(|_, _| Ok(()))
    }

    fn unit() -> CodeUnit {
        CodeUnit::new("test").with_type(
            TypeEntry::new("Policies")
                .method(MethodEntry::new("check", CapabilityFlags::COMMAND_POLICY, noop_policy()))
                .method(
                    MethodEntry::new("hidden", CapabilityFlags::COMMAND_POLICY, noop_policy())
                        .with_visibility(Visibility::NonPublic),
                )
                .method(
                    MethodEntry::new("instance", CapabilityFlags::COMMAND_POLICY, noop_policy())
                        .with_binding(Binding::Instance),
                ),
        )
    }

    #[test]
    fn non_public_needs_flag() {
        let u = unit();
        let ty = resolve_type(&u, "Policies", LookupFlags::STANDARD).unwrap();
        assert!(resolve_method(&ty, "hidden", LookupFlags::STANDARD).is_none());
        let wide = LookupFlags::STANDARD | LookupFlags::NON_PUBLIC;
        assert!(resolve_method(&ty, "hidden", wide).is_some());
    }

    #[test]
    fn instance_needs_flag() {
        let u = unit();
        let ty = resolve_type(&u, "Policies", LookupFlags::STANDARD).unwrap();
        let static_only = LookupFlags::PUBLIC | LookupFlags::STATIC;
        assert!(resolve_method(&ty, "instance", static_only).is_none());
        assert!(resolve_method(&ty, "instance", LookupFlags::STANDARD).is_some());
    }

    #[test]
    fn case_folding_is_opt_in() {
        let u = unit();
        assert!(resolve_type(&u, "policies", LookupFlags::STANDARD).is_none());
        let ty = resolve_type(&u, "policies", LookupFlags::STANDARD | LookupFlags::IGNORE_CASE);
        assert!(ty.is_some());
    }

    #[test]
    fn hidden_exact_hit_does_not_shadow_folded_match() {
        let ty = TypeEntry::new("Policies")
            .method(
                MethodEntry::new("check", CapabilityFlags::COMMAND_POLICY, noop_policy())
                    .with_visibility(Visibility::NonPublic),
            )
            .method(MethodEntry::new("Check", CapabilityFlags::COMMAND_POLICY, noop_policy()));

        assert!(resolve_method(&ty, "check", LookupFlags::STANDARD).is_none());
        let folded = LookupFlags::STANDARD | LookupFlags::IGNORE_CASE;
        assert_eq!(resolve_method(&ty, "check", folded).unwrap().name, "Check");
    }

    #[test]
    fn folded_lookup_picks_smallest_name() {
        let ty = TypeEntry::new("Policies")
            .method(MethodEntry::new("cHECK", CapabilityFlags::COMMAND_POLICY, noop_policy()))
            .method(MethodEntry::new("CHECK", CapabilityFlags::COMMAND_POLICY, noop_policy()))
            .method(MethodEntry::new("Check", CapabilityFlags::COMMAND_POLICY, noop_policy()));
        let folded = LookupFlags::STANDARD | LookupFlags::IGNORE_CASE;
        for _ in 0..8 {
            assert_eq!(resolve_method(&ty, "check", folded).unwrap().name, "CHECK");
        }
    }

    #[test]
    fn bind_checks_signature() {
        let u = unit();
        let ty = resolve_type(&u, "Policies", LookupFlags::STANDARD).unwrap();
        let m = resolve_method(&ty, "check", LookupFlags::STANDARD).unwrap();
        assert!(bind_callable(&m, ExtensionKind::Policy).is_some());
        assert!(bind_callable(&m, ExtensionKind::Trace).is_none());
    }
}
