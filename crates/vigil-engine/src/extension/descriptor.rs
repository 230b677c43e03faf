use std::collections::HashSet;
use std::fmt;

use vigil_core::{
    BreakpointKind, CapabilityFlags, ExtensionFlags, ExtensionId, ExtensionKind, LookupFlags,
    ModuleId,
};

use crate::module::ClientData;

/// Registration record for one policy or trace.
///
/// Immutable once registered; the binding produced by Setup lives next to it
/// in the extension registry.
#[derive(Clone)]
pub struct ExtensionDescriptor {
    pub identity: ExtensionId,
    pub kind: ExtensionKind,
    pub name: String,
    pub description: String,
    pub group: String,
    pub target_type_name: String,
    pub target_method_name: String,
    pub lookup_flags: LookupFlags,
    /// Capabilities the resolved method must declare.
    pub capability_flags: CapabilityFlags,
    pub flags: ExtensionFlags,
    /// Breakpoint kinds a trace subscribes to. Unused for policies.
    pub breakpoints: HashSet<BreakpointKind>,
    pub owner_module: ModuleId,
    pub client_data: Option<ClientData>,
}

impl ExtensionDescriptor {
    fn new(
        kind: ExtensionKind,
        name: impl Into<String>,
        owner_module: impl Into<ModuleId>,
        target_type_name: impl Into<String>,
        target_method_name: impl Into<String>,
    ) -> Self {
        let capability_flags = match kind {
            ExtensionKind::Policy => CapabilityFlags::COMMAND_POLICY,
            ExtensionKind::Trace => CapabilityFlags::TRACE,
        };
        Self {
            identity: ExtensionId::new(),
            kind,
            name: name.into(),
            description: String::new(),
            group: String::new(),
            target_type_name: target_type_name.into(),
            target_method_name: target_method_name.into(),
            lookup_flags: LookupFlags::STANDARD,
            capability_flags,
            flags: ExtensionFlags::empty(),
            breakpoints: HashSet::new(),
            owner_module: owner_module.into(),
            client_data: None,
        }
    }

    pub fn policy(
        name: impl Into<String>,
        owner_module: impl Into<ModuleId>,
        target_type_name: impl Into<String>,
        target_method_name: impl Into<String>,
    ) -> Self {
        Self::new(
            ExtensionKind::Policy,
            name,
            owner_module,
            target_type_name,
            target_method_name,
        )
    }

    pub fn trace(
        name: impl Into<String>,
        owner_module: impl Into<ModuleId>,
        target_type_name: impl Into<String>,
        target_method_name: impl Into<String>,
    ) -> Self {
        Self::new(
            ExtensionKind::Trace,
            name,
            owner_module,
            target_type_name,
            target_method_name,
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_lookup(mut self, flags: LookupFlags) -> Self {
        self.lookup_flags = flags;
        self
    }

    pub fn requiring(mut self, flags: CapabilityFlags) -> Self {
        self.capability_flags = flags;
        self
    }

    pub fn on(mut self, kind: BreakpointKind) -> Self {
        self.breakpoints.insert(kind);
        self
    }

    pub fn on_breakpoints(mut self, kinds: impl IntoIterator<Item = BreakpointKind>) -> Self {
        self.breakpoints.extend(kinds);
        self
    }

    pub fn with_client_data(mut self, data: ClientData) -> Self {
        self.client_data = Some(data);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.flags |= ExtensionFlags::DISABLED;
        self
    }

    /// Whether this trace subscribes to `kind`.
    pub fn listens_to(&self, kind: BreakpointKind) -> bool {
        self.kind == ExtensionKind::Trace && self.breakpoints.contains(&kind)
    }
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("group", &self.group)
            .field("owner_module", &self.owner_module)
            .field("target", &format_args!("{}.{}", self.target_type_name, self.target_method_name))
            .field("lookup_flags", &self.lookup_flags)
            .field("capability_flags", &self.capability_flags)
            .field("flags", &self.flags)
            .field("breakpoints", &self.breakpoints)
            .field("client_data", &self.client_data.is_some())
            .finish()
    }
}
