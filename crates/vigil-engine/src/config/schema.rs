use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use vigil_core::error::{Result, VigilError};
use vigil_core::{BreakpointKind, CapabilityFlags, ExtensionKind, LookupFlags};

use crate::extension::ExtensionDescriptor;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VigilError::UnsupportedVersion);
        }

        self.engine.validate()?;

        let mut names = HashSet::new();
        for ext in &self.extensions {
            ext.validate()?;
            if !names.insert(ext.name.as_str()) {
                return Err(VigilError::BadRequest(format!(
                    "duplicate extension name: {}",
                    ext.name
                )));
            }
        }

        Ok(())
    }
}

/// What `DefaultApplied` resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDecision {
    Allow,
    Deny,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default = "default_decision")]
    pub default_decision: DefaultDecision,

    /// Per-invocation budget; unset means unbounded.
    #[serde(default)]
    pub invoke_timeout_ms: Option<u64>,

    #[serde(default)]
    pub fail_fast_on_bind_error: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            default_decision: default_decision(),
            invoke_timeout_ms: None,
            fail_fast_on_bind_error: false,
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(ms) = self.invoke_timeout_ms {
            if !(1..=60000).contains(&ms) {
                return Err(VigilError::BadRequest(
                    "engine.invoke_timeout_ms must be between 1 and 60000".into(),
                ));
            }
        }
        Ok(())
    }
}

fn default_decision() -> DefaultDecision {
    DefaultDecision::Deny
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFlag {
    Public,
    NonPublic,
    Static,
    Instance,
    IgnoreCase,
}

impl LookupFlag {
    fn bits(self) -> LookupFlags {
        match self {
            LookupFlag::Public => LookupFlags::PUBLIC,
            LookupFlag::NonPublic => LookupFlags::NON_PUBLIC,
            LookupFlag::Static => LookupFlags::STATIC,
            LookupFlag::Instance => LookupFlags::INSTANCE,
            LookupFlag::IgnoreCase => LookupFlags::IGNORE_CASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CommandPolicy,
    Trace,
    System,
}

impl Capability {
    fn bits(self) -> CapabilityFlags {
        match self {
            Capability::CommandPolicy => CapabilityFlags::COMMAND_POLICY,
            Capability::Trace => CapabilityFlags::TRACE,
            Capability::System => CapabilityFlags::SYSTEM,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    pub name: String,
    pub kind: ExtensionKind,
    pub module: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub method: String,

    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: String,

    /// Unset means public static or instance.
    #[serde(default)]
    pub lookup: Option<Vec<LookupFlag>>,
    /// Unset means the default for `kind`.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,

    #[serde(default)]
    pub breakpoints: Vec<BreakpointKind>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub client_data: Option<serde_json::Value>,
}

impl ExtensionConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("module", &self.module),
            ("type", &self.type_name),
            ("method", &self.method),
        ] {
            if value.trim().is_empty() {
                return Err(VigilError::BadRequest(format!(
                    "extensions[{}].{field} must not be empty",
                    self.name
                )));
            }
        }

        if self.capabilities.as_ref().is_some_and(Vec::is_empty) {
            return Err(VigilError::BadRequest(format!(
                "extensions[{}].capabilities must not be empty; omit it for the default",
                self.name
            )));
        }

        match self.kind {
            ExtensionKind::Trace if self.breakpoints.is_empty() => {
                Err(VigilError::BadRequest(format!(
                    "trace {} must subscribe to at least one breakpoint",
                    self.name
                )))
            }
            ExtensionKind::Policy if !self.breakpoints.is_empty() => {
                Err(VigilError::BadRequest(format!(
                    "policy {} must not list breakpoints",
                    self.name
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build the descriptor this entry registers.
    pub fn to_descriptor(&self) -> ExtensionDescriptor {
        let base = match self.kind {
            ExtensionKind::Policy => ExtensionDescriptor::policy(
                self.name.as_str(),
                self.module.as_str(),
                self.type_name.as_str(),
                self.method.as_str(),
            ),
            ExtensionKind::Trace => ExtensionDescriptor::trace(
                self.name.as_str(),
                self.module.as_str(),
                self.type_name.as_str(),
                self.method.as_str(),
            ),
        };

        let mut d = base
            .with_description(self.description.as_str())
            .in_group(self.group.as_str())
            .on_breakpoints(self.breakpoints.iter().copied());

        if let Some(lookup) = &self.lookup {
            d = d.with_lookup(
                lookup
                    .iter()
                    .fold(LookupFlags::empty(), |acc, f| acc | f.bits()),
            );
        }
        if let Some(caps) = &self.capabilities {
            d = d.requiring(
                caps.iter()
                    .fold(CapabilityFlags::empty(), |acc, c| acc | c.bits()),
            );
        }
        if let Some(data) = &self.client_data {
            d = d.with_client_data(Arc::new(data.clone()));
        }
        if self.disabled {
            d = d.disabled();
        }
        d
    }
}
