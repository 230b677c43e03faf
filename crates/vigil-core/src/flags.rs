//! Bit sets controlling how extensions are resolved and run.

use bitflags::bitflags;

bitflags! {
    /// Visibility and binding rules applied while resolving a target type
    /// and method by name.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LookupFlags: u32 {
        const PUBLIC = 0b0000_0001;
        const NON_PUBLIC = 0b0000_0010;
        const STATIC = 0b0000_0100;
        const INSTANCE = 0b0000_1000;
        /// ASCII case-insensitive name matching.
        const IGNORE_CASE = 0b0001_0000;
    }
}

impl LookupFlags {
    /// Public members, static or instance.
    pub const STANDARD: Self = Self::PUBLIC.union(Self::STATIC).union(Self::INSTANCE);

    /// Compare a published name against a requested one under these flags.
    pub fn name_matches(self, published: &str, requested: &str) -> bool {
        if self.contains(Self::IGNORE_CASE) {
            published.eq_ignore_ascii_case(requested)
        } else {
            published == requested
        }
    }
}

bitflags! {
    /// Capabilities a resolved method declares. A descriptor's required set
    /// must be contained in the method's declared set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CapabilityFlags: u32 {
        /// Declared as a command-policy callback.
        const COMMAND_POLICY = 0b0001;
        /// Declared as a trace callback.
        const TRACE = 0b0010;
        /// Shipped with the host rather than a third-party module.
        const SYSTEM = 0b0100;
    }
}

bitflags! {
    /// Runtime flags of a registered extension.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ExtensionFlags: u32 {
        /// Registered and bound, but skipped by the coordinator and dispatcher.
        const DISABLED = 0b0001;
    }
}
