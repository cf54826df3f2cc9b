use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Host capabilities a document hints it would like available.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CapabilityHints: u32 {
        const VR = 1 << 0;
        const PHYSICS = 1 << 1;
        const AUDIO = 1 << 2;
        const NETWORKING = 1 << 3;
        const HTML = 1 << 4;
        const VEHICLES = 1 << 5;
    }
}

impl Default for CapabilityHints {
    fn default() -> Self {
        CapabilityHints::empty()
    }
}

impl CapabilityHints {
    /// Parses hint names case-insensitively; returns the flag set and the names
    /// that matched no known capability.
    pub fn from_names<'a, I>(names: I) -> (Self, Vec<&'a str>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hints = CapabilityHints::empty();
        let mut unknown = Vec::new();
        for name in names {
            match CapabilityHints::from_name(&name.trim().to_ascii_uppercase()) {
                Some(flag) => hints |= flag,
                None => unknown.push(name),
            }
        }
        (hints, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        let (hints, unknown) = CapabilityHints::from_names(["vr", "Physics", "teleport"]);
        assert!(hints.contains(CapabilityHints::VR | CapabilityHints::PHYSICS));
        assert!(!hints.contains(CapabilityHints::AUDIO));
        assert_eq!(unknown, vec!["teleport"]);
    }
}
