//! Whitelist/blacklist permission sets.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};

/// How the target set is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Only listed targets are allowed.
    Whitelist,
    /// Everything except listed targets is allowed.
    Blacklist,
}

/// Immutable gate over item or block identifiers.
///
/// There are no setters: once built, the mode and targets never change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionSet {
    mode: PermissionMode,
    targets: BTreeSet<String>,
}

/// Everything allowed (`Blacklist(∅)`).
pub static ALLOW_ALL: PermissionSet = PermissionSet::empty(PermissionMode::Blacklist);

/// Nothing allowed (`Whitelist(∅)`).
pub static DENY_ALL: PermissionSet = PermissionSet::empty(PermissionMode::Whitelist);

impl PermissionSet {
    const fn empty(mode: PermissionMode) -> Self {
        Self { mode, targets: BTreeSet::new() }
    }

    /// Allow exactly the given targets.
    pub fn whitelist<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: PermissionMode::Whitelist,
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Allow everything except the given targets.
    pub fn blacklist<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: PermissionMode::Blacklist,
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Interpretation of the target set.
    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Number of listed targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no targets are listed.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Decide whether `target` passes the gate.
    #[inline]
    pub fn is_allowed(&self, target: &str) -> bool {
        let listed = self.targets.contains(target);
        match self.mode {
            PermissionMode::Whitelist => listed,
            PermissionMode::Blacklist => !listed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_constants() {
        assert!(ALLOW_ALL.is_allowed("bow"));
        assert!(ALLOW_ALL.is_allowed(""));
        assert!(!DENY_ALL.is_allowed("bow"));
        assert_eq!(ALLOW_ALL.mode(), PermissionMode::Blacklist);
        assert_eq!(DENY_ALL.mode(), PermissionMode::Whitelist);
        assert!(DENY_ALL.is_empty());
    }

    #[test]
    fn test_whitelist_lookup() {
        let set = PermissionSet::whitelist(["bow", "arrow"]);
        assert!(set.is_allowed("bow"));
        assert!(!set.is_allowed("trident"));
        assert_eq!(set.len(), 2);
    }

    proptest! {
        #[test]
        fn property_whitelist_is_membership(
            targets in proptest::collection::btree_set("[a-z_]{1,8}", 0..16),
            name in "[a-z_]{1,8}",
        ) {
            let set = PermissionSet::whitelist(targets.iter().cloned());
            prop_assert_eq!(set.is_allowed(&name), targets.contains(&name));
        }

        #[test]
        fn property_blacklist_is_complement(
            targets in proptest::collection::btree_set("[a-z_]{1,8}", 0..16),
            name in "[a-z_]{1,8}",
        ) {
            let set = PermissionSet::blacklist(targets.iter().cloned());
            prop_assert_eq!(set.is_allowed(&name), !targets.contains(&name));
        }

        #[test]
        fn property_constants_are_total(name in ".*") {
            prop_assert!(ALLOW_ALL.is_allowed(&name));
            prop_assert!(!DENY_ALL.is_allowed(&name));
        }
    }
}
