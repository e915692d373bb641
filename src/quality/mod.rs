//! Quality tier selection.
//!
//! Picks the tier to fetch for a release from the tiers the catalog offers,
//! under the fallback policy:
//!
//! 1. the requested tier, when it is available;
//! 2. with fallback enabled, the best tier below the requested one, or
//!    failing that the lowest tier above it;
//! 3. otherwise [`Resolution::Skip`].
//!
//! Resolution is pure: it never looks at the ledger or the filesystem.

use std::collections::BTreeSet;

use crate::model::QualityTier;

/// Outcome of quality resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Fetch at this tier
    Use(QualityTier),
    /// Not available at an acceptable tier; exclude the release
    Skip,
}

impl Resolution {
    pub fn tier(&self) -> Option<QualityTier> {
        match self {
            Self::Use(tier) => Some(*tier),
            Self::Skip => None,
        }
    }
}

/// Choose the tier to fetch.
///
/// An empty `available` set resolves to [`Resolution::Skip`].
pub fn resolve(
    requested: QualityTier,
    available: &BTreeSet<QualityTier>,
    fallback_enabled: bool,
) -> Resolution {
    if available.contains(&requested) {
        return Resolution::Use(requested);
    }
    if !fallback_enabled {
        return Resolution::Skip;
    }

    let lower = available.range(..requested).next_back();
    let higher = available.range(requested..).next();
    match lower.or(higher) {
        Some(tier) => Resolution::Use(*tier),
        None => Resolution::Skip,
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn tier() -> impl Strategy<Value = QualityTier> {
        prop::sample::select(QualityTier::ALL.to_vec())
    }

    fn tier_set() -> impl Strategy<Value = BTreeSet<QualityTier>> {
        prop::collection::btree_set(tier(), 1..=4)
    }

    proptest! {
        /// With fallback, the result is always one of the offered tiers
        #[test]
        fn fallback_always_picks_available(requested in tier(), available in tier_set()) {
            match resolve(requested, &available, true) {
                Resolution::Use(t) => prop_assert!(available.contains(&t)),
                Resolution::Skip => prop_assert!(false, "non-empty set must resolve"),
            }
        }

        /// The requested tier wins whenever it is offered
        #[test]
        fn requested_is_exact_when_available(requested in tier(), mut available in tier_set()) {
            available.insert(requested);
            prop_assert_eq!(resolve(requested, &available, true), Resolution::Use(requested));
            prop_assert_eq!(resolve(requested, &available, false), Resolution::Use(requested));
        }

        /// A lower tier is preferred over any higher one
        #[test]
        fn degrade_before_promote(requested in tier(), available in tier_set()) {
            if let Resolution::Use(t) = resolve(requested, &available, true) {
                if t > requested {
                    prop_assert!(available.iter().all(|a| *a >= requested));
                }
            }
        }

        /// Resolution is deterministic
        #[test]
        fn resolve_is_deterministic(requested in tier(), available in tier_set(), fallback in any::<bool>()) {
            prop_assert_eq!(
                resolve(requested, &available, fallback),
                resolve(requested, &available, fallback)
            );
        }
    }
}
