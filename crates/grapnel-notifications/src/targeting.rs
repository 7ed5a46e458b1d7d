//! Severity-gated fan-out.
//!
//! The partner that already held the value always hears about a match.
//! High and critical matches are additionally broadcast to every partner
//! except the one that just reported it. The reporter is never a target.

use grapnel_core::{Severity, SourceSystem};

/// Partners to notify, without duplicates, in a stable order: the existing
/// holder first, then the remaining partners in [`SourceSystem::ALL`] order.
pub fn compute_targets(
    new_source: SourceSystem,
    existing_source: Option<SourceSystem>,
    severity: Severity,
) -> Vec<SourceSystem> {
    let mut targets = Vec::with_capacity(SourceSystem::ALL.len());

    if let Some(existing) = existing_source {
        if existing != new_source {
            targets.push(existing);
        }
    }

    if severity.is_broadcast() {
        for system in SourceSystem::ALL {
            if system != new_source && !targets.contains(&system) {
                targets.push(system);
            }
        }
    }

    targets
}
