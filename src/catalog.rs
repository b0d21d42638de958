//! Expansion of a plugin's declared targets into the ordered scenario matrix.

use crate::check::{Check, Scenario, ScenarioContext};
use crate::unit::{CrossTargetPolicy, TargetKind};
use serde::Serialize;
use std::sync::Arc;

/// One cell of the matrix: a check bound to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub check: Check,
    pub target: TargetKind,
}

impl MatrixEntry {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.check.category(), self.target)
    }
}

/// Targets a plugin claims to support, after defaulting and deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredTargets {
    targets: Vec<TargetKind>,
    explicit: bool,
}

impl DeclaredTargets {
    /// Keeps first-declaration order. An empty declaration means the baseline
    /// target only.
    pub fn new(declared: &[TargetKind]) -> Self {
        let mut targets = Vec::with_capacity(declared.len());
        for target in declared {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
        let explicit = !targets.is_empty();
        if !explicit {
            targets.push(TargetKind::BASELINE);
        }
        Self { targets, explicit }
    }

    pub fn targets(&self) -> &[TargetKind] {
        &self.targets
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Targets outside the declared set, in natural order.
    pub fn unsupported(&self) -> impl Iterator<Item = TargetKind> + '_ {
        TargetKind::ALL
            .into_iter()
            .filter(|target| !self.targets.contains(target))
    }
}

/// Computes the matrix for `declared` under `policy`.
///
/// Supported targets come first, in declaration order, each with its checks in
/// [`Check::SUPPORTED_TARGET`] order. Cross-target entries follow for every
/// unsupported target when the policy asks for them. The result depends only
/// on its inputs.
pub fn matrix(declared: &DeclaredTargets, policy: CrossTargetPolicy) -> Vec<MatrixEntry> {
    let mut entries = Vec::new();
    for &target in declared.targets() {
        entries.extend(
            Check::SUPPORTED_TARGET
                .into_iter()
                .filter(|check| check.applies_to(target))
                .map(|check| MatrixEntry { check, target }),
        );
    }

    if policy.requires_checks(declared.is_explicit()) {
        entries.extend(declared.unsupported().map(|target| MatrixEntry {
            check: Check::SensibleErrorOnUnsupportedTarget,
            target,
        }));
    }
    entries
}

/// Builds one runnable scenario per matrix entry, all sharing `context`.
pub fn expand(
    context: &Arc<ScenarioContext>,
    declared: &DeclaredTargets,
    policy: CrossTargetPolicy,
) -> Vec<Scenario> {
    matrix(declared, policy)
        .into_iter()
        .map(|entry| Scenario::new(entry.check, entry.target, Arc::clone(context)))
        .collect()
}
