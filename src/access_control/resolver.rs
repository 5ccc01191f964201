//! Release-control resolver
//!
//! Decides whether a principal may access a securable object:
//! 1. the classification gate must clear the effective classification
//! 2. every `eyes_only` group must be in the principal's closure (AND)
//! 3. a non-empty `releasable_to` must share a group with the closure (OR)
//!
//! Checks run in that order and the first failure is the recorded reason.
//! The resolver never mutates directory, taxonomy or object state.

use crate::access_control::context::AccessContext;
use crate::access_control::gate::ClassificationGate;
use crate::access_control::types::{Decision, DenyReason, Principal};
use crate::directory::{ClosureCache, GroupDirectory, GroupId, PrincipalId};
use crate::error::ControlResult;
use crate::securable::{EffectiveAttributes, Securable, resolve_effective};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Pure decision over a closure and resolved attributes
pub fn evaluate(
    closure: &BTreeSet<GroupId>,
    effective: &EffectiveAttributes,
    classification_allowed: bool,
) -> Decision {
    if !classification_allowed {
        return Decision::Deny(DenyReason::Classification {
            classification: effective.classification_id,
        });
    }

    let missing: BTreeSet<GroupId> = effective.eyes_only.difference(closure).copied().collect();
    if !missing.is_empty() {
        return Decision::Deny(DenyReason::EyesOnly { missing });
    }

    if !effective.releasable_to.is_empty() && effective.releasable_to.is_disjoint(closure) {
        return Decision::Deny(DenyReason::ReleasableTo {
            releasable_to: effective.releasable_to.clone(),
        });
    }

    Decision::Allow
}

/// Access resolver bound to a directory and a classification gate
pub struct ReleaseResolver {
    directory: Arc<GroupDirectory>,
    gate: Arc<dyn ClassificationGate>,
    cache: Option<ClosureCache>,
}

impl ReleaseResolver {
    pub fn new(directory: Arc<GroupDirectory>, gate: Arc<dyn ClassificationGate>) -> Self {
        Self {
            directory,
            gate,
            cache: None,
        }
    }

    /// Keep principal closures across requests until the directory changes
    pub fn with_closure_cache(mut self) -> Self {
        self.cache = Some(ClosureCache::new(Arc::clone(&self.directory)));
        self
    }

    pub fn gate_name(&self) -> &'static str {
        self.gate.name()
    }

    /// Group closure of a principal, through the cache when enabled
    pub fn closure(&self, principal: &PrincipalId) -> ControlResult<Arc<BTreeSet<GroupId>>> {
        match &self.cache {
            Some(cache) => cache.closure(principal),
            None => Ok(Arc::new(self.directory.closure(principal)?)),
        }
    }

    fn context_closure(&self, ctx: &AccessContext) -> ControlResult<Arc<BTreeSet<GroupId>>> {
        let generation = self.directory.generation();
        if let Some(groups) = ctx.memoized(generation)? {
            trace!(request_id = %ctx.request_id(), "Closure memo hit");
            return Ok(groups);
        }

        let groups = match ctx.direct_groups() {
            Some(direct) => Arc::new(self.directory.closure_of(direct.iter().copied())?),
            None => self.closure(&ctx.principal().id)?,
        };
        ctx.memoize(generation, Arc::clone(&groups))?;
        Ok(groups)
    }

    /// Check one object in a fresh context
    pub fn check_access(
        &self,
        principal: &Principal,
        object: &dyn Securable,
        parent: Option<&dyn Securable>,
    ) -> ControlResult<Decision> {
        let ctx = AccessContext::new(principal.clone());
        self.check_with_context(&ctx, object, parent)
    }

    /// Check one object, reusing the context's memoized closure.
    ///
    /// `parent` is the document a file inherits from. Any error is a fault,
    /// not a decision; callers must treat it as a deny.
    pub fn check_with_context(
        &self,
        ctx: &AccessContext,
        object: &dyn Securable,
        parent: Option<&dyn Securable>,
    ) -> ControlResult<Decision> {
        let result = resolve_effective(object, parent).and_then(|effective| {
            let closure = self.context_closure(ctx)?;
            let allowed = self
                .gate
                .classification_allowed(ctx.principal(), effective.classification_id);
            Ok(evaluate(&closure, &effective, allowed))
        });

        match &result {
            Ok(Decision::Allow) => {
                debug!(
                    request_id = %ctx.request_id(),
                    principal = %ctx.principal().id,
                    object = %object.label(),
                    "Access allowed"
                );
            }
            Ok(Decision::Deny(reason)) => {
                info!(
                    target: "audit",
                    request_id = %ctx.request_id(),
                    principal = %ctx.principal().id,
                    object = %object.label(),
                    dimension = %reason.dimension(),
                    reason = %reason,
                    gate = self.gate.name(),
                    "Access denied"
                );
            }
            Err(e) => {
                error!(
                    target: "audit",
                    request_id = %ctx.request_id(),
                    principal = %ctx.principal().id,
                    object = %object.label(),
                    error = %e,
                    "Access check failed, denying"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::gate::{AllowAll, FailClosed};
    use crate::access_control::types::Dimension;
    use crate::directory::GroupDraft;
    use crate::securable::{Document, ObjectId, SecurityAttributes};
    use crate::taxonomy::ClassificationId;

    fn effective(eyes_only: &[u64], releasable_to: &[u64]) -> EffectiveAttributes {
        EffectiveAttributes {
            classification_id: ClassificationId(1),
            eyes_only: eyes_only.iter().copied().map(GroupId).collect(),
            releasable_to: releasable_to.iter().copied().map(GroupId).collect(),
        }
    }

    fn closure(groups: &[u64]) -> BTreeSet<GroupId> {
        groups.iter().copied().map(GroupId).collect()
    }

    #[test]
    fn test_evaluate_vacuous() {
        assert_eq!(evaluate(&closure(&[]), &effective(&[], &[]), true), Decision::Allow);
    }

    #[test]
    fn test_evaluate_classification_checked_first() {
        let decision = evaluate(&closure(&[]), &effective(&[1], &[2]), false);
        assert_eq!(decision.denied_on(), Some(Dimension::Classification));
    }

    #[test]
    fn test_evaluate_reports_missing_groups() {
        let decision = evaluate(&closure(&[1]), &effective(&[1, 2, 3], &[]), true);
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::EyesOnly {
                missing: closure(&[2, 3])
            })
        );
    }

    #[test]
    fn test_evaluate_eyes_only_before_releasable_to() {
        let decision = evaluate(&closure(&[]), &effective(&[1], &[2]), true);
        assert_eq!(decision.denied_on(), Some(Dimension::EyesOnly));
    }

    fn directory_with_member() -> (Arc<GroupDirectory>, GroupId) {
        let directory = Arc::new(GroupDirectory::new());
        let staff = directory.create(GroupDraft::new("All-Staff")).unwrap();
        let analysts = directory
            .create(GroupDraft::new("Analysts").under(staff.id))
            .unwrap();
        directory
            .assign(analysts.id, &PrincipalId::from("alice"))
            .unwrap();
        (directory, staff.id)
    }

    fn document(eyes_only: GroupId) -> Document {
        Document {
            id: ObjectId(1),
            title: "Brief".into(),
            attributes: SecurityAttributes::classified(ClassificationId(1)).eyes_only([eyes_only]),
            thumbnail: None,
        }
    }

    #[test]
    fn test_check_access_uses_ancestor_closure() {
        let (directory, staff) = directory_with_member();
        let resolver = ReleaseResolver::new(directory, Arc::new(AllowAll));

        let decision = resolver
            .check_access(&Principal::new("alice"), &document(staff), None)
            .unwrap();
        assert!(decision.is_allowed());

        let decision = resolver
            .check_access(&Principal::new("mallory"), &document(staff), None)
            .unwrap();
        assert_eq!(decision.denied_on(), Some(Dimension::EyesOnly));
    }

    #[test]
    fn test_fail_closed_gate_denies() {
        let (directory, staff) = directory_with_member();
        let resolver = ReleaseResolver::new(directory, Arc::new(FailClosed));
        let decision = resolver
            .check_access(&Principal::new("alice"), &document(staff), None)
            .unwrap();
        assert_eq!(decision.denied_on(), Some(Dimension::Classification));
    }

    #[test]
    fn test_context_memo_refreshed_after_membership_change() {
        let (directory, staff) = directory_with_member();
        let resolver =
            ReleaseResolver::new(Arc::clone(&directory), Arc::new(AllowAll)).with_closure_cache();
        let ctx = AccessContext::new(Principal::new("bob"));

        let before = resolver.check_with_context(&ctx, &document(staff), None).unwrap();
        assert!(before.is_denied());

        directory.assign(staff, &PrincipalId::from("bob")).unwrap();
        let after = resolver.check_with_context(&ctx, &document(staff), None).unwrap();
        assert!(after.is_allowed());
    }

    #[test]
    fn test_supplied_memberships_skip_directory_lookup() {
        let (directory, staff) = directory_with_member();
        let resolver = ReleaseResolver::new(directory, Arc::new(AllowAll));
        // "carol" has no stored membership; the identity layer vouches for All-Staff
        let ctx = AccessContext::with_memberships(Principal::new("carol"), [staff]);
        let decision = resolver.check_with_context(&ctx, &document(staff), None).unwrap();
        assert!(decision.is_allowed());
    }
}
