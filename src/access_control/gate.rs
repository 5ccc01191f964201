//! Classification gate
//!
//! Step one of every access check. The gate stands in for the external
//! role/permission engine: it answers whether a principal may see objects
//! carrying a given classification at all, before compartments are looked at.

use crate::access_control::patterns::PatternMatcher;
use crate::access_control::types::Principal;
use crate::config::{ClearanceConfig, GateMode};
use crate::error::ConfigError;
use crate::taxonomy::{ClassificationId, ClassificationStore};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Seam to the role/permission engine
pub trait ClassificationGate: Send + Sync {
    /// Whether `principal` is cleared for `classification`
    fn classification_allowed(&self, principal: &Principal, classification: ClassificationId)
    -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Denies every classification. Used until a real gate is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailClosed;

impl ClassificationGate for FailClosed {
    fn classification_allowed(
        &self,
        _principal: &Principal,
        _classification: ClassificationId,
    ) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "deny"
    }
}

/// Treats classification as a descriptive label only
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ClassificationGate for AllowAll {
    fn classification_allowed(
        &self,
        _principal: &Principal,
        _classification: ClassificationId,
    ) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "allow"
    }
}

#[derive(Debug)]
struct RoleClearance {
    grants: BTreeSet<ClassificationId>,
    deny: PatternMatcher,
}

/// Role-derived clearances
///
/// A grant covers the granted classification and everything beneath it.
/// A deny pattern of any role the principal holds wins over every grant.
pub struct ClearancePolicy {
    taxonomy: Arc<ClassificationStore>,
    roles: HashMap<String, RoleClearance>,
}

impl ClearancePolicy {
    /// Compile the `[clearance.roles]` table
    pub fn new(
        config: &ClearanceConfig,
        taxonomy: Arc<ClassificationStore>,
    ) -> Result<Self, ConfigError> {
        let mut roles = HashMap::with_capacity(config.roles.len());
        for (name, role) in &config.roles {
            let deny = PatternMatcher::new(&role.deny)?;
            debug!(
                role = %name,
                grants = role.grant.len(),
                deny_patterns = deny.len(),
                "Compiled role clearance"
            );
            roles.insert(
                name.clone(),
                RoleClearance {
                    grants: role.grant.iter().copied().collect(),
                    deny,
                },
            );
        }
        Ok(Self { taxonomy, roles })
    }

    fn held<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> impl Iterator<Item = (&'a str, &'a RoleClearance)> {
        principal
            .roles
            .iter()
            .filter_map(|name| self.roles.get(name).map(|r| (name.as_str(), r)))
    }
}

impl ClassificationGate for ClearancePolicy {
    fn classification_allowed(
        &self,
        principal: &Principal,
        classification: ClassificationId,
    ) -> bool {
        let label = match self.taxonomy.resolve(classification) {
            Ok(label) => label,
            Err(e) => {
                warn!(
                    classification = %classification,
                    error = %e,
                    "Classification lookup failed, denying"
                );
                return false;
            }
        };

        for (role, clearance) in self.held(principal) {
            if clearance.deny.is_empty() {
                continue;
            }
            if let Some(pattern) = clearance.deny.find_classification_match(&label) {
                debug!(
                    principal = %principal.id,
                    role,
                    classification = %classification,
                    pattern,
                    "Classification denied by role pattern"
                );
                return false;
            }
        }

        let chain = match self.taxonomy.ancestors(classification) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(
                    classification = %classification,
                    error = %e,
                    "Ancestor walk failed, denying"
                );
                return false;
            }
        };

        let granted = self
            .held(principal)
            .any(|(_, clearance)| chain.iter().any(|c| clearance.grants.contains(c)));
        debug!(
            principal = %principal.id,
            classification = %classification,
            granted,
            "Clearance evaluated"
        );
        granted
    }

    fn name(&self) -> &'static str {
        "roles"
    }
}

/// Build the gate selected by `[clearance] mode`
pub fn gate_from_config(
    config: &ClearanceConfig,
    taxonomy: Arc<ClassificationStore>,
) -> Result<Arc<dyn ClassificationGate>, ConfigError> {
    let gate: Arc<dyn ClassificationGate> = match config.mode {
        GateMode::Deny => Arc::new(FailClosed),
        GateMode::Allow => Arc::new(AllowAll),
        GateMode::Roles => Arc::new(ClearancePolicy::new(config, taxonomy)?),
    };
    Ok(gate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleClearanceConfig;
    use crate::taxonomy::ClassificationDraft;

    /// Unclassified(1) -> Internal(2) -> Restricted(3); Exercise(4) is a separate root
    fn taxonomy() -> Arc<ClassificationStore> {
        let store = ClassificationStore::new();
        let unclassified = store
            .create(ClassificationDraft::new("Unclassified").abbreviation("U").default_label())
            .unwrap();
        let internal = store
            .create(ClassificationDraft::new("Internal").abbreviation("INT").under(unclassified.id))
            .unwrap();
        store
            .create(ClassificationDraft::new("Restricted").abbreviation("NF").under(internal.id))
            .unwrap();
        store
            .create(ClassificationDraft::new("Exercise").abbreviation("EX"))
            .unwrap();
        Arc::new(store)
    }

    fn roles_config(roles: &[(&str, &[u64], &[&str])]) -> ClearanceConfig {
        ClearanceConfig {
            mode: GateMode::Roles,
            roles: roles
                .iter()
                .map(|(name, grant, deny)| {
                    (
                        name.to_string(),
                        RoleClearanceConfig {
                            grant: grant.iter().copied().map(ClassificationId).collect(),
                            deny: deny.iter().map(|d| d.to_string()).collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_fixed_gates() {
        let p = Principal::new("alice");
        assert!(!FailClosed.classification_allowed(&p, ClassificationId(1)));
        assert!(AllowAll.classification_allowed(&p, ClassificationId(1)));
    }

    #[test]
    fn test_grant_covers_subtree() {
        let policy =
            ClearancePolicy::new(&roles_config(&[("analyst", &[2], &[])]), taxonomy()).unwrap();
        let p = Principal::new("alice").with_role("analyst");

        assert!(policy.classification_allowed(&p, ClassificationId(2)));
        assert!(policy.classification_allowed(&p, ClassificationId(3)));
        // Above the grant
        assert!(!policy.classification_allowed(&p, ClassificationId(1)));
        // Different tree
        assert!(!policy.classification_allowed(&p, ClassificationId(4)));
    }

    #[test]
    fn test_role_not_held_grants_nothing() {
        let policy =
            ClearancePolicy::new(&roles_config(&[("analyst", &[1], &[])]), taxonomy()).unwrap();
        let p = Principal::new("bob").with_role("visitor");
        assert!(!policy.classification_allowed(&p, ClassificationId(1)));
    }

    #[test]
    fn test_deny_pattern_beats_grant_from_other_role() {
        let config = roles_config(&[("analyst", &[1], &[]), ("contractor", &[], &["^NF$"])]);
        let policy = ClearancePolicy::new(&config, taxonomy()).unwrap();
        let p = Principal::new("carol").with_role("analyst").with_role("contractor");

        assert!(policy.classification_allowed(&p, ClassificationId(2)));
        assert!(!policy.classification_allowed(&p, ClassificationId(3)));
    }

    #[test]
    fn test_unknown_classification_fails_closed() {
        let policy =
            ClearancePolicy::new(&roles_config(&[("analyst", &[1], &[])]), taxonomy()).unwrap();
        let p = Principal::new("alice").with_role("analyst");
        assert!(!policy.classification_allowed(&p, ClassificationId(99)));
    }

    #[test]
    fn test_gate_from_config() {
        let taxonomy = taxonomy();
        let gate = gate_from_config(&ClearanceConfig::default(), Arc::clone(&taxonomy)).unwrap();
        assert_eq!(gate.name(), "deny");

        let gate = gate_from_config(&roles_config(&[("analyst", &[1], &[])]), taxonomy).unwrap();
        assert_eq!(gate.name(), "roles");
    }

    #[test]
    fn test_invalid_deny_pattern_rejected() {
        let result =
            ClearancePolicy::new(&roles_config(&[("analyst", &[1], &["[bad"])]), taxonomy());
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }
}
