//! Release-control facade
//!
//! Ties the taxonomy, directory and object store together and owns the
//! invariants that span them: foreign-key checks on object restrictions,
//! creation defaults, and in-use protection on deletes.
//!
//! Reads go straight to the per-store read locks and never wait on each
//! other. Administrative writes are additionally serialized on one mutex so
//! an in-use check cannot race an object write that adds a reference.

use crate::access_control::{
    AccessContext, ClassificationGate, Decision, Principal, ReleaseResolver, gate_from_config,
};
use crate::config::AppConfig;
use crate::directory::{Group, GroupDirectory, GroupDraft, GroupId, GroupPatch, PrincipalId};
use crate::error::{
    AccessDeniedError, AppError, ControlError, ControlResult, EntityKind, StoreError,
};
use crate::securable::{
    Document, EffectiveAttributes, File, ObjectId, ObjectKind, ObjectStore, Overrides, Securable,
    SecurityAttributes, StoredObject, TopLevelObject,
};
use crate::service::types::Restrictions;
use crate::snapshot::Snapshot;
use crate::taxonomy::{
    Classification, ClassificationDraft, ClassificationId, ClassificationPatch,
    ClassificationStore,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// The release-control subsystem
pub struct ReleaseControl {
    taxonomy: Arc<ClassificationStore>,
    directory: Arc<GroupDirectory>,
    objects: Arc<ObjectStore>,
    resolver: ReleaseResolver,
    admin: Mutex<()>,
}

impl ReleaseControl {
    /// Empty model gated by `gate`
    pub fn new(gate: Arc<dyn ClassificationGate>) -> Self {
        let directory = Arc::new(GroupDirectory::new());
        Self {
            taxonomy: Arc::new(ClassificationStore::new()),
            resolver: ReleaseResolver::new(Arc::clone(&directory), gate),
            directory,
            objects: Arc::new(ObjectStore::new()),
            admin: Mutex::new(()),
        }
    }

    /// Rebuild the model from persisted records, validating every invariant
    pub fn from_snapshot(
        snapshot: Snapshot,
        gate: Arc<dyn ClassificationGate>,
    ) -> ControlResult<Self> {
        let (taxonomy, directory, objects) = build_stores(snapshot)?;
        let resolver = ReleaseResolver::new(Arc::clone(&directory), gate);
        Self::assemble(taxonomy, directory, objects, resolver)
    }

    /// Rebuild the model with the gate and caching selected by configuration
    pub fn open(config: &AppConfig, snapshot: Snapshot) -> Result<Self, AppError> {
        let (taxonomy, directory, objects) = build_stores(snapshot)?;
        let gate = gate_from_config(&config.clearance, Arc::clone(&taxonomy))?;
        let mut resolver = ReleaseResolver::new(Arc::clone(&directory), gate);
        if config.cache.closure {
            resolver = resolver.with_closure_cache();
        }
        info!(
            gate = resolver.gate_name(),
            closure_cache = config.cache.closure,
            "Release control ready"
        );
        Ok(Self::assemble(taxonomy, directory, objects, resolver)?)
    }

    fn assemble(
        taxonomy: Arc<ClassificationStore>,
        directory: Arc<GroupDirectory>,
        objects: Arc<ObjectStore>,
        resolver: ReleaseResolver,
    ) -> ControlResult<Self> {
        let control = Self {
            taxonomy,
            directory,
            objects,
            resolver,
            admin: Mutex::new(()),
        };
        for object in control.objects.list()? {
            control.validate_record(&object)?;
        }
        Ok(control)
    }

    /// Export every record
    pub fn snapshot(&self) -> ControlResult<Snapshot> {
        let _admin = self.admin()?;
        let (documents, files, objects) = self.objects.records()?;
        Ok(Snapshot {
            classifications: self.taxonomy.list()?,
            groups: self.directory.list()?,
            members: self.directory.memberships()?,
            documents,
            files,
            objects,
        })
    }

    pub fn taxonomy(&self) -> &ClassificationStore {
        &self.taxonomy
    }

    pub fn directory(&self) -> &GroupDirectory {
        &self.directory
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn resolver(&self) -> &ReleaseResolver {
        &self.resolver
    }

    fn admin(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.admin.lock().map_err(|_| {
            error!(store = "admin", "store lock poisoned");
            StoreError::Poisoned { store: "admin" }
        })
    }

    // ---- access ----

    /// Decide whether `principal` may access object `id`
    pub fn check_access(&self, principal: &Principal, id: ObjectId) -> ControlResult<Decision> {
        let ctx = AccessContext::new(principal.clone());
        self.check_with_context(&ctx, id)
    }

    /// Decide within an existing request context
    pub fn check_with_context(&self, ctx: &AccessContext, id: ObjectId) -> ControlResult<Decision> {
        Ok(self.decide(ctx, id)?.1)
    }

    fn decide(&self, ctx: &AccessContext, id: ObjectId) -> ControlResult<(StoredObject, Decision)> {
        let (object, parent) = self.objects.with_parent(id)?;
        let decision = self.resolver.check_with_context(
            ctx,
            &object,
            parent.as_ref().map(|d| d as &dyn Securable),
        )?;
        Ok((object, decision))
    }

    /// Like [`check_access`](Self::check_access), but a deny is an error
    pub fn require_access(&self, principal: &Principal, id: ObjectId) -> Result<(), AppError> {
        let ctx = AccessContext::new(principal.clone());
        match self.decide(&ctx, id)? {
            (_, Decision::Allow) => Ok(()),
            (object, Decision::Deny(reason)) => {
                Err(AccessDeniedError::new(object.label(), reason).into())
            }
        }
    }

    /// The subset of `ids` visible to `principal`, in input order.
    ///
    /// Ids that no longer exist are dropped. Any other error fails the
    /// whole call.
    pub fn filter_visible(
        &self,
        principal: &Principal,
        ids: impl IntoIterator<Item = ObjectId>,
    ) -> ControlResult<Vec<ObjectId>> {
        let ctx = AccessContext::new(principal.clone());
        let mut visible = Vec::new();
        for id in ids {
            match self.check_with_context(&ctx, id) {
                Ok(decision) if decision.is_allowed() => visible.push(id),
                Ok(_) => {}
                Err(ControlError::NotFound { .. }) => {
                    debug!(id = %id, "Skipping vanished object");
                }
                Err(e) => {
                    if e.is_store_fault() {
                        error!(
                            request_id = %ctx.request_id(),
                            principal = %principal.id,
                            id = %id,
                            error = %e,
                            "Store fault, withholding every result"
                        );
                    }
                    return Err(e);
                }
            }
        }
        Ok(visible)
    }

    /// Effective restrictions of object `id`, for display
    pub fn resolve_effective(&self, id: ObjectId) -> ControlResult<EffectiveAttributes> {
        self.objects.effective(id)
    }

    /// Group closure of a stored principal
    pub fn closure(&self, principal: &PrincipalId) -> ControlResult<Arc<BTreeSet<GroupId>>> {
        self.resolver.closure(principal)
    }

    // ---- objects ----

    /// Create a document, filling unset restrictions from the defaults
    pub fn create_document(
        &self,
        title: impl Into<String>,
        restrictions: Restrictions,
    ) -> ControlResult<Document> {
        let _admin = self.admin()?;
        let attributes = self.with_defaults(restrictions)?;
        self.validate_references(&attributes)?;

        let document = Document {
            id: self.objects.allocate_id(),
            title: title.into(),
            attributes,
            thumbnail: None,
        };
        self.objects.insert_document(document.clone())?;
        info!(
            id = %document.id,
            classification = ?document.attributes.classification,
            "Created document"
        );
        Ok(document)
    }

    /// Create a feed, collector, scraper or submission
    pub fn create_object(
        &self,
        kind: ObjectKind,
        name: impl Into<String>,
        restrictions: Restrictions,
    ) -> ControlResult<TopLevelObject> {
        if !kind.is_generic() {
            return Err(ControlError::Invalid {
                message: format!("{} objects are not created through create_object", kind),
            });
        }

        let _admin = self.admin()?;
        let attributes = self.with_defaults(restrictions)?;
        self.validate_references(&attributes)?;

        let object = TopLevelObject {
            id: self.objects.allocate_id(),
            kind,
            name: name.into(),
            attributes,
        };
        self.objects.insert_object(object.clone())?;
        info!(id = %object.id, kind = %kind, "Created object");
        Ok(object)
    }

    /// Attach a file to a document. Dimensions whose override flag is off
    /// are inherited from the document when evaluated.
    pub fn add_file(
        &self,
        document: ObjectId,
        name: impl Into<String>,
        attributes: SecurityAttributes,
        overrides: Overrides,
    ) -> ControlResult<File> {
        let _admin = self.admin()?;
        let file = File {
            id: self.objects.allocate_id(),
            document,
            name: name.into(),
            attributes,
            overrides,
        };
        self.validate_record(&StoredObject::File(file.clone()))?;
        self.objects.insert_file(file.clone())?;
        info!(id = %file.id, document = %document, "Added file");
        Ok(file)
    }

    /// Replace an object's stored restrictions. `overrides` only applies to files.
    pub fn update_attributes(
        &self,
        id: ObjectId,
        attributes: SecurityAttributes,
        overrides: Option<Overrides>,
    ) -> ControlResult<()> {
        let _admin = self.admin()?;
        let mut updated = self.objects.get(id)?;
        match &mut updated {
            StoredObject::Document(d) => d.attributes = attributes.clone(),
            StoredObject::Other(o) => o.attributes = attributes.clone(),
            StoredObject::File(f) => {
                f.attributes = attributes.clone();
                if let Some(overrides) = overrides {
                    f.overrides = overrides;
                }
            }
        }
        self.validate_record(&updated)?;
        self.objects.update_attributes(id, attributes, overrides)
    }

    /// Point a document's thumbnail at one of its files, or clear it
    pub fn set_thumbnail(&self, document: ObjectId, file: Option<ObjectId>) -> ControlResult<()> {
        let _admin = self.admin()?;
        self.objects.set_thumbnail(document, file)
    }

    /// Delete any object. Deleting a document deletes its files.
    pub fn delete_object(&self, id: ObjectId) -> ControlResult<()> {
        let _admin = self.admin()?;
        match self.objects.get(id)? {
            StoredObject::Document(_) => {
                self.objects.delete_document(id)?;
            }
            StoredObject::File(_) => {
                self.objects.delete_file(id)?;
            }
            StoredObject::Other(_) => {
                self.objects.delete_object(id)?;
            }
        }
        Ok(())
    }

    fn with_defaults(&self, restrictions: Restrictions) -> ControlResult<SecurityAttributes> {
        let classification = match restrictions.classification {
            Some(id) => id,
            None => self.taxonomy.default()?.id,
        };
        let releasable_to = match restrictions.releasable_to {
            Some(groups) => groups,
            None => {
                let group = self.directory.default().inspect_err(|e| {
                    warn!(error = %e, "Cannot default releasable_to; pass it explicitly")
                })?;
                BTreeSet::from([group.id])
            }
        };
        Ok(SecurityAttributes {
            classification: Some(classification),
            eyes_only: restrictions.eyes_only,
            releasable_to,
        })
    }

    fn validate_references(&self, attributes: &SecurityAttributes) -> ControlResult<()> {
        if let Some(classification) = attributes.classification
            && !self.taxonomy.exists(classification)?
        {
            return Err(ControlError::not_found(EntityKind::Classification, classification));
        }
        for group in attributes.groups() {
            if !self.directory.exists(*group)? {
                return Err(ControlError::not_found(EntityKind::Group, group));
            }
        }
        Ok(())
    }

    /// A classification must be present wherever it is not inherited
    fn validate_record(&self, object: &StoredObject) -> ControlResult<()> {
        let own_classification = object.overrides().is_none_or(|o| o.classification);
        if own_classification && object.attributes().classification.is_none() {
            return Err(ControlError::Unclassified {
                object: object.label(),
            });
        }
        self.validate_references(object.attributes())
    }

    // ---- classifications ----

    pub fn create_classification(
        &self,
        draft: ClassificationDraft,
    ) -> ControlResult<Classification> {
        let _admin = self.admin()?;
        self.taxonomy.create(draft)
    }

    pub fn edit_classification(
        &self,
        id: ClassificationId,
        patch: ClassificationPatch,
    ) -> ControlResult<Classification> {
        let _admin = self.admin()?;
        self.taxonomy.edit(id, patch)
    }

    pub fn reparent_classification(
        &self,
        id: ClassificationId,
        parent: Option<ClassificationId>,
    ) -> ControlResult<()> {
        let _admin = self.admin()?;
        self.taxonomy.reparent(id, parent)
    }

    pub fn set_default_classification(&self, id: ClassificationId) -> ControlResult<()> {
        let _admin = self.admin()?;
        self.taxonomy.set_default(id)
    }

    /// Delete a classification no object references and with no children
    pub fn delete_classification(&self, id: ClassificationId) -> ControlResult<Classification> {
        let _admin = self.admin()?;
        self.taxonomy.delete(id, self.objects.as_ref())
    }

    // ---- groups and members ----

    pub fn create_group(&self, draft: GroupDraft) -> ControlResult<Group> {
        let _admin = self.admin()?;
        self.directory.create(draft)
    }

    pub fn edit_group(&self, id: GroupId, patch: GroupPatch) -> ControlResult<Group> {
        let _admin = self.admin()?;
        self.directory.edit(id, patch)
    }

    pub fn reparent_group(&self, id: GroupId, parent: Option<GroupId>) -> ControlResult<()> {
        let _admin = self.admin()?;
        self.directory.reparent(id, parent)
    }

    pub fn set_default_group(&self, id: GroupId) -> ControlResult<()> {
        let _admin = self.admin()?;
        self.directory.set_default(id)
    }

    /// Delete a group with no members, no children and no object references
    pub fn delete_group(&self, id: GroupId) -> ControlResult<Group> {
        let _admin = self.admin()?;
        self.directory.delete(id, self.objects.as_ref())
    }

    pub fn assign_member(&self, group: GroupId, principal: &PrincipalId) -> ControlResult<bool> {
        let _admin = self.admin()?;
        self.directory.assign(group, principal)
    }

    pub fn remove_member(&self, group: GroupId, principal: &PrincipalId) -> ControlResult<bool> {
        let _admin = self.admin()?;
        self.directory.remove(group, principal)
    }
}

fn build_stores(
    snapshot: Snapshot,
) -> ControlResult<(Arc<ClassificationStore>, Arc<GroupDirectory>, Arc<ObjectStore>)> {
    let taxonomy = ClassificationStore::from_records(snapshot.classifications)?;
    let directory = GroupDirectory::from_records(snapshot.groups, snapshot.members)?;
    let objects = ObjectStore::from_records(snapshot.documents, snapshot.files, snapshot.objects)?;
    Ok((Arc::new(taxonomy), Arc::new(directory), Arc::new(objects)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::{AllowAll, Dimension};

    struct Fixture {
        control: ReleaseControl,
        internal: ClassificationId,
        staff: GroupId,
        analysts: GroupId,
    }

    fn fixture() -> Fixture {
        let control = ReleaseControl::new(Arc::new(AllowAll));
        let internal = control
            .create_classification(ClassificationDraft::new("Internal").default_label())
            .unwrap()
            .id;
        let staff = control
            .create_group(GroupDraft::new("All-Staff").default_group())
            .unwrap()
            .id;
        let analysts = control
            .create_group(GroupDraft::new("Analysts").under(staff))
            .unwrap()
            .id;
        control
            .assign_member(analysts, &PrincipalId::from("alice"))
            .unwrap();
        Fixture {
            control,
            internal,
            staff,
            analysts,
        }
    }

    #[test]
    fn test_document_defaults() {
        let f = fixture();
        let doc = f
            .control
            .create_document("Brief", Restrictions::default())
            .unwrap();
        assert_eq!(doc.attributes.classification, Some(f.internal));
        assert_eq!(doc.attributes.releasable_to, BTreeSet::from([f.staff]));
    }

    #[test]
    fn test_unrestricted_overrides_default_group() {
        let f = fixture();
        let doc = f
            .control
            .create_document("Notice", Restrictions::default().unrestricted())
            .unwrap();
        assert!(doc.attributes.releasable_to.is_empty());
    }

    #[test]
    fn test_no_default_classification() {
        let control = ReleaseControl::new(Arc::new(AllowAll));
        let result = control.create_document("Brief", Restrictions::default());
        assert!(matches!(
            result,
            Err(ControlError::NoDefault {
                kind: EntityKind::Classification
            })
        ));
    }

    #[test]
    fn test_no_default_group_refuses_implicit_releasability() {
        let control = ReleaseControl::new(Arc::new(AllowAll));
        let internal = control
            .create_classification(ClassificationDraft::new("Internal").default_label())
            .unwrap()
            .id;
        control.create_group(GroupDraft::new("Team")).unwrap();

        let result = control.create_document("Brief", Restrictions::classified(internal));
        assert!(matches!(
            result,
            Err(ControlError::NoDefault {
                kind: EntityKind::Group
            })
        ));
        assert!(
            control
                .create_object(ObjectKind::Scraper, "crawler", Restrictions::default())
                .is_err()
        );
        assert!(control.objects().list().unwrap().is_empty());

        // Opting out of releasability is still possible, explicitly
        let open = control
            .create_document("Notice", Restrictions::classified(internal).unrestricted())
            .unwrap();
        assert!(open.attributes.releasable_to.is_empty());
    }

    #[test]
    fn test_unknown_group_reference_rejected() {
        let f = fixture();
        let result = f.control.create_document(
            "Brief",
            Restrictions::classified(f.internal).eyes_only([GroupId(99)]),
        );
        assert!(matches!(
            result,
            Err(ControlError::NotFound {
                kind: EntityKind::Group,
                ..
            })
        ));
    }

    #[test]
    fn test_require_access_reports_dimension() {
        let f = fixture();
        let doc = f
            .control
            .create_document("Brief", Restrictions::classified(f.internal).eyes_only([f.analysts]))
            .unwrap();

        assert!(f.control.require_access(&Principal::new("alice"), doc.id).is_ok());
        match f.control.require_access(&Principal::new("bob"), doc.id) {
            Err(AppError::AccessDenied(e)) => {
                assert_eq!(e.reason.dimension(), Dimension::EyesOnly);
                assert_eq!(e.public_message(), "forbidden");
            }
            other => panic!("expected access denied, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_visible_skips_vanished_ids() {
        let f = fixture();
        let open = f
            .control
            .create_document("Open", Restrictions::classified(f.internal).unrestricted())
            .unwrap();
        let secret = f
            .control
            .create_document("Secret", Restrictions::classified(f.internal).eyes_only([f.analysts]))
            .unwrap();

        let visible = f
            .control
            .filter_visible(&Principal::new("bob"), [secret.id, ObjectId(999), open.id])
            .unwrap();
        assert_eq!(visible, vec![open.id]);
    }

    #[test]
    fn test_in_use_blocks_group_and_classification_delete() {
        let f = fixture();
        f.control
            .create_document(
                "Brief",
                Restrictions::classified(f.internal).releasable_to([f.analysts]),
            )
            .unwrap();

        assert!(matches!(
            f.control.delete_classification(f.internal),
            Err(ControlError::InUse { .. })
        ));
        // one membership plus one object reference
        assert!(matches!(
            f.control.delete_group(f.analysts),
            Err(ControlError::InUse { references: 2, .. })
        ));
    }

    #[test]
    fn test_file_with_own_classification_must_set_it() {
        let f = fixture();
        let doc = f
            .control
            .create_document("Brief", Restrictions::default())
            .unwrap();
        let result = f.control.add_file(
            doc.id,
            "scan.pdf",
            SecurityAttributes::default(),
            Overrides {
                classification: true,
                ..Overrides::INHERIT
            },
        );
        assert!(matches!(result, Err(ControlError::Unclassified { .. })));

        let inherited = f
            .control
            .add_file(doc.id, "scan.pdf", SecurityAttributes::default(), Overrides::INHERIT)
            .unwrap();
        assert_eq!(
            f.control.resolve_effective(inherited.id).unwrap().classification_id,
            f.internal
        );
    }

    #[test]
    fn test_create_object_rejects_nested_kinds() {
        let f = fixture();
        assert!(
            f.control
                .create_object(ObjectKind::File, "x", Restrictions::default())
                .is_err()
        );
        let feed = f
            .control
            .create_object(ObjectKind::IncomingFeed, "wire", Restrictions::default())
            .unwrap();
        assert_eq!(feed.attributes.classification, Some(f.internal));
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_decisions() {
        let f = fixture();
        let doc = f
            .control
            .create_document("Brief", Restrictions::classified(f.internal).eyes_only([f.staff]))
            .unwrap();

        let restored =
            ReleaseControl::from_snapshot(f.control.snapshot().unwrap(), Arc::new(AllowAll))
                .unwrap();
        let alice = Principal::new("alice");
        assert_eq!(
            restored.check_access(&alice, doc.id).unwrap(),
            f.control.check_access(&alice, doc.id).unwrap()
        );
        assert_eq!(restored.snapshot().unwrap(), f.control.snapshot().unwrap());
    }
}
