//! Structural protection tests for the taxonomy, the directory and the
//! document/file relation.

use release_control::access_control::AllowAll;
use release_control::directory::{GroupDraft, GroupPatch, PrincipalId};
use release_control::error::{ControlError, EntityKind};
use release_control::securable::{Overrides, SecurityAttributes};
use release_control::service::{ReleaseControl, Restrictions};
use release_control::taxonomy::ClassificationDraft;
use std::sync::Arc;

fn control() -> ReleaseControl {
    ReleaseControl::new(Arc::new(AllowAll))
}

// =============================================================================
// Classification taxonomy
// =============================================================================

#[test]
fn test_reparent_under_descendant_is_rejected_and_tree_unchanged() {
    let rc = control();
    let top = rc.create_classification(ClassificationDraft::new("Top")).unwrap();
    let mid = rc
        .create_classification(ClassificationDraft::new("Mid").under(top.id))
        .unwrap();
    let leaf = rc
        .create_classification(ClassificationDraft::new("Leaf").under(mid.id))
        .unwrap();
    let before = rc.taxonomy().list().unwrap();

    let result = rc.reparent_classification(top.id, Some(leaf.id));
    assert!(matches!(
        result,
        Err(ControlError::Cycle {
            kind: EntityKind::Classification,
            ..
        })
    ));
    // Self-parenting is a cycle too
    assert!(rc.reparent_classification(mid.id, Some(mid.id)).is_err());

    assert_eq!(rc.taxonomy().list().unwrap(), before);
    assert_eq!(
        rc.taxonomy().ancestors(leaf.id).unwrap(),
        vec![leaf.id, mid.id, top.id]
    );
}

#[test]
fn test_delete_classification_with_children() {
    let rc = control();
    let top = rc.create_classification(ClassificationDraft::new("Top")).unwrap();
    rc.create_classification(ClassificationDraft::new("Child").under(top.id))
        .unwrap();

    assert!(matches!(
        rc.delete_classification(top.id),
        Err(ControlError::HasChildren { children: 1, .. })
    ));
}

#[test]
fn test_delete_classification_in_use_by_inheriting_file_reference() {
    let rc = control();
    let internal = rc
        .create_classification(ClassificationDraft::new("Internal").default_label())
        .unwrap();
    let spare = rc.create_classification(ClassificationDraft::new("Spare")).unwrap();
    let doc = rc.create_document("Report", Restrictions::default().unrestricted()).unwrap();
    // Stored but not in effect: the file inherits classification
    rc.add_file(
        doc.id,
        "annex.pdf",
        SecurityAttributes::classified(spare.id),
        Overrides::INHERIT,
    )
    .unwrap();

    assert!(matches!(
        rc.delete_classification(spare.id),
        Err(ControlError::InUse { references: 1, .. })
    ));
    assert!(rc.delete_classification(internal.id).is_err());
}

#[test]
fn test_default_classification_must_stay_a_root() {
    let rc = control();
    let top = rc.create_classification(ClassificationDraft::new("Top")).unwrap();
    let fallback = rc
        .create_classification(ClassificationDraft::new("Fallback").default_label())
        .unwrap();
    let child = rc
        .create_classification(ClassificationDraft::new("Child").under(top.id))
        .unwrap();

    assert!(matches!(
        rc.reparent_classification(fallback.id, Some(top.id)),
        Err(ControlError::InvalidDefault { .. })
    ));
    assert!(matches!(
        rc.set_default_classification(child.id),
        Err(ControlError::InvalidDefault { .. })
    ));

    rc.set_default_classification(top.id).unwrap();
    assert_eq!(rc.taxonomy().default().unwrap().id, top.id);
    assert!(!rc.taxonomy().resolve(fallback.id).unwrap().is_default);
}

// =============================================================================
// Compartment directory
// =============================================================================

#[test]
fn test_group_cycle_rejected() {
    let rc = control();
    let staff = rc.create_group(GroupDraft::new("All-Staff")).unwrap();
    let analysts = rc
        .create_group(GroupDraft::new("Analysts").under(staff.id))
        .unwrap();

    assert!(matches!(
        rc.reparent_group(staff.id, Some(analysts.id)),
        Err(ControlError::Cycle {
            kind: EntityKind::Group,
            ..
        })
    ));
}

#[test]
fn test_group_with_members_cannot_be_deleted() {
    let rc = control();
    let team = rc.create_group(GroupDraft::new("Team")).unwrap();
    let p = PrincipalId::from("p");
    rc.assign_member(team.id, &p).unwrap();

    assert!(matches!(
        rc.delete_group(team.id),
        Err(ControlError::InUse { references: 1, .. })
    ));

    assert!(rc.remove_member(team.id, &p).unwrap());
    rc.delete_group(team.id).unwrap();
    assert!(!rc.directory().exists(team.id).unwrap());
}

#[test]
fn test_membership_edits_are_idempotent() {
    let rc = control();
    let team = rc.create_group(GroupDraft::new("Team")).unwrap();
    let p = PrincipalId::from("p");

    assert!(rc.assign_member(team.id, &p).unwrap());
    assert!(!rc.assign_member(team.id, &p).unwrap());
    assert_eq!(rc.directory().members(team.id).unwrap().len(), 1);

    assert!(rc.remove_member(team.id, &p).unwrap());
    assert!(!rc.remove_member(team.id, &p).unwrap());
    assert!(rc.directory().groups_of(&p).unwrap().is_empty());
}

#[test]
fn test_hidden_groups_are_enforced_but_not_pickable() {
    let rc = control();
    let visible = rc.create_group(GroupDraft::new("Visible")).unwrap();
    let hidden = rc.create_group(GroupDraft::new("Shadow").hidden()).unwrap();

    let pickable: Vec<_> = rc
        .directory()
        .pickable()
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(pickable, vec![visible.id]);

    rc.edit_group(
        hidden.id,
        GroupPatch {
            hidden: Some(false),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(rc.directory().pickable().unwrap().len(), 2);
}

// =============================================================================
// Documents and files
// =============================================================================

#[test]
fn test_thumbnail_cleared_on_file_delete_and_document_cascades() {
    let rc = control();
    rc.create_classification(ClassificationDraft::new("Internal").default_label())
        .unwrap();
    let doc = rc.create_document("Report", Restrictions::default().unrestricted()).unwrap();
    let cover = rc
        .add_file(doc.id, "cover.png", SecurityAttributes::default(), Overrides::INHERIT)
        .unwrap();
    let annex = rc
        .add_file(doc.id, "annex.pdf", SecurityAttributes::default(), Overrides::INHERIT)
        .unwrap();

    rc.set_thumbnail(doc.id, Some(cover.id)).unwrap();
    assert_eq!(rc.objects().document(doc.id).unwrap().thumbnail, Some(cover.id));

    rc.delete_object(cover.id).unwrap();
    assert_eq!(rc.objects().document(doc.id).unwrap().thumbnail, None);

    rc.delete_object(doc.id).unwrap();
    assert!(rc.objects().get(annex.id).is_err());
}

#[test]
fn test_thumbnail_must_belong_to_document() {
    let rc = control();
    rc.create_classification(ClassificationDraft::new("Internal").default_label())
        .unwrap();
    let first = rc.create_document("First", Restrictions::default().unrestricted()).unwrap();
    let second = rc.create_document("Second", Restrictions::default().unrestricted()).unwrap();
    let file = rc
        .add_file(first.id, "cover.png", SecurityAttributes::default(), Overrides::INHERIT)
        .unwrap();

    assert!(matches!(
        rc.set_thumbnail(second.id, Some(file.id)),
        Err(ControlError::Invalid { .. })
    ));
}
