//! Inheritance resolution between a nested object and its parent
//!
//! Each dimension is an independent select on its own override flag; there
//! is no "inherit everything or nothing" switch. Resolution happens at read
//! time, so editing a document changes what its inheriting files evaluate
//! to without touching their stored values.

use crate::error::{ControlError, ControlResult};
use crate::securable::types::{EffectiveAttributes, Securable};
use crate::taxonomy::ClassificationId;
use tracing::trace;

/// Effective restrictions of `object`, falling back to `parent` for every
/// dimension whose override flag is off.
///
/// Top-level objects (no override flags) always use their own values and
/// ignore `parent`. A nested object that inherits anything but is given no
/// parent fails with `MissingParent`; a missing classification on whichever
/// side supplies it fails with `Unclassified`.
pub fn resolve_effective(
    object: &dyn Securable,
    parent: Option<&dyn Securable>,
) -> ControlResult<EffectiveAttributes> {
    let own = object.attributes();

    let Some(flags) = object.overrides() else {
        return Ok(EffectiveAttributes {
            classification_id: require_classification(own.classification, object)?,
            eyes_only: own.eyes_only.clone(),
            releasable_to: own.releasable_to.clone(),
        });
    };

    if flags.all() {
        trace!(object = %object.label(), "All dimensions overridden");
        return Ok(EffectiveAttributes {
            classification_id: require_classification(own.classification, object)?,
            eyes_only: own.eyes_only.clone(),
            releasable_to: own.releasable_to.clone(),
        });
    }

    let parent = parent.ok_or_else(|| ControlError::MissingParent {
        object: object.label(),
    })?;
    let inherited = parent.attributes();

    let classification_id = if flags.classification {
        require_classification(own.classification, object)?
    } else {
        require_classification(inherited.classification, parent)?
    };
    let eyes_only = if flags.eyes_only {
        own.eyes_only.clone()
    } else {
        inherited.eyes_only.clone()
    };
    let releasable_to = if flags.releasable_to {
        own.releasable_to.clone()
    } else {
        inherited.releasable_to.clone()
    };

    Ok(EffectiveAttributes {
        classification_id,
        eyes_only,
        releasable_to,
    })
}

fn require_classification(
    classification: Option<ClassificationId>,
    owner: &dyn Securable,
) -> ControlResult<ClassificationId> {
    classification.ok_or_else(|| ControlError::Unclassified {
        object: owner.label(),
    })
}
