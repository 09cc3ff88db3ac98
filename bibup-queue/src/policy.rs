//! Acceptance policy
//!
//! Default accept/reject state of a diffed field, plus the user-driven toggles.
//!
//! Rules:
//! - A field already present in the row's diff set keeps its flag across re-diffs.
//! - A field appearing for the first time on a row that already Succeeded is
//!   unaccepted: the user has reviewed the row, and the new difference most
//!   likely comes from an independent edit of the stored item.
//! - Any other first appearance is accepted.
//! - A record type change observed outside the queue resets the whole row to
//!   unaccepted (see `reset_if_item_type_changed`).

use bibup_common::RowStatus;

use crate::row::Row;

/// Default acceptance for `field_name` given the row's current diffs and status
pub fn default_accepted(row: &Row, field_name: &str) -> bool {
    match row.field(field_name) {
        Some(existing) => existing.is_accepted,
        None => row.status != RowStatus::Succeeded,
    }
}

/// Un-accept every field when the diff set contains a type change
///
/// Returns true when a reset happened.
pub fn reset_if_item_type_changed(row: &mut Row) -> bool {
    if !row.is_item_type_changed() {
        return false;
    }
    for field in &mut row.fields {
        field.is_accepted = false;
    }
    true
}

/// Toggle acceptance on a row
///
/// With no field name, or when the record type changed, the whole row flips:
/// any accepted field → all unaccepted, otherwise all accepted.
/// Returns false when the named field is not in the diff set.
pub fn toggle(row: &mut Row, field_name: Option<&str>) -> bool {
    match field_name {
        Some(name) if !row.is_item_type_changed() => match row.field_mut(name) {
            Some(field) => {
                field.is_accepted = !field.is_accepted;
                true
            }
            None => false,
        },
        _ => {
            let accept_all = !row.fields.iter().any(|f| f.is_accepted);
            for field in &mut row.fields {
                field.is_accepted = accept_all;
            }
            true
        }
    }
}
