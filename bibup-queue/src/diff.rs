//! Diff computer
//!
//! Compares the stored record with a fetched record and produces the ordered
//! field-level differences shown for review.
//!
//! **Output order:**
//! 1. `creators` (composite; one diff for the whole list)
//! 2. `itemType`
//! 3. Fields of the old type in schema order, then fields only the new type has
//!
//! The last-access field is never emitted. Absent values compare as "".

use bibup_common::{Creator, FieldDiff, FieldValue, Record};

use crate::policy::default_accepted;
use crate::row::Row;
use crate::schema::{ItemSchema, CREATORS_FIELD, EXCLUDED_FIELD, ITEM_TYPE_FIELD};

/// Format a creator list as one comparable string
///
/// `"First Last, Other"`, each name optionally suffixed with ` (Role)`.
pub fn format_creators(schema: &dyn ItemSchema, creators: &[Creator], include_type: bool) -> String {
    creators
        .iter()
        .map(|c| {
            let name = c.display_name();
            if include_type {
                format!("{} ({})", name, schema.creator_type_label(&c.creator_type))
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Some position present in both lists has a different creator role
fn creator_roles_differ(old: &[Creator], new: &[Creator]) -> bool {
    old.iter()
        .zip(new.iter())
        .any(|(o, n)| o.creator_type != n.creator_type)
}

/// Compute the ordered diff set between `old` and `new`
///
/// Acceptance of each diff comes from the acceptance policy evaluated against
/// `row` as it is before the new diff set replaces its fields.
pub fn compute_diff(schema: &dyn ItemSchema, old: &Record, new: &Record, row: &Row) -> Vec<FieldDiff> {
    let mut combined: Vec<FieldDiff> = Vec::new();

    let include_type = creator_roles_differ(&old.creators, &new.creators);
    let old_creators = format_creators(schema, &old.creators, include_type);
    let new_creators = format_creators(schema, &new.creators, include_type);

    if old_creators != new_creators {
        combined.push(FieldDiff {
            field_name: CREATORS_FIELD.to_string(),
            field_label: schema.field_label(CREATORS_FIELD),
            old_value: FieldValue::Creators(old.creators.clone()),
            old_label: old_creators,
            new_value: FieldValue::Creators(new.creators.clone()),
            new_label: new_creators,
            is_accepted: default_accepted(row, CREATORS_FIELD),
        });
    }

    // Some fields disappear along with a type change
    if old.item_type != new.item_type {
        combined.push(FieldDiff {
            field_name: ITEM_TYPE_FIELD.to_string(),
            field_label: schema.field_label(ITEM_TYPE_FIELD),
            old_value: FieldValue::Text(old.item_type.clone()),
            old_label: schema.type_label(&old.item_type),
            new_value: FieldValue::Text(new.item_type.clone()),
            new_label: schema.type_label(&new.item_type),
            is_accepted: default_accepted(row, ITEM_TYPE_FIELD),
        });
    }

    let candidates = schema
        .fields_for_type(&old.item_type)
        .into_iter()
        .chain(schema.fields_for_type(&new.item_type));

    for field_name in candidates {
        let old_value = old.field(&field_name);
        let new_value = new.field(&field_name);
        if field_name == EXCLUDED_FIELD
            || old_value == new_value
            || combined.iter().any(|d| d.field_name == field_name)
        {
            continue;
        }

        combined.push(FieldDiff {
            field_label: schema.field_label(&field_name),
            old_value: FieldValue::Text(old_value.to_string()),
            old_label: old_value.to_string(),
            new_value: FieldValue::Text(new_value.to_string()),
            new_label: new_value.to_string(),
            is_accepted: default_accepted(row, &field_name),
            field_name,
        });
    }

    combined
}
