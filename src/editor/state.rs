//! Form state: the flat mapping from field id to its current value.
//!
//! These are the raw mutation primitives. Access gating and projection
//! scheduling live in [`crate::editor::session`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::schema::{FieldKind, TemplateSchema};

/// One record of a dynamic list, keyed by sub-field id.
pub type ListItem = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<ListItem>),
}

/// Result of applying one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied,
    /// The mutation addressed nothing it could change (out-of-range index,
    /// wrong value shape, undeclared field).
    Ignored,
    /// The access gate refused the mutation.
    Denied,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    values: BTreeMap<String, FieldValue>,
}

impl FormState {
    /// Build the default state for a schema: `""` for scalars and
    /// `defaultItems` empty records for dynamic lists.
    pub fn initialize(schema: &TemplateSchema) -> Self {
        let values = schema
            .fields()
            .map(|field| {
                let value = match &field.kind {
                    FieldKind::Text | FieldKind::Textarea | FieldKind::Date => {
                        FieldValue::Text(String::new())
                    }
                    FieldKind::DynamicList(spec) => {
                        FieldValue::List(vec![ListItem::new(); spec.default_count()])
                    }
                };
                (field.id.clone(), value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    /// Scalar value of a field, `""` when unset or not a scalar.
    pub fn text(&self, id: &str) -> &str {
        match self.values.get(id) {
            Some(FieldValue::Text(value)) => value,
            _ => "",
        }
    }

    /// Records of a list field, empty when unset or not a list.
    pub fn list(&self, id: &str) -> &[ListItem] {
        match self.values.get(id) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn set_scalar(&mut self, id: &str, value: impl Into<String>) -> MutationOutcome {
        match self.values.get_mut(id) {
            Some(FieldValue::List(_)) => MutationOutcome::Ignored,
            Some(FieldValue::Text(current)) => {
                *current = value.into();
                MutationOutcome::Applied
            }
            None => {
                self.values
                    .insert(id.to_string(), FieldValue::Text(value.into()));
                MutationOutcome::Applied
            }
        }
    }

    /// Set one sub-field of the record at `index`, padding the list with
    /// empty records when it is shorter than `index + 1`.
    pub fn set_list_item_field(
        &mut self,
        id: &str,
        index: usize,
        sub_field: &str,
        value: impl Into<String>,
    ) -> MutationOutcome {
        let Some(len) = index.checked_add(1) else {
            return MutationOutcome::Ignored;
        };
        let Some(items) = self.list_mut(id) else {
            return MutationOutcome::Ignored;
        };

        if items.len() < len {
            items.resize_with(len, ListItem::new);
        }
        items[index].insert(sub_field.to_string(), value.into());
        MutationOutcome::Applied
    }

    pub fn append_list_item(&mut self, id: &str) -> MutationOutcome {
        let Some(items) = self.list_mut(id) else {
            return MutationOutcome::Ignored;
        };
        items.push(ListItem::new());
        MutationOutcome::Applied
    }

    pub fn remove_list_item(&mut self, id: &str, index: usize) -> MutationOutcome {
        match self.values.get_mut(id) {
            Some(FieldValue::List(items)) if index < items.len() => {
                items.remove(index);
                MutationOutcome::Applied
            }
            _ => MutationOutcome::Ignored,
        }
    }

    /// Overwrite the keys present in `incoming`; other keys are untouched.
    /// Returns the number of keys written.
    pub fn merge(&mut self, incoming: FormState) -> usize {
        let count = incoming.values.len();
        self.values.extend(incoming.values);
        count
    }

    /// Keep only the entries whose id and value shape match the schema.
    pub fn retain_declared(&mut self, schema: &TemplateSchema) -> Vec<String> {
        let mut dropped = Vec::new();
        self.values.retain(|id, value| {
            let keep = match (schema.field(id).map(|f| &f.kind), value) {
                (Some(kind), FieldValue::List(_)) => kind.is_list(),
                (Some(kind), FieldValue::Text(_)) => !kind.is_list(),
                (None, _) => false,
            };
            if !keep {
                dropped.push(id.clone());
            }
            keep
        });
        dropped
    }

    fn list_mut(&mut self, id: &str) -> Option<&mut Vec<ListItem>> {
        match self
            .values
            .entry(id.to_string())
            .or_insert_with(|| FieldValue::List(Vec::new()))
        {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }
}

impl FromIterator<(String, FieldValue)> for FormState {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> TemplateSchema {
        TemplateSchema::from_json(
            r#"{
                "id": "t",
                "title": "T",
                "sections": [{
                    "title": "S",
                    "fields": [
                        { "id": "fullName", "label": "Име", "type": "text" },
                        { "id": "signedOn", "label": "Дата", "type": "date" },
                        {
                            "id": "items",
                            "label": "Вещи",
                            "type": "dynamic_list",
                            "defaultItems": 2,
                            "fields": [ { "id": "x", "label": "X", "type": "text" } ]
                        },
                        {
                            "id": "extras",
                            "label": "Допълнително",
                            "type": "dynamic_list",
                            "fields": [ { "id": "x", "label": "X", "type": "text" } ]
                        }
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> ListItem {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_initialize_covers_every_field() {
        let state = FormState::initialize(&schema());

        assert_eq!(state.len(), 4);
        assert_eq!(state.get("fullName"), Some(&FieldValue::Text(String::new())));
        assert_eq!(state.get("signedOn"), Some(&FieldValue::Text(String::new())));
        assert_eq!(state.list("items").len(), 2);
        assert_eq!(state.list("extras").len(), 3);
        assert!(state.list("items").iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_serializes_as_flat_mapping() {
        let state = FormState::initialize(&schema());
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["fullName"], json!(""));
        assert_eq!(value["items"], json!([{}, {}]));
    }

    #[test]
    fn test_set_list_item_field_pads_on_demand() {
        let mut state = FormState::initialize(&schema());
        state.set_list_item_field("items", 0, "x", "first");

        let outcome = state.set_list_item_field("items", 5, "x", "v");

        assert_eq!(outcome, MutationOutcome::Applied);
        let items = state.list("items");
        assert_eq!(items.len(), 6);
        assert_eq!(items[0], record(&[("x", "first")]));
        assert!(items[1..5].iter().all(|r| r.is_empty()));
        assert_eq!(items[5], record(&[("x", "v")]));
    }

    #[test]
    fn test_set_list_item_field_at_max_index_is_ignored() {
        let mut state = FormState::initialize(&schema());
        let before = state.clone();

        let outcome = state.set_list_item_field("items", usize::MAX, "x", "v");

        assert_eq!(outcome, MutationOutcome::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn test_set_list_item_field_preserves_other_sub_fields() {
        let mut state = FormState::initialize(&schema());
        state.set_list_item_field("items", 1, "x", "a");
        state.set_list_item_field("items", 1, "y", "b");

        assert_eq!(state.list("items")[1], record(&[("x", "a"), ("y", "b")]));
    }

    #[test]
    fn test_remove_shifts_following_records() {
        let mut state = FormState::initialize(&schema());
        state.set_list_item_field("extras", 0, "x", "A");
        state.set_list_item_field("extras", 1, "x", "B");
        state.set_list_item_field("extras", 2, "x", "C");

        assert_eq!(state.remove_list_item("extras", 1), MutationOutcome::Applied);

        assert_eq!(
            state.list("extras"),
            &[record(&[("x", "A")]), record(&[("x", "C")])]
        );
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut state = FormState::initialize(&schema());
        let before = state.clone();

        assert_eq!(state.remove_list_item("items", 7), MutationOutcome::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn test_shape_mismatch_is_ignored() {
        let mut state = FormState::initialize(&schema());
        let before = state.clone();

        assert_eq!(state.set_scalar("items", "oops"), MutationOutcome::Ignored);
        assert_eq!(state.append_list_item("fullName"), MutationOutcome::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn test_merge_overwrites_only_incoming_keys() {
        let mut state = FormState::initialize(&schema());
        state.set_scalar("fullName", "Иван");
        state.set_scalar("signedOn", "2026-10-19");

        let incoming: FormState =
            serde_json::from_value(json!({ "fullName": "Мария", "items": [{ "x": "1" }] }))
                .unwrap();
        let written = state.merge(incoming);

        assert_eq!(written, 2);
        assert_eq!(state.text("fullName"), "Мария");
        assert_eq!(state.text("signedOn"), "2026-10-19");
        assert_eq!(state.list("items"), &[record(&[("x", "1")])]);
        assert_eq!(state.list("extras").len(), 3);
    }

    #[test]
    fn test_retain_declared_drops_unknown_and_mismatched() {
        let mut incoming: FormState = serde_json::from_value(json!({
            "fullName": "Петър",
            "items": "not a list",
            "unknown": "x"
        }))
        .unwrap();

        let mut dropped = incoming.retain_declared(&schema());
        dropped.sort();

        assert_eq!(dropped, vec!["items".to_string(), "unknown".to_string()]);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming.text("fullName"), "Петър");
    }
}
