//! Typed form snapshots and their deterministic serialization.
//!
//! A form is described by a [`FormSchema`] (field names and kinds) and read
//! together with [`FormInputs`] holding the values the user entered.
//! `serialize_form` output is stable across field order, so it can be used
//! as a cache key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::errors::PageError;
use crate::types::{FieldName, FormId, Params};

/// Declared kind of a form field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Free text (inputs, selects, text areas); read as a string.
    Text,
    /// Checkbox; read as a boolean.
    Checkbox,
}

/// A named field within a form schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name used as the output key.
    pub name: FieldName,
    /// How the field is read.
    pub kind: FieldKind,
}

impl FormField {
    /// Text field named `name`.
    pub fn text(name: impl Into<FieldName>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    /// Checkbox field named `name`.
    pub fn checkbox(name: impl Into<FieldName>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Checkbox,
        }
    }
}

/// Declared structure of a form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    /// Form identifier, reported in errors.
    pub id: FormId,
    /// Fields in declaration order.
    pub fields: Vec<FormField>,
}

impl FormSchema {
    /// Schema `id` with `fields`.
    pub fn new(id: impl Into<FormId>, fields: Vec<FormField>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Value read from a form field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    /// Value of a text field.
    Text(String),
    /// Checked state of a checkbox.
    Flag(bool),
}

impl From<FormValue> for serde_json::Value {
    fn from(value: FormValue) -> Self {
        match value {
            FormValue::Text(text) => serde_json::Value::String(text),
            FormValue::Flag(flag) => serde_json::Value::Bool(flag),
        }
    }
}

/// Current values entered into a form, keyed by field name.
#[derive(Clone, Debug, Default)]
pub struct FormInputs {
    values: HashMap<FieldName, FormValue>,
}

impl FormInputs {
    /// Inputs with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text value of a field.
    pub fn text(mut self, name: impl Into<FieldName>, value: impl Into<String>) -> Self {
        self.values
            .insert(name.into(), FormValue::Text(value.into()));
        self
    }

    /// Set the checked state of a checkbox field.
    pub fn checked(mut self, name: impl Into<FieldName>, checked: bool) -> Self {
        self.values.insert(name.into(), FormValue::Flag(checked));
        self
    }

    fn get(&self, name: &str) -> Option<&FormValue> {
        self.values.get(name)
    }
}

/// Field values in schema order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormDict(IndexMap<FieldName, FormValue>);

impl FormDict {
    /// Value read for `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.0.get(name)
    }

    /// Number of fields read.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no fields were read.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FormValue)> {
        self.0.iter()
    }

    /// Convert into request params for the JSON cache.
    pub fn to_params(&self) -> Params {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone().into()))
            .collect()
    }
}

/// Read every named field of `schema` from `inputs`.
///
/// Fields with an empty name are skipped and later fields overwrite earlier
/// ones with the same name. A text field without input reads as `""` and an
/// unset checkbox as `false`.
pub fn form_to_dict(schema: &FormSchema, inputs: &FormInputs) -> Result<FormDict, PageError> {
    let mut dict = IndexMap::with_capacity(schema.fields.len());
    for field in &schema.fields {
        if field.name.is_empty() {
            continue;
        }
        let value = match (field.kind, inputs.get(&field.name)) {
            (FieldKind::Text, None) => FormValue::Text(String::new()),
            (FieldKind::Checkbox, None) => FormValue::Flag(false),
            (FieldKind::Text, Some(FormValue::Text(text))) => FormValue::Text(text.clone()),
            (FieldKind::Checkbox, Some(FormValue::Flag(flag))) => FormValue::Flag(*flag),
            (kind, Some(other)) => {
                return Err(PageError::Form {
                    form_id: schema.id.clone(),
                    details: format!(
                        "field '{}' is declared {kind:?} but received {other:?}",
                        field.name
                    ),
                });
            }
        };
        dict.insert(field.name.clone(), value);
    }
    Ok(FormDict(dict))
}

/// Compact JSON of the form's fields with keys sorted.
pub fn serialize_form(schema: &FormSchema, inputs: &FormInputs) -> Result<String, PageError> {
    let dict = form_to_dict(schema, inputs)?;
    let sorted: BTreeMap<&FieldName, &FormValue> = dict.iter().collect();
    serde_json::to_string(&sorted).map_err(|err| PageError::Form {
        form_id: schema.id.clone(),
        details: format!("failed serializing form: {err}"),
    })
}
