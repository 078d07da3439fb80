use std::fmt;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, ObjectValidation, Schema, SchemaObject};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declared shape of one table, loaded from a YAML schema file.
///
/// Exactly one of `fields` / `records` must be present for non-pointer
/// tables; pointer tables declare neither and derive their output from
/// `source_table` instead. Cross-table consistency is checked by
/// [`crate::validate_tables`], not at deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    /// Table name, unique across a generation run.
    #[serde(rename = "table_name")]
    pub name: String,
    /// Category driving row production semantics.
    #[serde(rename = "type")]
    pub category: TableCategory,
    /// Ordered primary-key field names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Field specifications in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    /// Literal records emitted verbatim instead of generated fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    /// Row count for standalone tables; `<= 0` yields zero rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Inclusive version range expanded per key group (immutable tables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<Span>,
    /// Parent table for parent-scoped cardinality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Field name(s) linking child rows to their parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<OneOrMany>,
    /// Rows per parent, sampled independently for each parent row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_per_parent: Option<Span>,
    /// Source table for pointer materialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    /// Key fields grouping the pointer source (composite allowed).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key: Vec<String>,
    /// Field whose per-group maximum selects the surviving source row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_field: Option<String>,
}

impl TableSchema {
    /// Declared output field names, in header order.
    pub fn field_names(&self) -> Vec<String> {
        if let Some(fields) = &self.fields {
            return fields.iter().map(|field| field.name.clone()).collect();
        }
        if let Some(records) = &self.records
            && let Some(first) = records.first()
        {
            return first.names().map(str::to_string).collect();
        }
        let mut names = self.key.clone();
        if let Some(latest) = &self.latest_field {
            names.push(latest.clone());
        }
        names
    }

    /// Look up a field spec by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.as_ref().and_then(|fields| fields.get(name))
    }

    /// Name of the first `version_sequence` field, if any.
    pub fn version_field(&self) -> Option<&str> {
        self.fields.as_ref().and_then(|fields| {
            fields
                .iter()
                .find(|field| matches!(field.spec.kind, FieldKind::VersionSequence))
                .map(|field| field.name.as_str())
        })
    }
}

/// Category of a table, driving row production semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableCategory {
    Master,
    Immutable,
    Pointer,
    Transactional,
}

/// One named field and its specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
}

/// Declaration-ordered field list, deserialized from a YAML mapping.
///
/// YAML mappings keep their document order, so the entry order here is the
/// declaration order used for row production and CSV headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.spec)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            map.serialize_entry(&field.name, &field.spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping of field name to field spec")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields: Vec<Field> = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    if fields.iter().any(|field| field.name == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate field '{name}'"
                        )));
                    }
                    fields.push(Field { name, spec });
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

impl JsonSchema for Fields {
    fn schema_name() -> String {
        "Fields".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            object: Some(Box::new(ObjectValidation {
                additional_properties: Some(Box::new(generator.subschema_for::<FieldSpec>())),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

/// Specification of one field: a type kind plus common modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub kind: FieldKind,
    /// When true, generation is skipped for ~10% of rows.
    #[serde(default)]
    pub nullable: bool,
    /// Value substituted when a generation step is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    /// Enforce distinct values for this field within its table.
    #[serde(default)]
    pub unique: bool,
}

/// Field type union; each variant carries only its own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Random RFC-4122-shaped identifier string.
    Uuid,
    /// Fixed configured value.
    Const { value: Literal },
    /// Uniform integer in `[min, max]` inclusive.
    Int {
        #[serde(default = "default_int_min")]
        min: i64,
        #[serde(default = "default_int_max")]
        max: i64,
    },
    /// Random calendar date strictly before the run's start instant.
    Date,
    /// Random date-time strictly before the run's start instant.
    Timestamp,
    /// Value of `field` from a random finalized row of `table`.
    Ref { table: String, field: String },
    /// Pattern expansion with `{seq:N}`, `{date:FORMAT}` and `{alpha}`.
    Code {
        #[serde(default = "default_code_pattern")]
        pattern: String,
    },
    /// Version number supplied by the version expander or the parent row.
    VersionSequence,
    /// 1-based counter scoped to the table (or parent group for child tables).
    AutoIncrement,
}

fn default_int_min() -> i64 {
    0
}

fn default_int_max() -> i64 {
    100
}

fn default_code_pattern() -> String {
    "CODE-{seq:6}".to_string()
}

/// Scalar literal usable as a `const` value, a field default, or a record cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Int(i64),
    Text(String),
}

/// One literal record: an ordered field name to literal mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Vec<(String, Literal)>);

impl Record {
    pub fn new(entries: Vec<(String, Literal)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<&Literal> {
        self.0
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, Literal)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping of field name to literal value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut entries: Vec<(String, Literal)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, Literal>()? {
                    if entries.iter().any(|(entry, _)| *entry == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate field '{name}'"
                        )));
                    }
                    entries.push((name, value));
                }
                Ok(Record(entries))
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

impl JsonSchema for Record {
    fn schema_name() -> String {
        "Record".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            object: Some(Box::new(ObjectValidation {
                additional_properties: Some(Box::new(generator.subschema_for::<Literal>())),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

/// Inclusive integer range, written as a plain integer or an `a~b` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn fixed(value: i64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of integers covered, zero when the span is inverted.
    pub fn len(&self) -> i64 {
        (self.end - self.start + 1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        if self.start == self.end {
            write!(formatter, "{}", self.start)
        } else {
            write!(formatter, "{}~{}", self.start, self.end)
        }
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.start == self.end {
            serializer.serialize_i64(self.start)
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for Span {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpanVisitor;

        impl Visitor<'_> for SpanVisitor {
            type Value = Span;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or an 'a~b' range string")
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Span, E> {
                Ok(Span::fixed(value))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Span, E> {
                i64::try_from(value)
                    .map(Span::fixed)
                    .map_err(|_| E::custom(format!("range bound {value} out of range")))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Span, E> {
                let parse = |raw: &str| {
                    raw.trim()
                        .parse::<i64>()
                        .map_err(|_| E::custom(format!("invalid range bound '{raw}'")))
                };
                match value.split_once('~') {
                    Some((start, end)) => Ok(Span::new(parse(start)?, parse(end)?)),
                    None => Ok(Span::fixed(parse(value)?)),
                }
            }
        }

        deserializer.deserialize_any(SpanVisitor)
    }
}

impl JsonSchema for Span {
    fn schema_name() -> String {
        "Span".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject::default();
        schema.subschemas().any_of = Some(vec![
            generator.subschema_for::<i64>(),
            generator.subschema_for::<String>(),
        ]);
        schema.into()
    }
}

/// A single name or a list of names; both forms appear in schema files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(name) => vec![name.as_str()],
            OneOrMany::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}
