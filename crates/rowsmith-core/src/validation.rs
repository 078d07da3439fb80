use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::pattern::parse_pattern;
use crate::schema::{FieldKind, TableCategory, TableSchema};

/// Validate a set of table schemas for internal and cross-table consistency.
///
/// This checks:
/// - duplicate table names
/// - exactly one definition source (`fields` or `records`) per table
/// - primary-key fields exist and are not `nullable`
/// - `int` ranges, `code` patterns, span orientation
/// - `ref`, `parent_key` and pointer targets name real fields
///
/// Dependency-graph errors (unknown tables, cycles) are reported by
/// [`crate::generation_order`].
pub fn validate_tables(tables: &[TableSchema]) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

    for table in tables {
        if catalog.contains_key(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        catalog.insert(
            table.name.as_str(),
            table.field_names().into_iter().collect(),
        );
    }

    for table in tables {
        validate_definition_source(table)?;
        validate_primary_key(table)?;
        validate_fields(table, &catalog)?;
        validate_parent(table, &catalog)?;
        if table.category == TableCategory::Pointer {
            validate_pointer(table, &catalog)?;
        }
        validate_spans(table)?;
    }

    Ok(())
}

fn validate_definition_source(table: &TableSchema) -> Result<()> {
    let name = &table.name;

    if table.category == TableCategory::Pointer {
        if table.fields.is_some() || table.records.is_some() {
            return Err(Error::InvalidSchema(format!(
                "pointer table '{name}' must not declare fields or records"
            )));
        }
        return Ok(());
    }

    match (&table.fields, &table.records) {
        (Some(_), Some(_)) => Err(Error::InvalidSchema(format!(
            "table '{name}' declares both fields and records"
        ))),
        (None, None) => Err(Error::InvalidSchema(format!(
            "table '{name}' declares neither fields nor records"
        ))),
        (Some(_), None) => {
            if table.parent.is_none() && table.count.is_none() {
                return Err(Error::InvalidSchema(format!(
                    "table '{name}' declares fields but no count"
                )));
            }
            Ok(())
        }
        (None, Some(records)) => {
            let Some(first) = records.first() else {
                return Ok(());
            };
            let reference: BTreeSet<&str> = first.names().collect();
            for (index, record) in records.iter().enumerate().skip(1) {
                let names: BTreeSet<&str> = record.names().collect();
                if names != reference {
                    return Err(Error::InvalidSchema(format!(
                        "table '{name}' record {index} does not match the first record's fields"
                    )));
                }
            }
            Ok(())
        }
    }
}

fn validate_primary_key(table: &TableSchema) -> Result<()> {
    let name = &table.name;

    if table.category == TableCategory::Pointer {
        return Ok(());
    }
    if table.primary_key.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "table '{name}' declares no primary key"
        )));
    }

    for pk in &table.primary_key {
        if let Some(fields) = &table.fields {
            let Some(spec) = fields.get(pk) else {
                return Err(Error::InvalidSchema(format!(
                    "primary key field not found: {name}.{pk}"
                )));
            };
            if spec.nullable {
                return Err(Error::InvalidSchema(format!(
                    "primary key field must not be nullable: {name}.{pk}"
                )));
            }
        } else if let Some(records) = &table.records {
            for (index, record) in records.iter().enumerate() {
                if record.get(pk).is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "primary key field '{pk}' missing from record {index} of table '{name}'"
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_fields(table: &TableSchema, catalog: &BTreeMap<&str, BTreeSet<String>>) -> Result<()> {
    let name = &table.name;
    let Some(fields) = &table.fields else {
        return Ok(());
    };

    let mut version_fields = 0usize;
    for field in fields {
        match &field.spec.kind {
            FieldKind::Int { min, max } => {
                if min > max {
                    return Err(Error::InvalidSchema(format!(
                        "int field {name}.{} has min {min} greater than max {max}",
                        field.name
                    )));
                }
            }
            FieldKind::Code { pattern } => {
                parse_pattern(pattern).map_err(|reason| {
                    Error::InvalidSchema(format!(
                        "code field {name}.{}: {reason}",
                        field.name
                    ))
                })?;
            }
            FieldKind::Ref {
                table: target,
                field: target_field,
            } => {
                // Unknown target tables are the dependency resolver's error;
                // here only the referenced field is checked.
                if let Some(columns) = catalog.get(target.as_str())
                    && !columns.contains(target_field)
                {
                    return Err(Error::InvalidSchema(format!(
                        "field {name}.{} references missing field {target}.{target_field}",
                        field.name
                    )));
                }
            }
            FieldKind::VersionSequence => {
                version_fields += 1;
                if table.category != TableCategory::Immutable && table.parent.is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "field {name}.{} uses version_sequence outside an immutable or child table",
                        field.name
                    )));
                }
            }
            _ => {}
        }
    }

    if table.category == TableCategory::Immutable && table.parent.is_none() && version_fields != 1 {
        return Err(Error::InvalidSchema(format!(
            "immutable table '{name}' must declare exactly one version_sequence field"
        )));
    }

    Ok(())
}

fn validate_parent(table: &TableSchema, catalog: &BTreeMap<&str, BTreeSet<String>>) -> Result<()> {
    let name = &table.name;
    let Some(parent) = &table.parent else {
        if table.count_per_parent.is_some() {
            return Err(Error::InvalidSchema(format!(
                "table '{name}' declares count_per_parent without a parent"
            )));
        }
        return Ok(());
    };

    if table.category == TableCategory::Pointer {
        return Err(Error::InvalidSchema(format!(
            "pointer table '{name}' must not declare a parent"
        )));
    }

    let Some(parent_columns) = catalog.get(parent.as_str()) else {
        // The dependency resolver reports the unknown table with its own error.
        return Ok(());
    };

    if let Some(parent_key) = &table.parent_key {
        for key in parent_key.as_vec() {
            if !parent_columns.contains(key) {
                return Err(Error::InvalidSchema(format!(
                    "parent key field not found: {parent}.{key} (declared by '{name}')"
                )));
            }
        }
    }

    Ok(())
}

fn validate_pointer(table: &TableSchema, catalog: &BTreeMap<&str, BTreeSet<String>>) -> Result<()> {
    let name = &table.name;

    let Some(source) = &table.source_table else {
        return Err(Error::InvalidSchema(format!(
            "pointer table '{name}' declares no source_table"
        )));
    };
    if table.key.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "pointer table '{name}' declares no key fields"
        )));
    }
    let Some(latest) = &table.latest_field else {
        return Err(Error::InvalidSchema(format!(
            "pointer table '{name}' declares no latest_field"
        )));
    };

    let Some(source_columns) = catalog.get(source.as_str()) else {
        // Unknown source tables are the dependency resolver's error.
        return Ok(());
    };
    for key in &table.key {
        if !source_columns.contains(key) {
            return Err(Error::InvalidSchema(format!(
                "pointer key field not found: {source}.{key} (declared by '{name}')"
            )));
        }
    }
    if !source_columns.contains(latest) {
        return Err(Error::InvalidSchema(format!(
            "pointer latest field not found: {source}.{latest} (declared by '{name}')"
        )));
    }

    Ok(())
}

fn validate_spans(table: &TableSchema) -> Result<()> {
    let name = &table.name;

    if let Some(span) = &table.version_range {
        if table.category != TableCategory::Immutable {
            return Err(Error::InvalidSchema(format!(
                "table '{name}' declares version_range but is not immutable"
            )));
        }
        if span.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table '{name}' has an inverted version_range {span}"
            )));
        }
    }
    if let Some(span) = &table.count_per_parent
        && span.start > span.end
    {
        return Err(Error::InvalidSchema(format!(
            "table '{name}' has an inverted count_per_parent range {span}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldSpec, Fields, Literal, Record, Span};

    fn field(name: &str, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            spec: FieldSpec {
                kind,
                nullable: false,
                default: None,
                unique: false,
            },
        }
    }

    fn master(name: &str, fields: Vec<Field>) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            category: TableCategory::Master,
            primary_key: vec!["id".to_string()],
            fields: Some(Fields::new(fields)),
            records: None,
            count: Some(3),
            version_range: None,
            parent: None,
            parent_key: None,
            count_per_parent: None,
            source_table: None,
            key: Vec::new(),
            latest_field: None,
        }
    }

    #[test]
    fn accepts_minimal_master() {
        let tables = vec![master("users", vec![field("id", FieldKind::Uuid)])];
        assert!(validate_tables(&tables).is_ok());
    }

    #[test]
    fn rejects_both_definition_sources() {
        let mut table = master("users", vec![field("id", FieldKind::Uuid)]);
        table.records = Some(vec![Record::new(vec![(
            "id".to_string(),
            Literal::Int(1),
        )])]);
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("both fields and records"));
    }

    #[test]
    fn rejects_missing_primary_key_field() {
        let table = master("users", vec![field("code", FieldKind::Uuid)]);
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("primary key field not found"));
    }

    #[test]
    fn rejects_nullable_primary_key() {
        let mut table = master("users", vec![field("id", FieldKind::Uuid)]);
        if let Some(fields) = &mut table.fields {
            let mut rebuilt: Vec<Field> = fields.iter().cloned().collect();
            rebuilt[0].spec.nullable = true;
            *fields = Fields::new(rebuilt);
        }
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("must not be nullable"));
    }

    #[test]
    fn rejects_inverted_int_range() {
        let table = master(
            "scores",
            vec![
                field("id", FieldKind::Uuid),
                field("points", FieldKind::Int { min: 10, max: 2 }),
            ],
        );
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("min 10 greater than max 2"));
    }

    #[test]
    fn rejects_malformed_code_pattern() {
        let table = master(
            "items",
            vec![
                field("id", FieldKind::Uuid),
                field(
                    "code",
                    FieldKind::Code {
                        pattern: "X-{bogus}".to_string(),
                    },
                ),
            ],
        );
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("{bogus}"));
    }

    #[test]
    fn rejects_version_sequence_outside_immutable() {
        let table = master(
            "events",
            vec![
                field("id", FieldKind::Uuid),
                field("version", FieldKind::VersionSequence),
            ],
        );
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("version_sequence"));
    }

    #[test]
    fn requires_version_field_on_immutable() {
        let mut table = master("history", vec![field("id", FieldKind::Uuid)]);
        table.category = TableCategory::Immutable;
        table.version_range = Some(Span::new(1, 3));
        let err = validate_tables(&[table]).unwrap_err();
        assert!(
            err.to_string()
                .contains("exactly one version_sequence field")
        );
    }

    #[test]
    fn rejects_pointer_without_latest_field() {
        let mut source = master("history", vec![field("id", FieldKind::Uuid)]);
        source.category = TableCategory::Immutable;
        if let Some(fields) = &mut source.fields {
            let mut rebuilt: Vec<Field> = fields.iter().cloned().collect();
            rebuilt.push(field("version", FieldKind::VersionSequence));
            *fields = Fields::new(rebuilt);
        }
        source.version_range = Some(Span::new(1, 2));

        let pointer = TableSchema {
            name: "latest".to_string(),
            category: TableCategory::Pointer,
            primary_key: Vec::new(),
            fields: None,
            records: None,
            count: None,
            version_range: None,
            parent: None,
            parent_key: None,
            count_per_parent: None,
            source_table: Some("history".to_string()),
            key: vec!["id".to_string()],
            latest_field: None,
        };
        let err = validate_tables(&[source, pointer]).unwrap_err();
        assert!(err.to_string().contains("latest_field"));
    }

    #[test]
    fn rejects_ref_to_missing_field() {
        let users = master("users", vec![field("id", FieldKind::Uuid)]);
        let orders = master(
            "orders",
            vec![
                field("id", FieldKind::Uuid),
                field(
                    "user_code",
                    FieldKind::Ref {
                        table: "users".to_string(),
                        field: "code".to_string(),
                    },
                ),
            ],
        );
        let err = validate_tables(&[users, orders]).unwrap_err();
        assert!(err.to_string().contains("users.code"));
    }

    #[test]
    fn rejects_mismatched_record_fields() {
        let mut table = master("codes", Vec::new());
        table.fields = None;
        table.records = Some(vec![
            Record::new(vec![("id".to_string(), Literal::Int(1))]),
            Record::new(vec![("code".to_string(), Literal::Text("A".to_string()))]),
        ]);
        let err = validate_tables(&[table]).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }
}
