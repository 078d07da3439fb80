use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::schema::{FieldKind, TableSchema};

/// Compute the order in which tables must be generated.
///
/// An edge `S -> T` exists for every `ref` field of `T` targeting `S`, for
/// `T`'s declared parent, and for a pointer table's source. The result is a
/// Kahn topological order; among simultaneously-ready tables the schema
/// declaration order wins, so the output is deterministic for a given
/// input sequence.
pub fn generation_order(tables: &[TableSchema]) -> Result<Vec<String>> {
    let mut declared: HashMap<String, usize> = HashMap::new();
    for (index, table) in tables.iter().enumerate() {
        declared.insert(table.name.clone(), index);
    }

    // edges[from] = tables that depend on `from`
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut indegree: HashMap<String, usize> = HashMap::new();
    for table in tables {
        indegree.entry(table.name.clone()).or_insert(0);
    }

    for table in tables {
        for target in dependency_targets(table) {
            if !declared.contains_key(target) {
                return Err(Error::UnknownTableReference {
                    table: table.name.clone(),
                    referenced: target.to_string(),
                });
            }
            edges
                .entry(target.to_string())
                .or_default()
                .push(table.name.clone());
            *indegree.entry(table.name.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<(usize, String)> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| (declared[name], name.clone()))
        .collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(entry) = ready.iter().next().cloned() {
        ready.remove(&entry);
        let (_, name) = entry;

        if let Some(dependents) = edges.get(&name) {
            for dependent in dependents {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert((declared[dependent], dependent.clone()));
                    }
                }
            }
        }
        order.push(name);
    }

    if order.len() == tables.len() {
        Ok(order)
    } else {
        let mut stuck: Vec<String> = indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, _)| name)
            .collect();
        stuck.sort_by_key(|name| declared[name.as_str()]);
        Err(Error::CyclicDependencies { tables: stuck })
    }
}

fn dependency_targets(table: &TableSchema) -> Vec<&str> {
    let mut targets = Vec::new();
    if let Some(fields) = &table.fields {
        for field in fields {
            if let FieldKind::Ref { table: target, .. } = &field.spec.kind {
                targets.push(target.as_str());
            }
        }
    }
    if let Some(parent) = &table.parent {
        targets.push(parent.as_str());
    }
    if let Some(source) = &table.source_table {
        targets.push(source.as_str());
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldSpec, Fields, TableCategory};

    fn table(name: &str, fields: Vec<Field>) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            category: TableCategory::Master,
            primary_key: vec!["id".to_string()],
            fields: Some(Fields::new(fields)),
            records: None,
            count: Some(1),
            version_range: None,
            parent: None,
            parent_key: None,
            count_per_parent: None,
            source_table: None,
            key: Vec::new(),
            latest_field: None,
        }
    }

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

    fn ref_field(name: &str, target: &str) -> Field {
        field(
            name,
            FieldKind::Ref {
                table: target.to_string(),
                field: "id".to_string(),
            },
        )
    }

    #[test]
    fn orders_references_before_dependents() {
        let tables = vec![
            table(
                "orders",
                vec![field("id", FieldKind::Uuid), ref_field("user_id", "users")],
            ),
            table("users", vec![field("id", FieldKind::Uuid)]),
        ];
        let order = generation_order(&tables).unwrap();
        let users = order.iter().position(|name| name == "users").unwrap();
        let orders = order.iter().position(|name| name == "orders").unwrap();
        assert!(users < orders);
    }

    #[test]
    fn orders_parent_and_pointer_sources() {
        let mut history = table("history", vec![field("id", FieldKind::Uuid)]);
        history.category = TableCategory::Immutable;

        let mut lines = table("lines", vec![field("id", FieldKind::Uuid)]);
        lines.parent = Some("history".to_string());

        let mut latest = table("latest", Vec::new());
        latest.category = TableCategory::Pointer;
        latest.fields = None;
        latest.source_table = Some("history".to_string());
        latest.key = vec!["id".to_string()];
        latest.latest_field = Some("version".to_string());

        let order = generation_order(&[latest, lines, history]).unwrap();
        assert_eq!(order[0], "history");
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let tables = vec![
            table("b", vec![field("id", FieldKind::Uuid)]),
            table("a", vec![field("id", FieldKind::Uuid)]),
        ];
        let order = generation_order(&tables).unwrap();
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn reports_unknown_reference() {
        let tables = vec![table("orders", vec![ref_field("user_id", "users")])];
        let err = generation_order(&tables).unwrap_err();
        match err {
            Error::UnknownTableReference { table, referenced } => {
                assert_eq!(table, "orders");
                assert_eq!(referenced, "users");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_cycles() {
        let tables = vec![
            table("a", vec![ref_field("b_id", "b")]),
            table("b", vec![ref_field("a_id", "a")]),
        ];
        match generation_order(&tables).unwrap_err() {
            Error::CyclicDependencies { tables } => {
                assert_eq!(tables, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_self_reference_as_cycle() {
        let tables = vec![table("tree", vec![ref_field("parent_id", "tree")])];
        assert!(matches!(
            generation_order(&tables),
            Err(Error::CyclicDependencies { .. })
        ));
    }
}
