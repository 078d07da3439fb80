use rowsmith_core::{FieldKind, Literal, Span, TableCategory, TableSchema};

#[test]
fn parses_master_table_with_ordered_fields() {
    let yaml = r#"
table_name: users
type: master
primary_key: [user_id]
count: 10
fields:
  user_id:
    type: uuid
  login:
    type: code
    pattern: "USR-{seq:5}"
    unique: true
  score:
    type: int
    min: 1
    max: 100
    nullable: true
    default: 0
  created_at:
    type: timestamp
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse users.yaml");
    assert_eq!(table.name, "users");
    assert_eq!(table.category, TableCategory::Master);
    assert_eq!(table.count, Some(10));

    let fields = table.fields.as_ref().expect("fields present");
    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, vec!["user_id", "login", "score", "created_at"]);

    let login = fields.get("login").expect("login spec");
    assert!(login.unique);
    assert_eq!(
        login.kind,
        FieldKind::Code {
            pattern: "USR-{seq:5}".to_string()
        }
    );

    let score = fields.get("score").expect("score spec");
    assert!(score.nullable);
    assert_eq!(score.default, Some(Literal::Int(0)));
    assert_eq!(score.kind, FieldKind::Int { min: 1, max: 100 });
}

#[test]
fn parses_int_defaults_when_bounds_omitted() {
    let yaml = r#"
table_name: counters
type: transactional
primary_key: [id]
count: 1
fields:
  id:
    type: auto_increment
  value:
    type: int
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse counters.yaml");
    let value = table.field("value").expect("value spec");
    assert_eq!(value.kind, FieldKind::Int { min: 0, max: 100 });
}

#[test]
fn parses_version_range_span_forms() {
    let yaml = r#"
table_name: contracts
type: immutable
primary_key: [contract_id, version]
count: 2
version_range: "1~3"
fields:
  contract_id:
    type: uuid
  version:
    type: version_sequence
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse contracts.yaml");
    assert_eq!(table.version_range, Some(Span::new(1, 3)));
    assert_eq!(table.version_field(), Some("version"));

    let fixed: Span = serde_yaml::from_str("4").expect("parse fixed span");
    assert_eq!(fixed, Span::fixed(4));
    assert_eq!(fixed.len(), 1);
}

#[test]
fn parses_literal_records_in_order() {
    let yaml = r#"
table_name: statuses
type: master
primary_key: [status_code]
records:
  - status_code: "10"
    label: open
  - status_code: "20"
    label: closed
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse statuses.yaml");
    let records = table.records.as_ref().expect("records present");
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].get("label"),
        Some(&Literal::Text("open".to_string()))
    );
    assert_eq!(table.field_names(), vec!["status_code", "label"]);
}

#[test]
fn parses_pointer_table() {
    let yaml = r#"
table_name: contracts_latest
type: pointer
source_table: contracts
key: [contract_id]
latest_field: version
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse pointer.yaml");
    assert_eq!(table.category, TableCategory::Pointer);
    assert_eq!(table.source_table.as_deref(), Some("contracts"));
    assert_eq!(table.field_names(), vec!["contract_id", "version"]);
}

#[test]
fn parses_child_table_with_count_per_parent() {
    let yaml = r#"
table_name: order_lines
type: transactional
primary_key: [order_id, line_no]
parent: orders
parent_key: order_id
count_per_parent: "2~5"
fields:
  order_id:
    type: ref
    table: orders
    field: order_id
  line_no:
    type: auto_increment
"#;

    let table: TableSchema = serde_yaml::from_str(yaml).expect("parse order_lines.yaml");
    assert_eq!(table.parent.as_deref(), Some("orders"));
    assert_eq!(table.count_per_parent, Some(Span::new(2, 5)));
    let parent_key = table.parent_key.as_ref().expect("parent_key present");
    assert_eq!(parent_key.as_vec(), vec!["order_id"]);
}

#[test]
fn rejects_duplicate_field_names() {
    let yaml = r#"
table_name: dupes
type: master
primary_key: [id]
count: 1
fields:
  id:
    type: uuid
  id:
    type: uuid
"#;

    assert!(serde_yaml::from_str::<TableSchema>(yaml).is_err());
}
