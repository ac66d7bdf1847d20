use optbind_engine::{
    BoundControl, BoundTableControl, BoundTermsControl, ListModelCore, OptionsDocument,
    TableModel, TableVariant, describe_variables,
};
use optbind_model::{CellValue, ColumnType, ItemType, Terms, VariableInfoProvider};
use serde_json::json;

fn prior_table() -> TableModel {
    let mut table = TableModel::new("priors", TableVariant::Plain)
        .with_initial_size(2, 1)
        .with_col_name_prefix("prior")
        .with_column_types(Vec::new(), ItemType::Double)
        .with_defaults(|_, _| CellValue::Integer(1));
    table.reset();
    table
}

#[test]
fn option_document_snapshot() {
    let mut document = OptionsDocument::new();
    document.set("alpha", json!(0.05));

    let terms_control = BoundTermsControl::new("modelTerms");
    let mut core = ListModelCore::new("modelTerms");
    core.set_terms(Terms::from_json(&json!(["A", "B", ["A", "B"]])).unwrap());
    document.set("modelTerms", terms_control.serialize(&core));

    let table_control = BoundTableControl::new("priors");
    let mut table = prior_table();
    table.item_changed(0, 1, "2.5").unwrap();
    document.set("priors", table_control.serialize(&table));

    insta::assert_snapshot!(
        serde_json::to_string(&document.to_json()).unwrap(),
        @r#"{"alpha":0.05,"modelTerms":["A","B",["A","B"]],"priors":[{"levels":["row 1","row 2"],"name":"prior 1","values":[1,2.5]}]}"#
    );
}

#[test]
fn table_values_keep_their_numeric_kind_through_the_round_trip() {
    let control = BoundTableControl::new("priors");
    let mut table = prior_table();
    table.item_changed(0, 1, "2.5").unwrap();

    let value = control.serialize(&table);
    let mut restored = prior_table();
    control.bind_to(&value, &mut restored);

    assert_eq!(restored.table().value_at(0, 0), Some(&CellValue::Integer(1)));
    assert_eq!(restored.table().value_at(0, 1), Some(&CellValue::Double(2.5)));
    assert_eq!(restored.table().row_names, ["row 1", "row 2"]);
}

fn contrast_table() -> TableModel {
    let mut table = TableModel::new("contrasts", TableVariant::Plain)
        .with_initial_size(2, 3)
        .with_column_types(
            vec![ItemType::Integer, ItemType::Double, ItemType::String],
            ItemType::Double,
        )
        .with_defaults(|col, _| match col {
            0 => CellValue::Integer(0),
            1 => CellValue::Double(0.0),
            _ => CellValue::Text(String::new()),
        });
    table.reset();
    table
}

#[test]
fn mixed_column_types_survive_the_round_trip() {
    let control = BoundTableControl::new("contrasts");
    let mut table = contrast_table();
    table.item_changed(0, 0, "3").unwrap();
    table.item_changed(1, 0, "0.5").unwrap();
    table.item_changed(2, 0, "low vs high").unwrap();

    let value = control.serialize(&table);
    let mut restored = contrast_table();
    control.bind_to(&value, &mut restored);

    assert_eq!(restored.table().value_at(0, 0), Some(&CellValue::Integer(3)));
    assert_eq!(restored.table().value_at(1, 0), Some(&CellValue::Double(0.5)));
    assert_eq!(
        restored.table().value_at(2, 0),
        Some(&CellValue::Text("low vs high".to_string()))
    );
    // Untouched cells keep their column's default kind.
    assert_eq!(restored.table().value_at(0, 1), Some(&CellValue::Integer(0)));
    assert_eq!(restored.table().value_at(1, 1), Some(&CellValue::Double(0.0)));
    assert_eq!(restored.table(), table.table());
}

#[test]
fn binding_the_default_value_yields_an_empty_model() {
    let control = BoundTermsControl::new("modelTerms");
    let default = control.create_json();
    assert!(control.is_json_valid(&default));
    let (terms, row_controls) = control.bind_to(&default);
    assert!(terms.is_empty());
    assert!(row_controls.is_empty());
}

#[test]
fn shape_validation_catches_wrong_json_kinds() {
    let control = BoundTermsControl::new("modelTerms");
    assert!(control.is_json_valid(&json!(["A", ["A", "B"]])));
    assert!(!control.is_json_valid(&json!("A")));
    assert!(!control.is_json_valid(&json!([1, 2])));

    let table_control = BoundTableControl::new("priors");
    assert!(!table_control.is_json_valid(&json!([{ "levels": [] }])));
}

struct LabelledProvider;

impl VariableInfoProvider for LabelledProvider {
    fn variable_names(&self) -> Vec<String> {
        vec!["group".to_string(), "age".to_string()]
    }
    fn variable_type(&self, name: &str) -> ColumnType {
        if name == "group" {
            ColumnType::Nominal
        } else {
            ColumnType::Scale
        }
    }
    fn labels(&self, name: &str) -> Vec<String> {
        if name == "group" {
            vec!["control".to_string(), "treatment".to_string()]
        } else {
            Vec::new()
        }
    }
    fn row_count(&self) -> usize {
        40
    }
    fn is_computed(&self, _name: &str) -> bool {
        false
    }
}

#[test]
fn variable_descriptions_expose_type_and_labels() {
    let terms: Terms = ["group", "age"].into_iter().collect();
    let described = describe_variables(&LabelledProvider, &terms);
    assert_eq!(
        described,
        json!([
            { "name": "group", "type": "nominal", "labels": ["control", "treatment"], "count": 40 },
            { "name": "age", "type": "scale", "labels": [], "count": 40 },
        ])
    );
}
