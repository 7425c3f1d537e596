mod common;

use common::TestWorkspace;

use orderboard::export;
use orderboard::schema::CanonicalField;
use orderboard::session::DatasetState;

const ORDERS_CSV: &str = "\
Order ID,CreateDate,Plant Name,Order Qty,Status,Payment Type
387249,2025-08-25,Manukan,131,Confirmed,Cash
387250,2025-08-26,\"Talisay, North\",NA,\"Pending \"\"rush\"\"\",Credit
387251,2025-08-26,Manukan,17,Delivered,Cash
";

const EXPORT_FIELDS: [CanonicalField; 6] = [
    CanonicalField::OrderId,
    CanonicalField::CreateDate,
    CanonicalField::PlantName,
    CanonicalField::OrderQty,
    CanonicalField::Status,
    CanonicalField::PaymentType,
];

#[test]
fn export_reingests_with_identical_canonical_cells() {
    let workspace = TestWorkspace::new();
    let source_path = workspace.write("orders.csv", ORDERS_CSV);
    let source = DatasetState::load(&source_path).expect("load source");

    let export_path = workspace.path().join("filtered.csv");
    export::write_csv(
        &source.filtered_view(),
        &source.mapping,
        &EXPORT_FIELDS,
        &export_path,
    )
    .expect("export view");

    let reloaded = DatasetState::load(&export_path).expect("reload export");
    assert_eq!(reloaded.table.row_count(), source.table.row_count());

    for field in EXPORT_FIELDS {
        let source_idx = source
            .table
            .field_index(&source.mapping, field)
            .expect("source column");
        let reloaded_idx = reloaded
            .table
            .field_index(&reloaded.mapping, field)
            .expect("reloaded column");
        for row in 0..source.table.row_count() {
            assert_eq!(
                source.table.cell(row, source_idx),
                reloaded.table.cell(row, reloaded_idx),
                "cell mismatch for {field} at row {row}"
            );
        }
    }
}

#[test]
fn export_respects_field_subset_and_order() {
    let workspace = TestWorkspace::new();
    let source_path = workspace.write("orders.csv", ORDERS_CSV);
    let source = DatasetState::load(&source_path).expect("load source");

    let mut buffer = Vec::new();
    export::write_csv_to(
        &source.filtered_view(),
        &source.mapping,
        &[CanonicalField::Status, CanonicalField::OrderId],
        &mut buffer,
    )
    .expect("export subset");
    let text = String::from_utf8(buffer).expect("utf-8 export");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("\"Status\",\"Order ID\""));
    assert_eq!(lines.next(), Some("\"Confirmed\",\"387249\""));
}
