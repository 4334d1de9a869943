//! Scripted batches shared by statement tests.

use dblib_types::TypeId;

use crate::mock_process::{MockBatch, MockColumn, MockResult, Result, ScalarValue};

/// Three-column `orders` result set with `rows` rows.
pub fn orders(rows: i32) -> Result<MockResult> {
    MockResult::rows(
        vec![
            MockColumn::int("id").with_source("orders.id"),
            MockColumn::varchar("customer", 40),
            MockColumn::new("total", TypeId::Float8, 8).with_type_info(15, 0),
        ],
        (1..=rows)
            .map(|id| {
                vec![
                    ScalarValue::Int(id),
                    ScalarValue::String(format!("customer {id}")),
                    ScalarValue::Double(f64::from(id) * 10.5),
                ]
            })
            .collect(),
    )
}

/// A batch whose first result has no columns, followed by `orders(rows)`.
pub fn empty_then_orders(rows: i32) -> Result<MockBatch> {
    Ok(MockBatch::new()
        .with_result(MockResult::done(0))
        .with_result(orders(rows)?))
}

/// Output of a procedure call: output values and a return status, no rows.
#[must_use]
pub fn procedure_outputs(values: Vec<ScalarValue>, status: i32) -> MockBatch {
    values
        .into_iter()
        .fold(MockBatch::new(), MockBatch::with_return)
        .with_return_status(status)
}
