//! Property-based tests for micro-batch routing.
//!
//! Whatever the data and rules, routing must partition the batch: every row
//! lands in exactly one of the valid and violating sets, a row is violating
//! exactly when at least one of its rules fails, and its message lists the
//! failed rules in expectation order.

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use proptest::prelude::*;
use schemon_client::expectations::Expectations;
use schemon_client::logging::NoopLogger;
use schemon_client::router::{BatchRouter, MemorySink, DEFAULT_VIOLATION_COLUMN};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Reference evaluation of the built-in rules on a nullable integer.
fn fails(rule: &str, value: Option<i64>) -> bool {
    match rule {
        "not_null" => value.is_none(),
        "is_null" => value.is_some(),
        "positive" => matches!(value, Some(v) if v <= 0),
        "non_negative" => matches!(value, Some(v) if v < 0),
        other => panic!("no reference for rule {other}"),
    }
}

fn rule_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("not_null"),
        Just("is_null"),
        Just("positive"),
        Just("non_negative"),
    ]
}

/// One to three columns, each with its own rule and values.
fn checks_strategy() -> impl Strategy<Value = (Vec<&'static str>, Vec<Vec<Option<i64>>>)> {
    (1usize..=3, 0usize..30).prop_flat_map(|(columns, rows)| {
        (
            prop::collection::vec(rule_strategy(), columns),
            prop::collection::vec(
                prop::collection::vec(prop::option::of(-3i64..3), rows),
                columns,
            ),
        )
    })
}

fn column_name(index: usize) -> String {
    format!("col {index}")
}

fn ids(batches: &[RecordBatch]) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|batch| {
            let array = batch.column_by_name("id").unwrap();
            let array = array.as_any().downcast_ref::<Int64Array>().unwrap().clone();
            (0..array.len()).map(move |i| array.value(i))
        })
        .collect()
}

fn messages(batches: &[RecordBatch]) -> Vec<String> {
    batches
        .iter()
        .flat_map(|batch| {
            let array = batch.column_by_name(DEFAULT_VIOLATION_COLUMN).unwrap();
            let array = arrow::compute::cast(array, &DataType::Utf8).unwrap();
            let array = array.as_any().downcast_ref::<StringArray>().unwrap().clone();
            (0..array.len()).map(move |i| array.value(i).to_string())
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_routing_partitions_the_batch(
        (rules, columns) in checks_strategy(),
        validate in any::<bool>(),
    ) {
        let rows = columns[0].len();
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = SessionContext::new();
            let sink = Arc::new(MemorySink::new());
            let router = BatchRouter::builder(ctx.clone())
                .table_sink(sink.clone())
                .quarantine_sink(sink.clone())
                .logger(Arc::new(NoopLogger))
                .build()
                .unwrap();

            let mut fields = vec![Field::new("id", DataType::Int64, false)];
            let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))];
            let mut expectations = Expectations::new();
            for (index, (rule, values)) in rules.iter().zip(&columns).enumerate() {
                fields.push(Field::new(column_name(index), DataType::Int64, true));
                arrays.push(Arc::new(Int64Array::from(values.clone())));
                expectations = expectations.expect(column_name(index), *rule);
            }
            let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap();

            let expectations = validate.then_some(&expectations);
            let report = router
                .process(ctx.read_batch(batch).unwrap(), 0, "t", "/bad", expectations)
                .await
                .unwrap();

            // (row id, expected message) for every row with a failing rule
            let expected: BTreeSet<(i64, String)> = if validate {
                (0..rows)
                    .filter_map(|row| {
                        let failed: Vec<String> = rules
                            .iter()
                            .enumerate()
                            .filter(|(index, rule)| fails(rule, columns[*index][row]))
                            .map(|(index, rule)| {
                                format!("Column {} failed '{rule}'", column_name(index))
                            })
                            .collect();
                        (!failed.is_empty()).then(|| (row as i64, failed.join(", ")))
                    })
                    .collect()
            } else {
                BTreeSet::new()
            };

            prop_assert_eq!(report.total, rows);
            prop_assert_eq!(report.valid + report.violating, report.total);
            prop_assert_eq!(report.violating, expected.len());

            let quarantined = sink.batches("/bad/t").await;
            let actual: BTreeSet<(i64, String)> = ids(&quarantined)
                .into_iter()
                .zip(messages(&quarantined))
                .collect();
            prop_assert_eq!(&actual, &expected);

            let valid_ids: BTreeSet<i64> = ids(&sink.batches("t").await).into_iter().collect();
            let expected_valid: BTreeSet<i64> = (0..rows as i64)
                .filter(|id| !expected.iter().any(|(violating, _)| violating == id))
                .collect();
            prop_assert_eq!(valid_ids, expected_valid);
            Ok(())
        })?;
    }
}
