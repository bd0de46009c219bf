use std::sync::Arc;

use arrow_array::{Float64Array, Int64Array, StringArray};
use arrow_schema::DataType;
use rstest::rstest;
use sieve::batch::{FieldId, MemorySegment, SegmentRef};
use sieve::scan::{FilterScan, ScanOptions, selected_rows};
use sieve::{
    Access, BetweenOptions, ConjunctionExpr, ExprRef, between, col, is_in, is_null, lt, not, or,
};

const COLORS: [&str; 4] = ["red", "green", "blue", "black"];

fn price(i: usize) -> i64 {
    (i as i64 * 7) % 100
}

fn qty(i: usize) -> Option<i64> {
    (i % 5 != 0).then_some(i as i64 % 13)
}

fn score(i: usize) -> f64 {
    (i % 10) as f64 / 10.0
}

fn segment(rows: std::ops::Range<usize>) -> SegmentRef {
    let len = rows.len();
    MemorySegment::new(len)
        .with_column(
            FieldId::new(0),
            Arc::new(Int64Array::from_iter_values(rows.clone().map(price))),
        )
        .unwrap()
        .with_column(
            FieldId::new(1),
            Arc::new(StringArray::from_iter_values(
                rows.clone().map(|i| COLORS[i % COLORS.len()]),
            )),
        )
        .unwrap()
        .with_column(
            FieldId::new(2),
            Arc::new(Int64Array::from_iter(rows.clone().map(qty))),
        )
        .unwrap()
        .with_column(
            FieldId::new(3),
            Arc::new(Float64Array::from_iter_values(rows.map(score))),
        )
        .unwrap()
        .into_ref()
}

/// `($price < 50 && ($color in [red, blue] || $qty is null)) || !(0.2 <= $score <= 0.8)`
fn filter(score_access: Access) -> ExprRef {
    let price_col = col(0, "price", DataType::Int64);
    let color = col(1, "color", DataType::Utf8);
    let qty_col = col(2, "qty", DataType::Int64);
    let score_col = col(3, "score", DataType::Float64).with_access(score_access);

    let wanted = or([
        is_in(color, ["red", "blue"]).unwrap(),
        is_null(qty_col),
    ])
    .unwrap();
    let cheap = ConjunctionExpr::and_expr(vec![lt(price_col, 50i64).unwrap(), wanted])
        .unwrap()
        .into_expr();
    let outlier = not(between(score_col, 0.2f64, 0.8f64, BetweenOptions::default()).unwrap()).unwrap();
    or([cheap, outlier]).unwrap()
}

fn expected(rows: std::ops::Range<usize>) -> Vec<usize> {
    rows.filter(|&i| {
        let color = COLORS[i % COLORS.len()];
        let cheap = price(i) < 50 && (color == "red" || color == "blue" || qty(i).is_none());
        let outlier = !(0.2..=0.8).contains(&score(i));
        cheap || outlier
    })
    .collect()
}

#[rstest]
fn matches_row_by_row_evaluation(
    #[values(1, 3, 16, 8192)] batch_size: usize,
    #[values(0.0, 0.05, 1.0)] threshold: f64,
    #[values(Access::Sequential, Access::Random)] score_access: Access,
) {
    let options = ScanOptions::default()
        .with_batch_size(batch_size)
        .with_mask_pushdown_threshold(threshold);
    let scan = FilterScan::try_new(filter(score_access), segment(0..100), options).unwrap();
    let result = scan.evaluate_all().unwrap();
    assert_eq!(result.len(), 100);
    assert_eq!(result.set_indices().collect::<Vec<_>>(), expected(0..100));
}

#[test]
fn evaluation_order_does_not_change_results() {
    let children = vec![
        lt(col(0, "price", DataType::Int64), 50i64).unwrap(),
        is_in(col(1, "color", DataType::Utf8), ["red", "blue", "black"]).unwrap(),
        is_null(col(2, "qty", DataType::Int64)),
    ];
    let natural = ConjunctionExpr::and_expr(children).unwrap();
    let mut by_cost = natural.clone();
    by_cost.reorder_by_cost().unwrap();
    let reversed = natural.with_order(vec![2, 1, 0]).unwrap();

    let run = |expr: ConjunctionExpr| {
        FilterScan::try_new(
            expr.into_expr(),
            segment(0..60),
            ScanOptions::default().with_batch_size(7),
        )
        .unwrap()
        .evaluate_all()
        .unwrap()
    };
    let baseline = run(natural.clone());
    assert_eq!(run(by_cost), baseline);
    assert_eq!(run(reversed), baseline);
    assert_eq!(
        baseline.set_indices().collect::<Vec<_>>(),
        (0..60)
            .filter(|&i| price(i) < 50 && i % 4 != 1 && qty(i).is_none())
            .collect::<Vec<_>>()
    );
}

#[test]
fn filters_segments_in_parallel() {
    let segments = vec![segment(0..40), segment(40..41), segment(41..100)];
    let rows = selected_rows(
        &filter(Access::Sequential),
        &segments,
        &ScanOptions::default().with_batch_size(9),
    )
    .unwrap();
    assert_eq!(rows, expected(0..100));
}

#[test]
fn describes_the_tree() {
    assert_eq!(
        filter(Access::Sequential).describe(),
        "((($price < 50i64) && (($color in [\"red\", \"blue\"]) || ($qty is null))) || !(0.2f64 <= $score <= 0.8f64))"
    );
}
