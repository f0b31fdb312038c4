mod common;

use common::{bool_column, frame, int_column, ints, state, strings, users};
use filter_hopper::{col, HopperError, Predicate};

#[test]
fn filter_fires_once_its_column_is_joined_in() {
    let mut df = users();
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::greater_than(col("age"), 18));
    let df = hopper.apply_ready_filters().expect("first apply");
    assert_eq!(df.shape(), (3, 1));
    assert_eq!(state(&df).filters().len(), 1);

    let mut df = df
        .with_column("age", ints(&[25, 15, 30]))
        .expect("add age");
    let df = df.hopper().apply_ready_filters().expect("second apply");
    assert_eq!(df.shape(), (2, 2));
    assert_eq!(int_column(&df, "user_id"), vec![0, 2]);
    assert!(state(&df).filters().is_empty());
}

#[test]
fn ready_filter_prunes_before_later_joins() {
    let mut df = frame(vec![
        ("user_id", ints(&[0, 1, 2, 3])),
        ("country", strings(&["DE", "US", "DE", "FR"])),
    ]);
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::equals(col("country"), "DE"));
    hopper.add_filter(Predicate::greater_than_or_equal(col("score"), 50));
    let df = hopper.apply_ready_filters().expect("apply");
    assert_eq!(int_column(&df, "user_id"), vec![0, 2]);
    assert_eq!(
        state(&df).filters(),
        &[Predicate::greater_than_or_equal(col("score"), 50)]
    );
}

#[test]
fn missing_column_does_not_block_later_filters() {
    let mut df = frame(vec![("y", ints(&[1, 2, 3]))]);
    let mut hopper = df.hopper();
    let waiting = Predicate::is_not_null(col("x"));
    hopper.add_filter(waiting.clone());
    hopper.add_filter(Predicate::less_than(col("y"), 3));
    let out = hopper.apply_ready_filters().expect("apply");
    assert_eq!(int_column(&out, "y"), vec![1, 2]);
    assert_eq!(state(&out).filters(), &[waiting]);
}

#[test]
fn listing_preserves_insertion_order() {
    let mut df = users();
    let mut hopper = df.hopper();
    let predicates = vec![
        Predicate::greater_than(col("a"), 1),
        Predicate::in_list(col("b"), ["x", "y"]),
        Predicate::is_null(col("c")),
    ];
    hopper.add_filters(predicates.clone());
    assert_eq!(hopper.list_filters(), predicates.as_slice());
}

#[test]
fn attaching_repeatedly_keeps_the_queue() {
    let mut df = users();
    df.hopper().add_filter(Predicate::greater_than(col("age"), 18));
    for _ in 0..5 {
        let _ = df.hopper();
    }
    assert_eq!(state(&df).filters().len(), 1);
}

#[test]
fn input_and_output_share_post_apply_queue() {
    let mut df = frame(vec![("a", ints(&[1, 2, 3]))]);
    let out = {
        let mut hopper = df.hopper();
        hopper.add_filter(Predicate::greater_than(col("a"), 1));
        hopper.add_filter(Predicate::equals(col("b"), 0));
        hopper.apply_ready_filters().expect("apply")
    };
    assert_ne!(out.id(), df.id());
    assert_eq!(state(&out), state(&df));
    assert_eq!(state(&df).filters(), &[Predicate::equals(col("b"), 0)]);
}

#[test]
fn user_metadata_survives_projection() {
    let mut df = frame(vec![("a", ints(&[1, 2])), ("b", ints(&[3, 4]))]);
    df.metadata_mut().set("source", "crm");
    df.hopper().add_filter(Predicate::greater_than(col("c"), 0));
    let projected = df.select(&["b"]).expect("select");
    assert_eq!(
        projected.metadata().get("source").and_then(|v| v.as_str()),
        Some("crm")
    );
    assert_eq!(state(&projected).filters().len(), 1);
}

#[test]
fn engine_failure_surfaces_and_commits_nothing_else() {
    let mut df = frame(vec![("a", ints(&[1, 2, 3]))]);
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::greater_than(col("a"), 1));
    hopper.add_filter(Predicate::contains(col("a"), "1"));
    let err = hopper.apply_ready_filters().expect_err("contains on ints");
    match err {
        HopperError::Apply { predicate, .. } => assert!(predicate.contains("CONTAINS")),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
        hopper.list_filters(),
        &[Predicate::greater_than(col("a"), 1)]
    );
    assert_eq!(df.shape(), (3, 1));
}

#[test]
fn failed_filter_is_not_retried() {
    let mut df = frame(vec![("a", ints(&[1, 2, 3]))]);
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::contains(col("a"), "1"));
    hopper.add_filter(Predicate::greater_than(col("a"), 1));
    hopper.add_filter(Predicate::equals(col("b"), 0));
    assert!(matches!(
        hopper.apply_ready_filters(),
        Err(HopperError::Apply { .. })
    ));

    let out = hopper.apply_ready_filters().expect("second call succeeds");
    assert_eq!(int_column(&out, "a"), vec![2, 3]);
    assert_eq!(state(&out).filters(), &[Predicate::equals(col("b"), 0)]);
    let again = hopper.apply_ready_filters().expect("third call succeeds");
    assert_eq!(again.shape(), (3, 1));
}

#[test]
fn repeated_calls_on_the_same_queue_agree() {
    let source = frame(vec![
        ("a", ints(&[5, 1, 7, 3, 9])),
        ("b", strings(&["x", "y", "x", "x", "z"])),
    ]);
    let queue = vec![
        Predicate::greater_than(col("a"), 2),
        Predicate::equals(col("missing"), 1),
        Predicate::in_list(col("b"), ["x", "z"]),
        Predicate::is_not_null(col("later")),
    ];
    let run = || {
        let mut df = source.clone();
        let mut hopper = df.hopper();
        hopper.add_filters(queue.clone());
        hopper.apply_ready_filters().expect("apply")
    };
    let first = run();
    let second = run();
    assert_eq!(first.shape(), second.shape());
    assert_eq!(first.column_names(), second.column_names());
    assert_eq!(int_column(&first, "a"), int_column(&second, "a"));
    assert_eq!(state(&first), state(&second));
    assert_eq!(int_column(&first, "a"), vec![5, 7, 3, 9]);
    assert_eq!(state(&first).filters().len(), 2);
}

#[test]
fn derived_column_feeds_filter_in_the_same_call() {
    let mut df = frame(vec![
        ("provider", strings(&["AWS us-east", "GCP", "AWS eu-west"])),
        ("cost", ints(&[10, 20, 30])),
    ]);
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::equals(col("is_amazon"), true));
    hopper.add_column("is_amazon", Predicate::contains(col("provider"), "AWS"));
    let out = hopper.apply_ready().expect("apply");
    assert_eq!(int_column(&out, "cost"), vec![10, 30]);
    assert_eq!(bool_column(&out, "is_amazon"), vec![Some(true), Some(true)]);
    assert!(state(&out).is_empty());
    assert!(state(&df).is_empty());
}

#[test]
fn filters_alone_ignore_pending_columns() {
    let mut df = frame(vec![("cost", ints(&[10, 20]))]);
    let mut hopper = df.hopper();
    hopper.add_column("cheap", Predicate::less_than(col("cost"), 15));
    hopper.add_filter(Predicate::equals(col("cheap"), true));
    let out = hopper.apply_ready_filters().expect("apply");
    assert_eq!(out.id(), df.id());
    assert_eq!(state(&out).filters().len(), 1);
    assert_eq!(state(&out).columns().len(), 1);
}

#[test]
fn null_rows_are_dropped_by_comparisons() {
    let mut df = frame(vec![(
        "age",
        std::sync::Arc::new(arrow::array::Int64Array::from(vec![Some(40), None, Some(10)]))
            as arrow::array::ArrayRef,
    )]);
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::greater_than(col("age"), 18));
    let out = hopper.apply_ready_filters().expect("apply");
    assert_eq!(out.num_rows(), 1);
}

#[test]
fn random_queues_apply_like_sequential_filters() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let names = ["a", "b", "c", "d"];
    for _ in 0..64 {
        let rows = rng.usize(1..32);
        let present: Vec<&str> = names.iter().copied().filter(|_| rng.bool()).collect();
        let columns: Vec<_> = present
            .iter()
            .map(|name| {
                let values: Vec<i64> = (0..rows).map(|_| rng.i64(0..10)).collect();
                (*name, ints(&values))
            })
            .collect();
        if columns.is_empty() {
            continue;
        }
        let mut df = frame(columns);
        let queue: Vec<Predicate> = (0..rng.usize(1..6))
            .map(|_| {
                let name = names[rng.usize(..names.len())];
                Predicate::greater_than(col(name), rng.i64(0..10))
            })
            .collect();

        let mut expected = df.clone();
        let mut expected_pending = Vec::new();
        for predicate in &queue {
            let ready = predicate
                .required_columns()
                .iter()
                .all(|name| expected.has_column(name));
            if ready {
                expected = expected.filter(predicate).expect("sequential filter");
            } else {
                expected_pending.push(predicate.clone());
            }
        }

        let mut hopper = df.hopper();
        hopper.add_filters(queue);
        let out = hopper.apply_ready_filters().expect("apply");
        assert_eq!(out.shape(), expected.shape());
        for name in &present {
            assert_eq!(int_column(&out, name), int_column(&expected, name));
        }
        assert_eq!(state(&out).filters(), expected_pending.as_slice());
    }
}
