mod common;

use bytes::Bytes;
use common::{frame, int_column, ints, state, strings};
use filter_hopper::{
    col, EncodingError, FilterFormat, Frame, HopperError, Predicate, SerializedFilter,
};
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};

fn sample_queue() -> Vec<Predicate> {
    vec![
        Predicate::greater_than(col("age"), 18),
        Predicate::in_list(col("tier"), ["gold", "silver"]),
        Predicate::not(Predicate::is_null(col("email"))),
        Predicate::less_than(col("score"), 7.5).or(Predicate::contains(col("tier"), "gold")),
    ]
}

fn customers() -> Frame {
    let score: arrow::array::ArrayRef =
        std::sync::Arc::new(arrow::array::Float64Array::from(vec![9.0, 3.0, 5.0, 8.0]));
    let email: arrow::array::ArrayRef = std::sync::Arc::new(arrow::array::StringArray::from(
        vec![Some("a@x"), None, Some("c@x"), Some("d@x")],
    ));
    frame(vec![
        ("id", ints(&[1, 2, 3, 4])),
        ("age", ints(&[30, 40, 12, 50])),
        ("tier", strings(&["gold", "silver", "gold", "bronze"])),
        ("email", email),
        ("score", score),
    ])
}

fn round_trip_applies_identically(format: FilterFormat) {
    let mut original = customers();
    original.hopper().add_filters(sample_queue());
    let encoded = original
        .hopper()
        .serialize_filters(format)
        .expect("serialize");
    assert!(encoded.iter().all(|item| item.format() == format));

    let mut restored = customers();
    restored
        .hopper()
        .deserialize_filters(&encoded, format)
        .expect("deserialize");
    assert_eq!(state(&restored).filters(), sample_queue().as_slice());

    let expected = original.hopper().apply_ready_filters().expect("apply");
    let actual = restored.hopper().apply_ready_filters().expect("apply");
    assert_eq!(int_column(&actual, "id"), int_column(&expected, "id"));
    assert_eq!(int_column(&actual, "id"), vec![1]);
}

#[test]
fn binary_round_trip_applies_identically() {
    round_trip_applies_identically(FilterFormat::Binary);
}

#[test]
fn json_round_trip_applies_identically() {
    round_trip_applies_identically(FilterFormat::Json);
}

#[test]
fn mismatched_item_leaves_queue_untouched() {
    let mut df = customers();
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::greater_than(col("age"), 21));
    let mut items = hopper
        .serialize_filters(FilterFormat::Json)
        .expect("serialize");
    items.push(SerializedFilter::Binary(vec![1, 2, 3]));

    let err = hopper
        .deserialize_filters(&items, FilterFormat::Json)
        .expect_err("format mismatch");
    assert!(matches!(
        err,
        HopperError::Encoding(EncodingError::FormatMismatch { index: 1, .. })
    ));
    assert_eq!(
        hopper.list_filters(),
        &[Predicate::greater_than(col("age"), 21)]
    );
}

#[test]
fn deserialize_replaces_rather_than_appends() {
    let mut df = customers();
    let mut hopper = df.hopper();
    hopper.add_filter(Predicate::is_null(col("email")));
    let replacement = [Predicate::equals(col("tier"), "gold")];
    let items = filter_hopper::codec::encode_all(&replacement, FilterFormat::Binary)
        .expect("encode");
    hopper
        .deserialize_filters(&items, FilterFormat::Binary)
        .expect("deserialize");
    assert_eq!(hopper.list_filters(), &replacement);
}

#[test]
fn record_batch_export_carries_the_queue() {
    let mut df = customers();
    df.metadata_mut().set("owner", "growth");
    {
        let mut hopper = df.hopper();
        hopper.add_filters(sample_queue());
        hopper.add_column("adult", Predicate::greater_than_or_equal(col("age"), 18));
    }
    let batch = df.to_record_batch().expect("export");
    assert!(batch.schema().metadata().contains_key("hopper_filters"));

    let restored = Frame::from_record_batch(batch).expect("import");
    assert_eq!(restored.metadata(), df.metadata());
    assert!(restored.batch().schema().metadata().is_empty());
}

#[test]
fn queue_survives_a_parquet_file() {
    let mut df = customers().select(&["id", "age"]).expect("select");
    df.hopper()
        .add_filter(Predicate::greater_than(col("age"), 18));
    df.hopper()
        .add_filter(Predicate::equals(col("tier"), "gold"));
    let batch = df.to_record_batch().expect("export");

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None).expect("writer");
    writer.write(&batch).expect("write");
    writer.close().expect("close");

    let mut reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(buffer))
        .expect("reader builder")
        .build()
        .expect("reader");
    let read_back = reader.next().expect("one batch").expect("decode batch");

    let mut restored = Frame::from_record_batch(read_back).expect("import");
    assert_eq!(state(&restored).filters().len(), 2);
    let out = restored.hopper().apply_ready_filters().expect("apply");
    assert_eq!(int_column(&out, "id"), vec![1, 2, 4]);
    assert_eq!(
        state(&out).filters(),
        &[Predicate::equals(col("tier"), "gold")]
    );
}
