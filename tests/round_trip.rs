//! # Round Trip Tests
//!
//! Application rows written through `RowWriter` into an in-memory table and
//! read back with `read_all_with`. Every scenario uses its own compiler so
//! cache counts are deterministic.
//!
//! - Scalars: integers, floats, strings, blobs, temporal types, UUIDs
//! - Nulls: `Option`, sentinel primitives, NULL parents
//! - Containers: lists (including empty and overlapping), fixed arrays
//! - Enums in ordinal and text mode, flags, nested structs
//! - Batch boundaries at 0, 2048 and 2049 rows
//! - Tables with extra or missing columns

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use duckrow::{
    mapped_enum, mapped_flags, mapped_primitive, mapped_struct, read_all_with, Arena, Blob,
    ChunkCollection, CodecCompiler, DataChunk, Interval, LogicalType, MappingError, Primitive,
    PrimitiveKind, RowWriter, StructField, StructuralType, TypeMapper,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn round_trip<T>(compiler: &CodecCompiler, rows: &[T]) -> (Vec<T>, usize)
where
    T: duckrow::Mapped,
{
    let mut writer = RowWriter::<T>::with_compiler(compiler).unwrap();
    let mut table = ChunkCollection::for_type(writer.structural_type());
    let written = writer.write_all(rows, &mut table).unwrap();
    assert_eq!(written, rows.len());
    let chunks = table.chunk_count();
    (read_all_with(compiler, &mut table).unwrap(), chunks)
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tagged {
        id: i32,
        tags: Option<Vec<String>>,
    }
}

#[test]
fn lists_keep_null_and_empty_rows_apart() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let rows = vec![
        Tagged { id: 1, tags: Some(vec!["a".into(), "bb".into()]) },
        Tagged { id: 2, tags: None },
        Tagged { id: 3, tags: Some(Vec::new()) },
    ];
    let (back, chunks) = round_trip(&compiler, &rows);
    assert_eq!(back, rows);
    assert_eq!(chunks, 1);
}

#[test]
fn batches_split_at_the_vector_size() {
    init_tracing();
    let compiler = CodecCompiler::new();
    for (count, expected_chunks) in [(0usize, 0usize), (2048, 1), (2049, 2)] {
        let rows: Vec<Tagged> = (0..count)
            .map(|i| Tagged {
                id: i as i32,
                tags: (i % 3 != 0).then(|| vec![format!("tag-{}", i)]),
            })
            .collect();
        let (back, chunks) = round_trip(&compiler, &rows);
        assert_eq!(chunks, expected_chunks, "{} rows", count);
        assert_eq!(back, rows);
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Event {
        id: Uuid,
        day: NaiveDate,
        at: Option<NaiveTime>,
        logged: NaiveDateTime,
        seen: Option<DateTime<Utc>>,
        span: Interval,
        payload: Blob,
        big: i128,
        ok: bool,
        ratio: f32,
        label: Option<String>,
    }
}

#[test]
fn scalars_survive_the_trip() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let day = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
    let rows = vec![
        Event {
            id: Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef),
            day,
            at: NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999),
            logged: day.and_hms_micro_opt(12, 30, 0, 5).unwrap(),
            seen: Some(Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap()),
            span: Interval::new(14, -3, 1_500_000),
            payload: Blob(vec![0, 159, 146, 150, 0xff, 0, 1, 2, 3, 4, 5, 6, 7]),
            big: -170_141_183_460_469_231_731_687_303_715_884_105_728,
            ok: true,
            ratio: 0.25,
            label: Some("an unusually long label that leaves the inline form".into()),
        },
        Event {
            id: Uuid::nil(),
            day: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            at: None,
            logged: NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            seen: None,
            span: Interval::default(),
            payload: Blob(Vec::new()),
            big: 0,
            ok: false,
            ratio: -1.5,
            label: Some(String::new()),
        },
    ];
    let (back, _) = round_trip(&compiler, &rows);
    assert_eq!(back, rows);
}

/// Temperature where `i16::MIN` means "no reading".
#[derive(Debug, Clone, Copy, PartialEq)]
struct Celsius(i16);

impl Default for Celsius {
    fn default() -> Self {
        Celsius(i16::MIN)
    }
}

impl Primitive for Celsius {
    type Native = i16;
    const KIND: PrimitiveKind = PrimitiveKind::SmallInt;
    const SENTINEL: bool = true;

    fn to_native(&self, _arena: &mut Arena) -> duckrow::eyre::Result<i16> {
        Ok(self.0)
    }

    fn from_native(native: &i16) -> duckrow::eyre::Result<Self> {
        Ok(Celsius(*native))
    }

    fn is_nullish(&self) -> bool {
        self.0 == i16::MIN
    }

    fn nullish() -> Option<Self> {
        Some(Celsius::default())
    }
}

mapped_primitive!(Celsius);

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Station {
        name: String,
        temperature: Celsius,
        history: Vec<Celsius>,
    }
}

#[test]
fn sentinel_primitives_become_nulls() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let rows = vec![
        Station {
            name: "north".into(),
            temperature: Celsius(-12),
            history: vec![Celsius(-10), Celsius::default(), Celsius(-14)],
        },
        Station {
            name: "south".into(),
            temperature: Celsius::default(),
            history: Vec::new(),
        },
    ];

    let mut writer = RowWriter::<Station>::with_compiler(&compiler).unwrap();
    let chunk = writer.fill_chunk(&mut rows.iter()).unwrap();
    assert_eq!(chunk.size(), 2);
    assert!(!chunk.vector(1).unwrap().is_valid(1));
    assert!(!chunk.vector(2).unwrap().list_child().unwrap().is_valid(1));

    let (back, _) = round_trip(&compiler, &rows);
    assert_eq!(back, rows);
}

mapped_enum! {
    #[derive(Debug)]
    enum Status: u8 { Pending, Shipped = 5, Returned }
}

mapped_enum! {
    #[derive(Debug)]
    enum Channel: u8 as text { Web, Store, Phone }
}

mapped_flags! {
    #[derive(Debug)]
    struct Perms: u8 {
        const READ = 1;
        const WRITE = 2;
        const ADMIN = 128;
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Customer {
        name: String,
        since: Option<NaiveDate>,
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Order {
        id: i64,
        status: Status,
        channel: Option<Channel>,
        perms: Perms,
        customer: Option<Customer>,
        position: [f64; 2],
        lines: Vec<Option<Customer>>,
    }
}

#[test]
fn nested_rows_round_trip() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let ada = Customer {
        name: "ada".into(),
        since: NaiveDate::from_ymd_opt(2015, 6, 1),
    };
    let rows = vec![
        Order {
            id: 1,
            status: Status::Returned,
            channel: Some(Channel::Phone),
            perms: Perms::READ | Perms::ADMIN,
            customer: Some(ada.clone()),
            position: [1.5, -2.25],
            lines: vec![Some(ada), None],
        },
        Order {
            id: 2,
            status: Status::Pending,
            channel: None,
            perms: Perms::empty(),
            customer: None,
            position: [0.0, 0.0],
            lines: Vec::new(),
        },
    ];

    let ty = TypeMapper::new().structural_type::<Order>().unwrap();
    assert_eq!(
        ty.field("status").unwrap().ty,
        StructuralType::primitive(PrimitiveKind::UTinyInt)
    );
    assert_eq!(
        ty.field("channel").unwrap().ty,
        StructuralType::primitive(PrimitiveKind::Varchar)
    );

    let (back, _) = round_trip(&compiler, &rows);
    assert_eq!(back, rows);
}

#[test]
fn undeclared_flag_bits_are_not_written() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let rows = vec![Order {
        perms: Perms::READ | Perms::from_bits_retain(4),
        ..Order::default()
    }];
    let mut writer = RowWriter::<Order>::with_compiler(&compiler).unwrap();
    let mut table = ChunkCollection::for_type(writer.structural_type());

    let err = writer.write_all(&rows, &mut table).unwrap_err();
    assert_eq!(
        err.downcast_ref::<MappingError>(),
        Some(&MappingError::EnumOutOfRange {
            type_name: "Perms".into(),
            value: 5,
            max_ordinal: 131,
        })
    );
    assert_eq!(table.row_count(), 0);
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Window {
        window: Vec<i32>,
    }
}

#[test]
fn overlapping_list_entries_read_their_own_ranges() {
    init_tracing();
    let ty = StructuralType::structure([StructField::new(
        "window",
        StructuralType::list(StructuralType::primitive(PrimitiveKind::Integer)),
    )]);
    let mut chunk = DataChunk::for_type(&ty);
    {
        let vector = chunk.vector_mut(0).unwrap();
        vector.list_reserve(5).unwrap();
        vector.list_child_mut().unwrap().data_mut::<i32>().unwrap()[..5]
            .copy_from_slice(&[1, 2, 3, 4, 5]);
        vector.set_list_size(5).unwrap();
        let entries = vector.data_mut::<duckrow::vector::ListEntry>().unwrap();
        entries[0] = duckrow::vector::ListEntry::new(0, 3);
        entries[1] = duckrow::vector::ListEntry::new(1, 3);
        entries[2] = duckrow::vector::ListEntry::new(2, 3);
    }
    chunk.set_size(3).unwrap();
    let mut table = ChunkCollection::for_type(&ty);
    table.push_chunk(chunk).unwrap();

    let rows: Vec<Window> = read_all_with(&CodecCompiler::new(), &mut table).unwrap();
    let windows: Vec<Vec<i32>> = rows.into_iter().map(|w| w.window).collect();
    assert_eq!(windows, [vec![1, 2, 3], vec![2, 3, 4], vec![3, 4, 5]]);
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Narrow {
        id: i64,
        note: Option<String>,
    }
}

fn table_with(fields: Vec<StructField>, fill: impl FnOnce(&mut DataChunk)) -> ChunkCollection {
    let ty = StructuralType::structure(fields);
    let mut chunk = DataChunk::for_type(&ty);
    fill(&mut chunk);
    let mut table = ChunkCollection::for_type(&ty);
    table.push_chunk(chunk).unwrap();
    table
}

#[test]
fn extra_columns_are_ignored_when_reading() {
    init_tracing();
    let mut table = table_with(
        vec![
            StructField::new("extra", StructuralType::primitive(PrimitiveKind::Double)),
            StructField::new("id", StructuralType::primitive(PrimitiveKind::BigInt)),
        ],
        |chunk| {
            chunk.vector_mut(1).unwrap().data_mut::<i64>().unwrap()[..2].copy_from_slice(&[10, 20]);
            chunk.set_size(2).unwrap();
        },
    );
    let rows: Vec<Narrow> = read_all_with(&CodecCompiler::new(), &mut table).unwrap();
    assert_eq!(
        rows,
        [
            Narrow { id: 10, note: None },
            Narrow { id: 20, note: None }
        ]
    );
}

#[test]
fn missing_required_columns_fail_before_any_row() {
    init_tracing();
    let mut table = table_with(
        vec![StructField::new(
            "note",
            StructuralType::primitive(PrimitiveKind::Varchar),
        )],
        |chunk| chunk.set_size(0).unwrap(),
    );
    let err = read_all_with::<Narrow, _>(&CodecCompiler::new(), &mut table).unwrap_err();
    assert!(
        err.chain()
            .any(|cause| cause.to_string().contains("non-nullable member 'id'")),
        "{:#}",
        err
    );
}

#[test]
fn writers_reject_tables_of_another_shape() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let table = StructuralType::structure([StructField::new(
        "id",
        StructuralType::primitive(PrimitiveKind::Integer),
    )]);
    let err = RowWriter::<Narrow>::for_table(&compiler, &table).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<MappingError>(),
        Some(MappingError::IncompatibleType { .. })
    ));

    let exact = TypeMapper::new().structural_type::<Narrow>().unwrap();
    assert!(RowWriter::<Narrow>::for_table(&compiler, &exact).is_ok());
}

#[test]
fn scalar_rows_use_one_column() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let rows: Vec<Option<Vec<u16>>> = vec![Some(vec![1, 2]), None, Some(vec![])];
    let mut writer = RowWriter::<Option<Vec<u16>>>::with_compiler(&compiler).unwrap();
    let mut table = ChunkCollection::for_type(writer.structural_type());
    writer.write_all(&rows, &mut table).unwrap();
    assert_eq!(
        table.chunks().next().unwrap().column_types(),
        [LogicalType::list(LogicalType::Primitive(PrimitiveKind::USmallInt))]
    );

    let back: Vec<Option<Vec<u16>>> = read_all_with(&compiler, &mut table).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn codecs_are_reused_across_writers_and_readers() {
    init_tracing();
    let compiler = CodecCompiler::new();
    let rows = vec![Tagged { id: 9, tags: Some(vec!["x".into()]) }];

    round_trip(&compiler, &rows);
    let compiled = compiler.compiled_count();
    let cached = compiler.cached_count();
    assert!(compiled > 0);

    round_trip(&compiler, &rows);
    assert_eq!(compiler.compiled_count(), compiled);
    assert_eq!(compiler.cached_count(), cached);
}
