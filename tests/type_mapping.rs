//! # Type Mapping Tests
//!
//! Mapping application types to structural types through the public API:
//! recursion, enum widths, table definitions and member direction rules.

use std::sync::Arc;

use duckrow::{
    create_table_sql, impl_mapped_enum, impl_mapped_struct, mapped_enum, mapped_struct,
    read_all_with, table_columns, ChunkCollection, CodecCompiler, Mapped, MappedEnum,
    MappingError, PrimitiveKind, ResultSource, RowWriter, StructField, StructuralType,
    TypeMapper,
};

fn mapping_error(report: &duckrow::eyre::Report) -> &MappingError {
    report
        .downcast_ref::<MappingError>()
        .unwrap_or_else(|| panic!("not a mapping error: {:?}", report))
}

mapped_struct! {
    #[derive(Debug, Clone, Default)]
    struct Tree {
        label: String,
        children: Vec<Tree>,
    }
}

#[test]
fn recursive_types_name_their_cycle() {
    let err = RowWriter::<Tree>::with_compiler(&CodecCompiler::new())
        .err()
        .unwrap();
    assert_eq!(
        mapping_error(&err),
        &MappingError::RecursiveType {
            cycle: vec!["Tree".into(), "Vec<Tree>".into(), "Tree".into()],
        }
    );
    assert!(err
        .chain()
        .any(|cause| cause.to_string() == "recursive type: Tree -> Vec<Tree> -> Tree"));
}

mapped_enum! {
    #[derive(Debug)]
    enum Tiny: u8 { A, B = 127 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Short: u16 { A, B = 128 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Long: u32 { A, B = 32_768 }
}

#[test]
fn enum_width_follows_the_largest_member() {
    let mut mapper = TypeMapper::new();
    assert_eq!(
        mapper.structural_type::<Tiny>().unwrap(),
        StructuralType::primitive(PrimitiveKind::UTinyInt)
    );
    assert_eq!(
        mapper.structural_type::<Short>().unwrap(),
        StructuralType::primitive(PrimitiveKind::USmallInt)
    );
    assert_eq!(
        mapper.structural_type::<Long>().unwrap(),
        StructuralType::primitive(PrimitiveKind::UInteger)
    );
}

/// Declares a member that does not fit the widest column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Oversized(u32);

impl MappedEnum for Oversized {
    type Repr = u32;

    fn members() -> &'static [(&'static str, i64)] {
        &[("Small", 0), ("Huge", 1 << 32)]
    }

    fn ordinal(&self) -> i64 {
        self.0 as i64
    }

    fn from_ordinal(ordinal: i64) -> Option<Self> {
        u32::try_from(ordinal).ok().map(Oversized)
    }
}

impl_mapped_enum!(Oversized);

#[test]
fn enum_members_beyond_32_bits_are_rejected() {
    let err = TypeMapper::new().structural_type::<Oversized>().unwrap_err();
    assert!(matches!(
        mapping_error(&err),
        MappingError::UnsupportedConstruct { type_name, .. } if type_name == "Oversized"
    ));
    assert!(CodecCompiler::new().writer::<Oversized>().is_err());
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Account {
        id: i64,
        name: String as "display_name",
        tags: Option<Vec<String>>,
        embedding: [f32; 3],
        tier: Option<Tiny>,
        billing: Option<Address>,
    }
}

#[test]
fn table_definitions_follow_the_mapping() {
    assert_eq!(
        create_table_sql::<Account>("accounts").unwrap(),
        concat!(
            r#"CREATE TABLE "accounts" ("id" BIGINT NOT NULL, "display_name" VARCHAR NOT NULL, "#,
            r#""tags" VARCHAR[], "embedding" FLOAT[3] NOT NULL, "tier" UTINYINT, "#,
            r#""billing" STRUCT("city" VARCHAR, "zip" UINTEGER))"#
        )
    );

    let columns = table_columns::<Account>().unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        ["id", "display_name", "tags", "embedding", "tier", "billing"]
    );
}

#[test]
fn tables_report_the_type_they_were_created_for() {
    let ty = TypeMapper::new().structural_type::<Account>().unwrap();
    let table = ChunkCollection::for_type(&ty);
    assert_eq!(table.structural_type(), ty);
    assert_eq!(table.structural_type().content_hash(), ty.content_hash());
}

#[test]
fn equal_types_are_shared() {
    let a = TypeMapper::new().structural_type::<Address>().unwrap();
    let b = StructuralType::structure([
        StructField::new("city", StructuralType::primitive(PrimitiveKind::Varchar)),
        StructField::new("zip", StructuralType::primitive(PrimitiveKind::UInteger)),
    ]);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), r#"STRUCT("city" VARCHAR, "zip" UINTEGER)"#);

    let fields = TypeMapper::new().declared_fields::<Address>().unwrap();
    let again = TypeMapper::new().declared_fields::<Address>().unwrap();
    assert!(Arc::ptr_eq(&fields, &again));
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Receipt {
    number: i32,
    total: f64,
}

impl_mapped_struct!(Receipt { number, readonly total as "grand_total" });

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct ReceiptNumber {
        number: i32,
    }
}

#[test]
fn readonly_members_are_written_but_never_read() {
    let compiler = CodecCompiler::new();
    let rows = vec![
        Receipt { number: 1, total: 9.5 },
        Receipt { number: 2, total: 0.0 },
    ];
    let mut writer = RowWriter::<Receipt>::with_compiler(&compiler).unwrap();
    assert_eq!(
        writer.structural_type().to_string(),
        r#"STRUCT("number" INTEGER, "grand_total" DOUBLE)"#
    );

    let mut table = ChunkCollection::for_type(writer.structural_type());
    writer.write_all(&rows, &mut table).unwrap();
    assert_eq!(
        table.chunks().next().unwrap().vector(1).unwrap().data::<f64>().unwrap()[0],
        9.5
    );

    let err = read_all_with::<Receipt, _>(&compiler, &mut table).unwrap_err();
    assert!(matches!(
        mapping_error(&err),
        MappingError::UnsupportedConstruct { .. }
    ));

    // a type without the member reads the same table, ignoring the column
    let mut table = ChunkCollection::for_type(writer.structural_type());
    writer.write_all(&rows, &mut table).unwrap();
    let numbers: Vec<ReceiptNumber> = read_all_with(&compiler, &mut table).unwrap();
    assert_eq!(numbers, [ReceiptNumber { number: 1 }, ReceiptNumber { number: 2 }]);
}

#[test]
fn nullability_comes_from_the_application_type() {
    assert!(!<i32 as Mapped>::NULLABLE);
    assert!(<Option<i32> as Mapped>::NULLABLE);
    assert!(<Option<Address> as Mapped>::TRANSPARENT);
    assert!(!<Vec<Address> as Mapped>::TRANSPARENT);
}
