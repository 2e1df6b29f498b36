use chrono::{DateTime, NaiveDate, Utc};
use smallvec::SmallVec;
use uuid::Uuid;

use super::*;
use crate::types::{Blob, Interval, PrimitiveKind, StructField};

fn prim(kind: PrimitiveKind) -> StructuralType {
    StructuralType::primitive(kind)
}

fn sql_of<T: Mapped>() -> String {
    TypeMapper::new().structural_type::<T>().unwrap().to_string()
}

fn mapping_error(report: &eyre::Report) -> &MappingError {
    report
        .downcast_ref::<MappingError>()
        .unwrap_or_else(|| panic!("not a mapping error: {:?}", report))
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Address {
        street: String,
        zip: Option<u32> as "postal_code",
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Customer {
        id: i64,
        name: String,
        address: Option<Address>,
        tags: Vec<String>,
        scores: [f64; 3],
        joined: Option<NaiveDate>,
    }
}

#[test]
fn primitives_map_to_their_kind() {
    assert_eq!(sql_of::<bool>(), "BOOLEAN");
    assert_eq!(sql_of::<i128>(), "HUGEINT");
    assert_eq!(sql_of::<u16>(), "USMALLINT");
    assert_eq!(sql_of::<String>(), "VARCHAR");
    assert_eq!(sql_of::<Blob>(), "BLOB");
    assert_eq!(sql_of::<Interval>(), "INTERVAL");
    assert_eq!(sql_of::<Uuid>(), "UUID");
    assert_eq!(sql_of::<DateTime<Utc>>(), "TIMESTAMP WITH TIME ZONE");
}

#[test]
fn containers_map_to_lists_and_arrays() {
    assert_eq!(sql_of::<Vec<i32>>(), "INTEGER[]");
    assert_eq!(sql_of::<Box<[String]>>(), "VARCHAR[]");
    assert_eq!(sql_of::<SmallVec<[u8; 4]>>(), "UTINYINT[]");
    assert_eq!(sql_of::<Vec<u8>>(), "UTINYINT[]");
    assert_eq!(sql_of::<[f32; 4]>(), "FLOAT[4]");
    assert_eq!(sql_of::<Vec<Vec<i64>>>(), "BIGINT[][]");
    assert_eq!(sql_of::<Option<Box<i32>>>(), "INTEGER");
}

#[test]
fn structs_map_members_in_declaration_order() {
    assert_eq!(
        sql_of::<Customer>(),
        concat!(
            r#"STRUCT("id" BIGINT, "name" VARCHAR, "#,
            r#""address" STRUCT("street" VARCHAR, "postal_code" UINTEGER), "#,
            r#""tags" VARCHAR[], "scores" DOUBLE[3], "joined" DATE)"#
        )
    );
}

#[test]
fn structural_types_are_shared_with_the_intern_table() {
    let mut mapper = TypeMapper::new();
    let a = mapper.structural_type::<Address>().unwrap();
    let b = StructuralType::structure([
        StructField::new("street", prim(PrimitiveKind::Varchar)),
        StructField::new("postal_code", prim(PrimitiveKind::UInteger)),
    ]);
    assert_eq!(a, b);
    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn declared_fields_carry_nullability_and_types() {
    let mut mapper = TypeMapper::new();
    let fields = mapper.declared_fields::<Customer>().unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["id", "name", "address", "tags", "scores", "joined"]);
    assert!(!fields[0].nullable());
    assert!(fields[2].nullable());
    assert_eq!(fields[2].type_name(), "Option<Address>");
    assert_eq!(fields[3].structural_type().to_string(), "VARCHAR[]");

    let again = mapper.declared_fields::<Customer>().unwrap();
    assert!(std::sync::Arc::ptr_eq(&fields, &again));
}

#[test]
fn fields_follow_the_order_of_a_query_type() {
    let query = StructuralType::structure([
        StructField::new("name", prim(PrimitiveKind::Varchar)),
        StructField::new("extra", prim(PrimitiveKind::Integer)),
        StructField::new("id", prim(PrimitiveKind::BigInt)),
    ]);
    let mut mapper = TypeMapper::new();
    let fields = mapper.fields::<Customer>(Some(&query)).unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].as_ref().map(|f| f.name()), Some("name"));
    assert!(fields[1].is_none());
    assert_eq!(fields[2].as_ref().map(|f| f.name()), Some("id"));
    assert_eq!(
        fields[2].as_ref().and_then(|f| f.bound_type()),
        Some(&prim(PrimitiveKind::BigInt))
    );

    let missing: Vec<String> = mapper
        .missing_fields::<Customer>(&query)
        .unwrap()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(missing, ["address", "tags", "scores", "joined"]);
}

#[test]
fn field_ids_identify_members() {
    let mut mapper = TypeMapper::new();
    let customer = mapper.declared_fields::<Customer>().unwrap();
    let address = mapper.declared_fields::<Address>().unwrap();
    assert_eq!(customer[1].id(), customer[1].clone().id());
    assert_ne!(customer[0].id(), customer[1].id());
    assert_eq!(address[1].id().member, Member::Named("zip"));
    assert_eq!(address[1].name(), "postal_code");
}

#[test]
fn reads_tolerate_extra_columns_and_missing_nullable_members() {
    let query = StructuralType::structure([
        StructField::new("street", prim(PrimitiveKind::Varchar)),
        StructField::new("country", prim(PrimitiveKind::Varchar)),
    ]);
    let mut mapper = TypeMapper::new();
    mapper
        .check_compatible::<Address>(&query, Direction::Read)
        .unwrap();

    let err = mapper
        .check_compatible::<Address>(&query, Direction::Write)
        .unwrap_err();
    assert!(matches!(
        mapping_error(&err),
        MappingError::IncompatibleType { .. }
    ));
}

#[test]
fn reads_require_non_nullable_members() {
    let query = StructuralType::structure([StructField::new(
        "postal_code",
        prim(PrimitiveKind::UInteger),
    )]);
    let err = TypeMapper::new()
        .check_compatible::<Address>(&query, Direction::Read)
        .unwrap_err();
    assert!(err.to_string().contains("non-nullable member 'street'"));
}

#[test]
fn primitive_kinds_must_match_exactly() {
    let query = StructuralType::structure([
        StructField::new("street", prim(PrimitiveKind::Varchar)),
        StructField::new("postal_code", prim(PrimitiveKind::BigInt)),
    ]);
    let err = TypeMapper::new()
        .check_compatible::<Address>(&query, Direction::Read)
        .unwrap_err();
    match mapping_error(&err) {
        MappingError::IncompatibleType {
            application,
            structural,
            ..
        } => {
            assert_eq!(application, "u32");
            assert_eq!(structural, "BIGINT");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn array_lengths_must_match() {
    let mut mapper = TypeMapper::new();
    let four = StructuralType::fixed_array(prim(PrimitiveKind::Double), 4);
    assert!(mapper
        .check_compatible::<[f64; 3]>(&four, Direction::Read)
        .is_err());
    let three = StructuralType::fixed_array(prim(PrimitiveKind::Double), 3);
    mapper
        .check_compatible::<[f64; 3]>(&three, Direction::Read)
        .unwrap();
    let list = StructuralType::list(prim(PrimitiveKind::Double));
    assert!(mapper
        .check_compatible::<[f64; 3]>(&list, Direction::Read)
        .is_err());
}

#[test]
fn nullable_array_elements_are_unsupported() {
    let err = TypeMapper::new()
        .structural_type::<[Option<i32>; 2]>()
        .unwrap_err();
    assert!(matches!(
        mapping_error(&err),
        MappingError::UnsupportedConstruct { .. }
    ));
}

mapped_struct! {
    #[derive(Debug, Clone, Default)]
    struct Node {
        value: i32,
        children: Vec<Node>,
    }
}

mapped_struct! {
    #[derive(Debug, Clone, Default)]
    struct Chain {
        value: i32,
        next: Option<Box<Chain>>,
    }
}

#[test]
fn recursion_through_a_list_names_the_cycle() {
    let err = TypeMapper::new().structural_type::<Node>().unwrap_err();
    match mapping_error(&err) {
        MappingError::RecursiveType { cycle } => {
            assert_eq!(cycle, &["Node", "Vec<Node>", "Node"]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.to_string(), "recursive type: Node -> Vec<Node> -> Node");
}

#[test]
fn option_and_box_are_transparent_in_cycles() {
    let err = TypeMapper::new().structural_type::<Chain>().unwrap_err();
    assert_eq!(err.to_string(), "recursive type: Chain -> Chain");

    // a failed mapping leaves nothing cached
    assert!(TypeMapper::new().structural_type::<Chain>().is_err());
}

mapped_enum! {
    #[derive(Debug)]
    enum Small: u8 { A, B, C = 5 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Medium: u16 { A, B = 130 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Large: u32 { A, B = 40_000 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Named: u8 as text { Red, Green }
}

mapped_enum! {
    #[derive(Debug)]
    enum Signed: i8 { Below = -1, Zero = 0 }
}

mapped_enum! {
    #[derive(Debug)]
    enum Wide: u64 { A, B }
}

#[test]
fn enums_use_the_smallest_unsigned_width() {
    assert_eq!(sql_of::<Small>(), "UTINYINT");
    assert_eq!(sql_of::<Medium>(), "USMALLINT");
    assert_eq!(sql_of::<Large>(), "UINTEGER");
    assert_eq!(sql_of::<Named>(), "VARCHAR");
    assert_eq!(EnumInfo::of::<Small>().unwrap().max_ordinal, 5);
}

#[test]
fn negative_and_wide_enums_are_rejected() {
    for err in [
        TypeMapper::new().structural_type::<Signed>().unwrap_err(),
        TypeMapper::new().structural_type::<Wide>().unwrap_err(),
    ] {
        assert!(matches!(
            mapping_error(&err),
            MappingError::UnsupportedConstruct { .. }
        ));
    }
}

#[test]
fn enum_labels_resolve_declared_and_anonymous_members() {
    assert_eq!(resolve_label::<Small>("C"), Some(Small::C));
    assert_eq!(resolve_label::<Small>("__anonymous_1"), Some(Small::B));
    assert_eq!(resolve_label::<Small>("__anonymous_3"), None);
    assert_eq!(resolve_label::<Small>("D"), None);
    assert_eq!(label_of(&Medium::B), "B");
    assert_eq!(anonymous_label(7), "__anonymous_7");
}

#[test]
fn enums_read_from_native_enum_and_varchar_columns() {
    let mut mapper = TypeMapper::new();
    let native = StructuralType::enumeration(["C", "A"]);
    mapper
        .check_compatible::<Small>(&native, Direction::Read)
        .unwrap();
    assert!(mapper
        .check_compatible::<Small>(&native, Direction::Write)
        .is_err());

    let unknown = StructuralType::enumeration(["A", "Z"]);
    assert!(mapper
        .check_compatible::<Small>(&unknown, Direction::Read)
        .is_err());

    mapper
        .check_compatible::<Small>(&prim(PrimitiveKind::Varchar), Direction::Read)
        .unwrap();
    assert!(mapper
        .check_compatible::<Small>(&prim(PrimitiveKind::USmallInt), Direction::Read)
        .is_err());
}

mapped_flags! {
    #[derive(Debug)]
    struct Access: u8 {
        const READ = 1;
        const WRITE = 2;
        const ALL = 3;
        const EXEC = 4;
        const RUN = 4;
    }
}

#[test]
fn flags_expand_to_one_boolean_per_bit() {
    assert_eq!(
        flag_bits::<Access>(),
        [("READ", 1), ("WRITE", 2), ("EXEC", 4)]
    );
    assert_eq!(
        sql_of::<Access>(),
        r#"STRUCT("READ" BOOLEAN, "WRITE" BOOLEAN, "EXEC" BOOLEAN)"#
    );

    let fields = TypeMapper::new().declared_fields::<Access>().unwrap();
    assert_eq!(fields[2].id().member, Member::FlagBit(2));
}

#[test]
fn flags_match_structs_with_exactly_their_bits() {
    let bool_ty = prim(PrimitiveKind::Boolean);
    let reordered = StructuralType::structure([
        StructField::new("EXEC", bool_ty.clone()),
        StructField::new("READ", bool_ty.clone()),
        StructField::new("WRITE", bool_ty.clone()),
    ]);
    check_flags::<Access>(&reordered).unwrap();

    let missing = StructuralType::structure([
        StructField::new("READ", bool_ty.clone()),
        StructField::new("WRITE", bool_ty.clone()),
    ]);
    assert!(check_flags::<Access>(&missing).is_err());

    let wrong_kind = StructuralType::structure([
        StructField::new("READ", bool_ty.clone()),
        StructField::new("WRITE", bool_ty),
        StructField::new("EXEC", prim(PrimitiveKind::Integer)),
    ]);
    assert!(check_flags::<Access>(&wrong_kind).is_err());
}

#[derive(Debug, Clone, Default)]
struct Invoice {
    number: i32,
    total: f64,
}

impl_mapped_struct!(Invoice { number, readonly total });

#[derive(Debug, Clone, Default)]
struct Clash {
    a: i32,
    b: i32,
}

impl_mapped_struct!(Clash { a as "x", b as "x" });

#[test]
fn readonly_members_are_written_but_not_read() {
    let mut mapper = TypeMapper::new();
    let ty = mapper.structural_type::<Invoice>().unwrap();
    mapper.check_compatible::<Invoice>(&ty, Direction::Write).unwrap();

    let err = mapper
        .check_compatible::<Invoice>(&ty, Direction::Read)
        .unwrap_err();
    assert!(matches!(
        mapping_error(&err),
        MappingError::UnsupportedConstruct { .. }
    ));

    let without_total = StructuralType::structure([StructField::new(
        "number",
        prim(PrimitiveKind::Integer),
    )]);
    assert!(mapper
        .check_compatible::<Invoice>(&without_total, Direction::Read)
        .is_err());
}

#[test]
fn duplicate_column_names_are_rejected() {
    let err = TypeMapper::new().structural_type::<Clash>().unwrap_err();
    assert!(err.to_string().contains("column 'x' is mapped twice"));

    // a rejected mapping leaves nothing behind for later requests
    let err = TypeMapper::new().structural_type::<Clash>().unwrap_err();
    assert!(err.to_string().contains("column 'x' is mapped twice"));
    assert!(TypeMapper::new().declared_fields::<Clash>().is_err());
    assert!(TypeMapper::new()
        .fields::<Clash>(Some(&StructuralType::structure([StructField::new(
            "x",
            prim(PrimitiveKind::Integer),
        )])))
        .is_err());
}

#[test]
fn ddl_marks_non_nullable_columns() {
    assert_eq!(
        create_table_sql::<Address>("addresses").unwrap(),
        r#"CREATE TABLE "addresses" ("street" VARCHAR NOT NULL, "postal_code" UINTEGER)"#
    );
    assert_eq!(
        create_table_sql::<Option<i64>>("ids").unwrap(),
        r#"CREATE TABLE "ids" ("value" BIGINT)"#
    );

    let columns = table_columns::<Customer>().unwrap();
    assert_eq!(columns.len(), 6);
    assert_eq!(columns[4].ty.to_string(), "DOUBLE[3]");
    assert!(!columns[4].nullable);
}

#[test]
fn logical_types_follow_structural_types() {
    let mut mapper = TypeMapper::new();
    let logical = mapper.logical_type::<Vec<Small>>().unwrap();
    assert_eq!(
        StructuralType::from_logical(&logical),
        StructuralType::list(prim(PrimitiveKind::UTinyInt))
    );
}

#[test]
fn short_type_names_drop_module_paths() {
    assert_eq!(short_type_name::<Vec<Option<String>>>(), "Vec<Option<String>>");
    assert_eq!(short_type_name::<[Node; 2]>(), "[Node; 2]");
    assert_eq!(short_type_name::<i32>(), "i32");
}
