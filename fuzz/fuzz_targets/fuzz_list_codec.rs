//! Fuzz testing for the list codecs.
//!
//! Writes arbitrary nested lists of optional strings through the compiled
//! writer and reads them back, then reads arbitrary list entries laid over a
//! fixed child to ensure out-of-range entries fail instead of panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use duckrow::config::VECTOR_SIZE;
use duckrow::vector::ListEntry;
use duckrow::{Arena, CodecCompiler, PrimitiveKind, StructuralType, TypeMapper, Vector};

type Rows = Vec<Option<Vec<Option<String>>>>;

#[derive(Debug, Arbitrary)]
struct ListInput {
    rows: Rows,
    entries: Vec<(u16, u16, bool)>,
}

fuzz_target!(|input: ListInput| {
    if input.rows.len() > VECTOR_SIZE || input.entries.len() > VECTOR_SIZE {
        return;
    }
    let compiler = CodecCompiler::new();

    let mut mapper = TypeMapper::new();
    let ty = mapper.structural_type::<Vec<Option<String>>>().unwrap();
    let mut vector = Vector::new(mapper.logical_type::<Vec<Option<String>>>().unwrap(), VECTOR_SIZE);
    let mut arena = Arena::new();
    let refs: Vec<Option<&Vec<Option<String>>>> = input.rows.iter().map(Option::as_ref).collect();
    compiler.writer::<Vec<Option<String>>>().unwrap()(&refs, &mut vector, &mut arena).unwrap();
    let back = compiler.reader::<Vec<Option<String>>>(&ty).unwrap()(&vector, refs.len(), None)
        .unwrap();
    assert_eq!(back, input.rows);

    let element = StructuralType::primitive(PrimitiveKind::Integer);
    let list = StructuralType::list(element);
    let mut laid = Vector::new(mapper.logical_type::<Vec<i32>>().unwrap(), VECTOR_SIZE);
    laid.list_reserve(64).unwrap();
    laid.set_list_size(64).unwrap();
    for (row, (offset, length, valid)) in input.entries.iter().enumerate() {
        laid.data_mut::<ListEntry>().unwrap()[row] = ListEntry::new(*offset as usize, *length as usize);
        if !valid {
            laid.set_null(row);
        }
    }
    let result = compiler.reader::<Vec<i32>>(&list).unwrap()(&laid, input.entries.len(), None);
    if let Ok(values) = result {
        for (value, (offset, length, valid)) in values.iter().zip(&input.entries) {
            match value {
                Some(items) => {
                    assert!(*valid);
                    assert_eq!(items.len(), *length as usize);
                    assert!(*offset as usize + *length as usize <= 64);
                }
                None => assert!(!valid),
            }
        }
    }
});
