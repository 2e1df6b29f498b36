//! Fuzz testing for the compact string representation.
//!
//! Encodes arbitrary byte strings through an arena and checks that length,
//! prefix and contents survive, for both the inlined and out-of-line forms.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use duckrow::{Arena, StringRef};

#[derive(Debug, Arbitrary)]
struct StringInput {
    values: Vec<Vec<u8>>,
    reset_after: Option<u8>,
}

fuzz_target!(|input: StringInput| {
    if input.values.len() > 256 {
        return;
    }

    let mut arena = Arena::with_chunk_sizes(64, 4096);
    let mut encoded = Vec::with_capacity(input.values.len());
    for (i, bytes) in input.values.iter().enumerate() {
        if bytes.len() > 1 << 16 {
            continue;
        }
        if input.reset_after.map(usize::from) == Some(i) {
            arena.reset();
            encoded.clear();
        }
        let value = StringRef::encode(bytes, &mut arena).unwrap();
        assert_eq!(value.len(), bytes.len());
        assert_eq!(value.is_inlined(), bytes.len() <= 12);
        assert_eq!(value.prefix(), &bytes[..bytes.len().min(4)]);
        encoded.push((value, bytes));
    }

    for (value, bytes) in &encoded {
        // SAFETY: the arena has not been reset since these were encoded.
        assert_eq!(unsafe { value.as_bytes() }, bytes.as_slice());
    }
});
