//! Fuzz target for the assembler.
//!
//! Feeds arbitrary text to the assembler. Errors are expected; panics are
//! bugs. Reassembling must also be deterministic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vconsole::{assemble, NoIncludes};

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);
    let first = assemble(&source, "fuzz.asm", &NoIncludes);
    let second = assemble(&source, "fuzz.asm", &NoIncludes);
    assert_eq!(first, second);

    // Every emitted segment must fit the address space
    for segment in &first.segments {
        assert!(segment.end_address() <= 0x1_0000);
    }
});
