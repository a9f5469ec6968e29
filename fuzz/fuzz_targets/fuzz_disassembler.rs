//! Fuzz target for the disassembler.
//!
//! Feeds arbitrary byte sequences to the disassembler and checks that every
//! byte is covered exactly once, in address order.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vconsole::disassemble;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    bytes: Vec<u8>,
    start_address: u16,
}

fuzz_target!(|input: FuzzInput| {
    // Limit input size to prevent OOM
    if input.bytes.len() > 65536 {
        return;
    }

    let lines = disassemble(&input.bytes, input.start_address);

    let mut expected_address = input.start_address as usize;
    let mut total_size = 0;
    for line in &lines {
        assert_eq!(line.address as usize, expected_address);
        assert!((1..=4).contains(&line.len()));
        let _ = line.text();

        total_size += line.len();
        expected_address += line.len();
    }

    // Decoding stops at $FFFF; a final instruction may straddle it
    let addressable = input.bytes.len().min(0x1_0000 - input.start_address as usize);
    assert!(total_size >= addressable);
    assert!(total_size <= input.bytes.len());
});
