//! Decoder and jump-destination index tests.

use jumpguard::decoder::Decoder;
use jumpguard::errors::{DecodeError, ErrorKind};
use jumpguard::jumpdests::JumpDestIndex;
use jumpguard::utils::opcodes::{EvmVersion, OpClass};
use primitive_types::U256;

fn code(hex: &str) -> Vec<u8> {
    hex::decode(hex).unwrap()
}

#[test]
fn test_instruction_fields() {
    let bytes = code("6042");
    let d = Decoder::new(&bytes, EvmVersion::latest());
    let ins = d.decode(0).unwrap();
    assert_eq!(ins.offset, 0);
    assert_eq!(ins.opcode, 0x60);
    assert_eq!(ins.name, "push1");
    assert_eq!(ins.class, OpClass::Push);
    assert_eq!(ins.immediate_len, 1);
    assert_eq!(ins.next(), 2);
    assert_eq!(d.immediate(&ins), &[0x42]);
}

#[test]
fn test_instructions_skip_push_data() {
    // PUSH32 of all jumpdest bytes, then JUMPDEST, STOP
    let bytes = code(&format!("7f{}5b00", "5b".repeat(32)));
    let d = Decoder::new(&bytes, EvmVersion::latest());
    let offsets: Vec<usize> = d.instructions().map(|r| r.unwrap().offset).collect();
    assert_eq!(offsets, vec![0, 33, 34]);

    let index = JumpDestIndex::new(&d);
    assert_eq!(index.iter().collect::<Vec<_>>(), vec![33]);
    assert!((1..33).all(|o| !index.contains(o)));
}

#[test]
fn test_push32_value() {
    let bytes = code(&format!("7f{}", "ff".repeat(32)));
    let d = Decoder::new(&bytes, EvmVersion::latest());
    assert_eq!(d.push_value(&d.decode(0).unwrap()), U256::MAX);
}

#[test]
fn test_decode_errors_map_to_invalid_instruction() {
    let bytes = code("600100");
    let d = Decoder::new(&bytes, EvmVersion::latest());
    let inside = d.decode(1).unwrap_err();
    assert_eq!(inside, DecodeError::InsideImmediate(1));
    assert_eq!(inside.kind(), ErrorKind::InvalidInstruction);
    assert_eq!(inside.offset(), 1);
    assert_eq!(d.decode(3).unwrap_err().offset(), 3);
}

#[test]
fn test_truncated_tail_is_listed() {
    let bytes = code("007f01");
    let d = Decoder::new(&bytes, EvmVersion::latest());
    let all: Vec<_> = d.instructions().collect();
    assert_eq!(all.len(), 2);
    assert!(matches!(all[1], Err(DecodeError::TruncatedImmediate { offset: 1, needed: 32, have: 1 })));
}

#[test]
fn test_relative_jump_targets() {
    // RJUMPI +2 at 0 -> 5; RJUMP -6 at 3 -> 0
    let bytes = code("e10002e0fffa");
    let d = Decoder::new(&bytes, EvmVersion::Prague);
    let rjumpi = d.decode(0).unwrap();
    assert_eq!(rjumpi.class, OpClass::RJumpI);
    assert_eq!(d.relative_target(&rjumpi), Some(5));
    let rjump = d.decode(3).unwrap();
    assert_eq!(d.relative_target(&rjump), Some(0));
}

#[test]
fn test_relative_target_ignores_non_relative() {
    let bytes = code("6001");
    let d = Decoder::new(&bytes, EvmVersion::latest());
    assert_eq!(d.relative_target(&d.decode(0).unwrap()), None);
}

#[test]
fn test_fork_dependent_decoding() {
    let bytes = code("5f00");
    assert!(Decoder::new(&bytes, EvmVersion::Shanghai).decode(0).is_ok());
    assert_eq!(
        Decoder::new(&bytes, EvmVersion::Paris).decode(0),
        Err(DecodeError::UndefinedOpcode { offset: 0, opcode: 0x5f })
    );
}

#[test]
fn test_jumpdest_needs_fork_aware_boundaries() {
    // Under Prague, 0xe0 swallows the next two bytes.
    let bytes = code("e05b5b5b");
    let prague = JumpDestIndex::new(&Decoder::new(&bytes, EvmVersion::Prague));
    assert_eq!(prague.iter().collect::<Vec<_>>(), vec![3]);
    let cancun = JumpDestIndex::new(&Decoder::new(&bytes, EvmVersion::Cancun));
    assert_eq!(cancun.len(), 3);
}

#[test]
fn test_empty_code() {
    let d = Decoder::new(&[], EvmVersion::latest());
    assert!(d.is_empty());
    assert_eq!(d.instructions().count(), 0);
    assert_eq!(d.decode(0), Err(DecodeError::OutOfRange(0)));
}
