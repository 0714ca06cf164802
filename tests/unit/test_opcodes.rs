//! Opcode table coverage across hard forks.

use jumpguard::utils::opcodes::*;

#[test]
fn test_all_frontier_opcodes_present() {
    let table = build_opcode_table();
    let frontier_ops: &[u8] = &[
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A,
        0x20,
        0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C,
        0x40, 0x41, 0x42, 0x43, 0x44, 0x45,
        0x50, 0x51, 0x52, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x5B,
        0xF0, 0xF1, 0xF2, 0xF3, 0xFE, 0xFF,
    ];
    for &byte in frontier_ops {
        assert!(
            table.lookup(byte, EvmVersion::Frontier).is_some(),
            "missing frontier opcode 0x{byte:02x}"
        );
    }
}

#[test]
fn test_push_range() {
    let table = build_opcode_table();
    for n in 0u8..=32 {
        let byte = 0x5F + n;
        let info = table.get(byte).unwrap_or_else(|| panic!("missing push{n} at 0x{byte:02x}"));
        assert_eq!(info.immediate_bytes, n);
        assert_eq!(info.class, OpClass::Push);
        assert_eq!(info.pushes, 1);
    }
}

#[test]
fn test_dup_swap_depths() {
    let table = build_opcode_table();
    for n in 1u8..=16 {
        let dup = table[0x7F + n];
        assert_eq!(dup.class, OpClass::Dup(n));
        assert_eq!(dup.stack_diff(), 1);
        let swap = table[0x8F + n];
        assert_eq!(swap.class, OpClass::Swap(n));
        assert_eq!(swap.stack_diff(), 0);
    }
}

#[test]
fn test_terminals_pop_their_operands() {
    let table = build_opcode_table();
    assert_eq!(table[0x00].pops, 0);
    assert_eq!(table[0xF3].pops, 2);
    assert_eq!(table[0xFD].pops, 2);
    assert_eq!(table[0xFF].pops, 1);
    assert!(table.iter().filter(|i| i.class == OpClass::Halt).all(|i| i.pushes == 0));
}

#[test]
fn test_jump_operands() {
    let table = build_opcode_table();
    assert_eq!(table[0x56].pops, 1);
    assert_eq!(table[0x57].pops, 2);
    assert_eq!(table[0xE3].pops, 1);
    assert_eq!(table[0xE4].pops, 0);
    assert_eq!(table[0x57].class, OpClass::JumpI);
    assert_eq!(table[0x5B].class, OpClass::JumpDest);
}

#[test]
fn test_undefined_bytes() {
    let table = build_opcode_table();
    for byte in [0x0C, 0x0F, 0x21, 0x4B, 0xA5, 0xE2, 0xEF, 0xFB] {
        assert!(!table.contains(byte), "0x{byte:02x} should be undefined");
        assert!(opcode_table().get(byte).is_none());
    }
}

#[test]
fn test_fork_gating() {
    let table = opcode_table();
    assert!(table.lookup(0x5F, EvmVersion::London).is_none());
    assert!(table.lookup(0x5F, EvmVersion::Shanghai).is_some());
    assert!(table.lookup(0x5C, EvmVersion::Shanghai).is_none());
    assert!(table.lookup(0x5C, EvmVersion::Cancun).is_some());
    for byte in [0xE0, 0xE1, 0xE3, 0xE4] {
        assert!(table.lookup(byte, EvmVersion::Cancun).is_none());
        assert!(table.lookup(byte, EvmVersion::Prague).is_some());
    }
    assert!(table.lookup(0xFD, EvmVersion::Homestead).is_none());
}

#[test]
fn test_forks_are_ordered() {
    let all = EvmVersion::all();
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(all.last().copied(), Some(EvmVersion::latest()));
    assert_eq!(EvmVersion::default(), EvmVersion::Prague);
}

#[test]
fn test_fork_names_parse() {
    for &fork in EvmVersion::all() {
        assert_eq!(fork.name().parse::<EvmVersion>().unwrap(), fork);
        assert_eq!(fork.to_string(), fork.name());
    }
    assert_eq!("Tangerine_Whistle".parse::<EvmVersion>().unwrap(), EvmVersion::TangerineWhistle);
    assert!("osaka".parse::<EvmVersion>().is_err());
}

#[test]
fn test_fork_serde() {
    let json = serde_json::to_string(&EvmVersion::SpuriousDragon).unwrap();
    assert_eq!(json, "\"spurious-dragon\"");
    let back: EvmVersion = serde_json::from_str(&json).unwrap();
    assert_eq!(back, EvmVersion::SpuriousDragon);
}

#[test]
fn test_immediate_widths() {
    let table = build_opcode_table();
    assert_eq!(table[0x60].immediate_bytes, 1);
    assert_eq!(table[0x7F].immediate_bytes, 32);
    assert_eq!(table[0xE0].immediate_bytes, 2);
    assert_eq!(table[0xE3].immediate_bytes, 0);
}
