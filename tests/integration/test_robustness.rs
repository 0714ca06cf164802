//! Robustness tests: arbitrary bytes, adversarial shapes and concurrent runs.

use jumpguard::checker::{check_bytecode, CheckConfig, OutputFormat};
use jumpguard::errors::ErrorKind;
use jumpguard::utils::opcodes::EvmVersion;
use jumpguard::{validate, Validator, Verdict};

fn config() -> CheckConfig {
    CheckConfig { format: OutputFormat::Text, color: false, ..CheckConfig::default() }
}

/// Small deterministic byte generator (xorshift64).
struct Bytes(u64);

impl Bytes {
    fn next(&mut self) -> u8 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 24) as u8
    }

    fn take(&mut self, n: usize) -> Vec<u8> {
        (0..n).map(|_| self.next()).collect()
    }
}

// =========================================================================
// Arbitrary input: must not panic
// =========================================================================

#[test]
fn test_every_two_byte_program() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            let code = [a, b];
            if let Verdict::Invalid { offset, .. } = validate(&code, EvmVersion::latest()) {
                assert!(offset <= code.len(), "offset {offset} for {a:02x}{b:02x}");
            }
        }
    }
}

#[test]
fn test_random_programs() {
    let mut gen = Bytes(0x9e37_79b9_7f4a_7c15);
    for round in 0..2000 {
        let len = 1 + round % 97;
        let code = gen.take(len);
        for fork in [EvmVersion::Frontier, EvmVersion::Cancun, EvmVersion::Prague] {
            let verdict = validate(&code, fork);
            if let Some(e) = verdict.error() {
                assert!(e.offset <= code.len());
            }
        }
    }
}

#[test]
fn test_malformed_hex_is_an_error() {
    assert!(check_bytecode("", &config()).is_err());
    assert!(check_bytecode("ZZZZ", &config()).is_err());
    assert!(check_bytecode("6001f", &config()).is_err());
}

#[test]
fn test_truncated_push32() {
    let r = check_bytecode("7f0102", &config()).unwrap();
    assert!(r.text.contains("invalid instruction at offset 0x0000"));
}

// =========================================================================
// Adversarial shapes
// =========================================================================

#[test]
fn test_many_nested_conditionals() {
    // (CALLVALUE, RJUMPI +0, JUMPDEST) x 4000, STOP
    let mut code = Vec::new();
    for _ in 0..4000 {
        code.extend([0x34, 0xe1, 0x00, 0x00, 0x5b]);
    }
    code.push(0x00);
    assert_eq!(validate(&code, EvmVersion::Prague), Verdict::Valid { max_stack_depth: 1 });
}

#[test]
fn test_long_jump_chain() {
    // PUSH2 next, JUMP, JUMPDEST ... each hop lands on the following jumpdest
    let hops = 3000usize;
    let mut code = Vec::new();
    for i in 0..hops {
        let next = (i + 1) * 5 - 1;
        code.extend([0x61, (next >> 8) as u8, next as u8, 0x56, 0x5b]);
    }
    code.push(0x00);
    let analysis = Validator::new(&code, EvmVersion::latest()).run().unwrap();
    assert_eq!(analysis.max_stack_depth, 1);
    assert_eq!(analysis.block_entries.len(), hops + 1);
}

#[test]
fn test_jumpdest_flood() {
    let mut code = vec![0x5b; 20_000];
    code.push(0x00);
    assert!(validate(&code, EvmVersion::latest()).is_valid());
}

#[test]
fn test_many_call_sites() {
    // (PUSH2 body, JUMPSUB) x 1000, STOP, body: JUMPDEST, CALLVALUE, POP, RETURNSUB
    let sites = 1000usize;
    let body = sites * 4 + 1;
    let mut code = Vec::new();
    for _ in 0..sites {
        code.extend([0x61, (body >> 8) as u8, body as u8, 0xe3]);
    }
    code.push(0x00);
    code.extend([0x5b, 0x34, 0x50, 0xe4]);
    let analysis = Validator::new(&code, EvmVersion::Prague).run().unwrap();
    assert_eq!(analysis.max_stack_depth, 1);
    assert_eq!(analysis.routines, 1);
}

#[test]
fn test_overflow_reported_inside_loop_body() {
    // JUMPDEST, PUSH0 x1025, ...: overflow precedes any alignment check
    let mut code = vec![0x5b];
    code.extend(std::iter::repeat(0x5f).take(1025));
    code.push(0x00);
    assert_eq!(
        validate(&code, EvmVersion::latest()),
        Verdict::Invalid { offset: 1025, kind: ErrorKind::StackOverflow }
    );
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn test_shared_validator_across_threads() {
    let code = hex::decode("600ce3600ce3505000fefefe5b34e4").unwrap();
    let validator = Validator::new(&code, EvmVersion::Prague);
    let expected = validator.run().unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| validator.run().unwrap())).collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_independent_programs_in_parallel() {
    let programs = [
        ("600556fefe5b00", Verdict::Valid { max_stack_depth: 1 }),
        ("600660000156", Verdict::Invalid { offset: 5, kind: ErrorKind::DynamicJump }),
        ("5b343460005700", Verdict::Invalid { offset: 0, kind: ErrorKind::StackMisalignment }),
        ("6004e3005b6004e3e4", Verdict::Valid { max_stack_depth: 1 }),
    ];

    std::thread::scope(|s| {
        for (hex, expected) in programs {
            s.spawn(move || {
                let code = hex::decode(hex).unwrap();
                for _ in 0..50 {
                    assert_eq!(validate(&code, EvmVersion::Prague), expected);
                }
            });
        }
    });
}
