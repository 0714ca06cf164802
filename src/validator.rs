//! Control-flow validation.
//!
//! Walks every path reachable from offset 0 over the symbolic stack model and
//! decides whether the code can ever halt exceptionally, other than by running
//! out of gas or recursing without bound.
//!
//! The walk is depth-first over an explicit work-list. A conditional jump
//! continues along its taken arm and queues the fall-through, so the first
//! failure reported is the one a recursive walk would hit first. Each block
//! entry is recorded in a memo the first time it is reached, together with
//! the routine that owns it and the relative stack depth `sp - bp` at that
//! point; later arrivals are only compared against the record, which bounds
//! the work to one pass over every edge.
//!
//! Subroutines are not re-walked per call site. The first `returnsub` of a
//! routine fixes its net stack effect; other callers continue from their
//! return offsets with that many fresh unknown slots, or wait until the
//! effect is known. Returned slots are unknown for every caller, the first
//! one included.
//!
//! Both stack ceilings are checked over the call graph once the walk is done,
//! since a reused routine is never walked at the depth of its later callers.

use crate::decoder::{Decoder, Instruction};
use crate::errors::{ErrorKind, StackError, ValidationError};
use crate::jumpdests::JumpDestIndex;
use crate::stack::{Routine, Slot, SymbolicState, STACK_LIMIT};
use crate::utils::opcodes::{EvmVersion, OpClass};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Outcome of validating one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Valid { max_stack_depth: usize },
    Invalid { offset: usize, kind: ErrorKind },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    pub fn error(&self) -> Option<ValidationError> {
        match *self {
            Verdict::Valid { .. } => None,
            Verdict::Invalid { offset, kind } => Some(ValidationError { offset, kind }),
        }
    }
}

impl From<Result<Analysis, ValidationError>> for Verdict {
    fn from(result: Result<Analysis, ValidationError>) -> Self {
        match result {
            Ok(analysis) => Verdict::Valid { max_stack_depth: analysis.max_stack_depth },
            Err(e) => Verdict::Invalid { offset: e.offset, kind: e.kind },
        }
    }
}

/// What a successful run learned about the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub max_stack_depth: usize,
    /// Every block entry that was reached, ascending.
    pub block_entries: Vec<usize>,
    /// Number of subroutines entered.
    pub routines: usize,
}

/// First-visit record of a block entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visit {
    routine: Routine,
    depth: usize,
}

#[derive(Debug, Clone)]
struct Path {
    pc: usize,
    state: SymbolicState,
    at_entry: bool,
}

/// A caller waiting for the net effect of the routine it called.
#[derive(Debug)]
struct Parked {
    call_offset: usize,
    path: Path,
}

#[derive(Debug, Clone, Copy)]
struct CallSite {
    offset: usize,
    /// Caller's relative depth once the destination is popped.
    depth: usize,
    callee: usize,
}

/// How far a routine reaches below its own frame, nested calls included.
#[derive(Debug, Clone, Copy, Default)]
struct Reach {
    /// Data-stack slots above the routine's base.
    peak: usize,
    peak_site: Option<usize>,
    /// Return-stack frames opened beneath the routine.
    frames: usize,
    frames_site: Option<usize>,
}

#[derive(Debug, Default)]
struct RoutineStats {
    /// Highest relative depth seen inside the routine itself.
    peak: usize,
    calls: Vec<CallSite>,
}

/// Everything one validation run mutates. Owned by [`Validator::run`].
#[derive(Debug, Default)]
struct Traversal {
    memo: HashMap<usize, Visit>,
    pending: Vec<Path>,
    net_effects: HashMap<usize, usize>,
    parked: HashMap<usize, Vec<Parked>>,
    stats: HashMap<Routine, RoutineStats>,
}

impl Traversal {
    /// Record or check a block entry. `Ok(false)` means it was already walked.
    fn enter(&mut self, pc: usize, state: &SymbolicState) -> Result<bool, ValidationError> {
        let visit = Visit { routine: state.routine(), depth: state.stack.relative_depth() };
        match self.memo.entry(pc) {
            Entry::Vacant(slot) => {
                log::trace!("block 0x{pc:04x}: {:?} at depth {}", visit.routine, visit.depth);
                slot.insert(visit);
                Ok(true)
            }
            Entry::Occupied(seen) => {
                let seen = *seen.get();
                if seen.routine != visit.routine {
                    Err(ValidationError::new(pc, ErrorKind::InvalidDestination))
                } else if seen.depth != visit.depth {
                    log::trace!("block 0x{pc:04x}: depth {} != {}", visit.depth, seen.depth);
                    Err(ValidationError::new(pc, ErrorKind::StackMisalignment))
                } else {
                    log::trace!("block 0x{pc:04x}: already walked");
                    Ok(false)
                }
            }
        }
    }

    fn branch(&mut self, pc: usize, state: &SymbolicState) {
        self.pending.push(Path { pc, state: state.clone(), at_entry: true });
    }

    fn observe(&mut self, routine: Routine, depth: usize) {
        let stats = self.stats.entry(routine).or_default();
        stats.peak = stats.peak.max(depth);
    }

    fn record_call(&mut self, routine: Routine, site: CallSite) {
        self.stats.entry(routine).or_default().calls.push(site);
    }

    fn park(&mut self, entry: usize, parked: Parked) {
        log::trace!("call at 0x{:04x} waits for routine 0x{entry:04x}", parked.call_offset);
        self.parked.entry(entry).or_default().push(parked);
    }

    /// Fix (or check) the net effect of the routine at `entry` and release
    /// every caller that was waiting for it.
    fn settle(&mut self, entry: usize, net: usize, pc: usize) -> Result<(), ValidationError> {
        match self.net_effects.entry(entry) {
            Entry::Occupied(known) if *known.get() != net => {
                return Err(ValidationError::new(pc, ErrorKind::StackMisalignment));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(net);
            }
        }

        for Parked { call_offset, mut path } in self.parked.remove(&entry).unwrap_or_default() {
            path.state
                .stack
                .push_unknown(net)
                .map_err(|e| ValidationError::new(call_offset, e.kind()))?;
            log::trace!("call at 0x{call_offset:04x} resumes at 0x{:04x}", path.pc);
            self.observe(path.state.routine(), path.state.stack.relative_depth());
            self.pending.push(path);
        }
        Ok(())
    }

    /// Reach of `routine` over every call chain that enters no routine
    /// twice. `active` maps the routines on the current chain to their
    /// position in it; the second value returned is the lowest position a
    /// cycle was cut at, or `usize::MAX`. A result is only cached once no
    /// routine above it was cut, because it depends on the chain otherwise.
    fn reach_of(
        &self,
        routine: Routine,
        active: &mut HashMap<Routine, usize>,
        done: &mut HashMap<Routine, Reach>,
    ) -> (Reach, usize) {
        if let Some(&known) = done.get(&routine) {
            return (known, usize::MAX);
        }
        let Some(stats) = self.stats.get(&routine) else {
            return (Reach::default(), usize::MAX);
        };
        if let Some(&position) = active.get(&routine) {
            return (Reach { peak: stats.peak, ..Reach::default() }, position);
        }

        let position = active.len();
        active.insert(routine, position);
        let mut reach = Reach { peak: stats.peak, ..Reach::default() };
        let mut cut = usize::MAX;
        for call in &stats.calls {
            let (inner, inner_cut) = self.reach_of(Routine::Sub(call.callee), active, done);
            cut = cut.min(inner_cut);
            if call.depth + inner.peak > reach.peak {
                reach.peak = call.depth + inner.peak;
                reach.peak_site = Some(call.offset);
            }
            if inner.frames + 1 > reach.frames {
                reach.frames = inner.frames + 1;
                reach.frames_site = Some(call.offset);
            }
        }
        active.remove(&routine);

        if cut < position {
            return (reach, cut);
        }
        done.insert(routine, reach);
        (reach, usize::MAX)
    }

    /// Highest absolute depth any call chain can reach, checked against the
    /// data-stack and return-stack ceilings.
    fn max_depth(&self) -> Result<usize, ValidationError> {
        let (reach, _) = self.reach_of(Routine::Main, &mut HashMap::new(), &mut HashMap::new());
        if reach.peak > STACK_LIMIT {
            return Err(ValidationError::new(reach.peak_site.unwrap_or(0), ErrorKind::StackOverflow));
        }
        if reach.frames > STACK_LIMIT {
            log::trace!("{} nested frames through 0x{:04x}", reach.frames, reach.frames_site.unwrap_or(0));
            return Err(ValidationError::new(reach.frames_site.unwrap_or(0), ErrorKind::StackOverflow));
        }
        Ok(reach.peak)
    }

    fn routines(&self) -> usize {
        self.memo
            .iter()
            .filter(|(pc, visit)| visit.routine == Routine::Sub(**pc))
            .count()
    }
}

/// Validates one immutable code buffer.
///
/// The decoder and the jump-destination index are built once; every call to
/// [`Validator::run`] owns its own traversal state, so a validator can be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    decoder: Decoder<'a>,
    index: JumpDestIndex,
}

impl<'a> Validator<'a> {
    pub fn new(code: &'a [u8], fork: EvmVersion) -> Self {
        let decoder = Decoder::new(code, fork);
        let index = JumpDestIndex::new(&decoder);
        Self { decoder, index }
    }

    pub fn decoder(&self) -> &Decoder<'a> {
        &self.decoder
    }

    pub fn index(&self) -> &JumpDestIndex {
        &self.index
    }

    pub fn validate(&self) -> Verdict {
        self.run().into()
    }

    /// Walk every reachable path. Stops at the first violation.
    pub fn run(&self) -> Result<Analysis, ValidationError> {
        let mut walk = Traversal::default();
        walk.pending.push(Path { pc: 0, state: SymbolicState::new(), at_entry: true });

        while let Some(path) = walk.pending.pop() {
            if let Err(e) = self.walk_path(path, &mut walk) {
                log::debug!("rejected: {e} ({})", self.mnemonic(e.offset));
                return Err(e);
            }
        }

        let max_stack_depth = walk.max_depth().inspect_err(|e| log::debug!("rejected: {e}"))?;
        let mut block_entries: Vec<usize> = walk.memo.keys().copied().collect();
        block_entries.sort_unstable();
        let routines = walk.routines();

        log::debug!(
            "accepted {} bytes: max stack depth {max_stack_depth}, {} blocks, {routines} subroutines",
            self.decoder.len(),
            block_entries.len(),
        );
        Ok(Analysis { max_stack_depth, block_entries, routines })
    }

    /// Name of the instruction at `offset`, for diagnostics.
    pub fn mnemonic(&self, offset: usize) -> &'static str {
        match self.decoder.decode(offset) {
            Ok(ins) => ins.name,
            Err(_) => "undecodable",
        }
    }

    /// Follow one path until it halts, rejoins a walked block, or parks.
    fn walk_path(&self, path: Path, walk: &mut Traversal) -> Result<(), ValidationError> {
        let Path { mut pc, mut state, mut at_entry } = path;

        loop {
            if (at_entry || self.index.contains(pc)) && !walk.enter(pc, &state)? {
                return Ok(());
            }
            at_entry = false;

            let ins = self
                .decoder
                .decode(pc)
                .map_err(|e| ValidationError::new(pc, e.kind()))?;
            let at = |e: StackError| ValidationError::new(ins.offset, e.kind());
            let routine = state.routine();

            match ins.class {
                OpClass::Halt => {
                    state.stack.pop_n(ins.pops).map_err(at)?;
                    return Ok(());
                }
                OpClass::Invalid => {
                    return Err(ValidationError::new(pc, ErrorKind::InvalidInstruction));
                }
                OpClass::Push => {
                    let value = self.decoder.push_value(&ins);
                    state.stack.push(Slot::Constant(value)).map_err(at)?;
                }
                OpClass::Dup(n) => state.stack.dup(n as usize).map_err(at)?,
                OpClass::Swap(n) => state.stack.swap(n as usize).map_err(at)?,
                OpClass::JumpDest | OpClass::Effect => {
                    state.stack.apply(ins.pops, ins.pushes).map_err(at)?;
                }
                OpClass::Jump => {
                    pc = state.stack.pop_destination(&self.index).map_err(at)?;
                    at_entry = true;
                    continue;
                }
                OpClass::JumpI => {
                    let dest = state.stack.pop_destination(&self.index).map_err(at)?;
                    state.stack.pop().map_err(at)?;
                    walk.branch(ins.next(), &state);
                    pc = dest;
                    at_entry = true;
                    continue;
                }
                OpClass::RJump => {
                    pc = self.relative_destination(&ins)?;
                    at_entry = true;
                    continue;
                }
                OpClass::RJumpI => {
                    state.stack.pop().map_err(at)?;
                    let dest = self.relative_destination(&ins)?;
                    walk.branch(ins.next(), &state);
                    pc = dest;
                    at_entry = true;
                    continue;
                }
                OpClass::JumpSub => {
                    let entry = state.stack.pop_destination(&self.index).map_err(at)?;
                    state.check_call().map_err(at)?;
                    let depth = state.stack.relative_depth();
                    walk.record_call(routine, CallSite { offset: pc, depth, callee: entry });

                    let owner = walk.memo.get(&entry).map(|visit| visit.routine);
                    match owner {
                        None => {
                            state.call(entry, ins.next()).map_err(at)?;
                            pc = entry;
                            at_entry = true;
                            continue;
                        }
                        Some(owner) if owner != Routine::Sub(entry) => {
                            return Err(ValidationError::new(pc, ErrorKind::InvalidDestination));
                        }
                        Some(_) => match walk.net_effects.get(&entry).copied() {
                            Some(net) => {
                                state.stack.push_unknown(net).map_err(at)?;
                                walk.observe(routine, state.stack.relative_depth());
                                pc = ins.next();
                                at_entry = true;
                                continue;
                            }
                            None => {
                                let path = Path { pc: ins.next(), state, at_entry: true };
                                walk.park(entry, Parked { call_offset: pc, path });
                                return Ok(());
                            }
                        },
                    }
                }
                OpClass::ReturnSub => {
                    let net = state.stack.relative_depth();
                    state.stack.forget(net);
                    let frame = state.ret().map_err(at)?;
                    if !self.follows_call(frame.return_to) {
                        return Err(ValidationError::new(pc, ErrorKind::InvalidDestination));
                    }
                    walk.settle(frame.entry, net, pc)?;
                    pc = frame.return_to;
                    at_entry = true;
                    continue;
                }
            }

            walk.observe(routine, state.stack.relative_depth());
            pc = ins.next();
        }
    }

    fn relative_destination(&self, ins: &Instruction) -> Result<usize, ValidationError> {
        match self.decoder.relative_target(ins) {
            Some(dest) if self.index.contains(dest) => Ok(dest),
            _ => Err(ValidationError::new(ins.offset, ErrorKind::InvalidDestination)),
        }
    }

    /// Whether the instruction just before `return_to` is a `jumpsub`.
    fn follows_call(&self, return_to: usize) -> bool {
        return_to
            .checked_sub(1)
            .and_then(|site| self.decoder.decode(site).ok())
            .is_some_and(|ins| ins.class == OpClass::JumpSub)
    }
}

/// Validate `code` in one shot.
pub fn validate(code: &[u8], fork: EvmVersion) -> Verdict {
    Validator::new(code, fork).validate()
}
