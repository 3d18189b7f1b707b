//! Allocation traces: parse them, then replay them against an [`Allocator`]
//! while checking that no payload is ever overwritten by another.
//!
//! A trace is a text file with one operation per line:
//!
//! ```text
//! a <id> <bytes>    allocate
//! r <id> <bytes>    reallocate
//! f <id>            free
//! ```
//!
//! Lines made only of numbers (the usual trace header giving a suggested
//! heap size and operation counts) are skipped, as are blank lines and
//! lines starting with `#`.
//!
//! ```
//! use segalloc::{AllocConfig, Allocator, Trace};
//!
//! let trace = Trace::parse("a 0 100\na 1 20\nr 0 300\nf 1\nf 0\n").unwrap();
//! let mut allocator = Allocator::with_config(AllocConfig::default()).unwrap();
//! let report = trace.replay(&mut allocator).unwrap();
//!
//! assert_eq!(report.ops, 5);
//! assert_eq!(allocator.heap_size(), 0);
//! ```

use crate::allocator::{Allocator, HostHeap, ALIGNMENT};
use crate::error::{ReplayError, TraceError};
use log::debug;
use std::collections::HashMap;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Alloc { id: usize, size: usize },
    Realloc { id: usize, size: usize },
    Free { id: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    ops: Vec<TraceOp>,
}

/// What a replay observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayReport {
    pub ops: usize,
    /// Largest sum of live payload sizes at any point.
    pub peak_payload: usize,
    /// Largest heap size at any point.
    pub max_heap_size: usize,
    /// `peak_payload / max_heap_size`, 0 for a trace that never allocates.
    pub utilization: f64,
}

impl Trace {
    pub fn new(ops: Vec<TraceOp>) -> Self {
        Self { ops }
    }

    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let mut ops = vec![];

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let mut fields = line.split_whitespace();

            let op = match fields.next() {
                None => continue,
                Some(op) if op.starts_with('#') => continue,
                Some(op) if op.parse::<usize>().is_ok() => continue,
                Some(op) => op,
            };

            let mut number = || -> Result<usize, TraceError> {
                fields
                    .next()
                    .and_then(|field| field.parse().ok())
                    .ok_or(TraceError::Malformed { line: line_no })
            };

            let op = match op {
                "a" => TraceOp::Alloc {
                    id: number()?,
                    size: number()?,
                },
                "r" => TraceOp::Realloc {
                    id: number()?,
                    size: number()?,
                },
                "f" => TraceOp::Free { id: number()? },
                other => {
                    return Err(TraceError::UnknownOp {
                        line: line_no,
                        op: other.to_string(),
                    })
                }
            };

            ops.push(op);
        }

        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[TraceOp] {
        &self.ops
    }

    /// Runs every operation against `allocator`. Each payload is filled with
    /// a byte derived from its id and verified before it is reallocated or
    /// freed. Blocks still live at the end of the trace are left allocated.
    pub fn replay<H: HostHeap>(
        &self,
        allocator: &mut Allocator<H>,
    ) -> Result<ReplayReport, ReplayError> {
        let mut live: HashMap<usize, (NonNull<u8>, usize)> = HashMap::new();
        let mut payload = 0;
        let mut peak_payload = 0;
        let mut max_heap_size = allocator.heap_size();

        for (op, trace_op) in self.ops.iter().enumerate() {
            match *trace_op {
                TraceOp::Alloc { id, size } => {
                    if live.contains_key(&id) {
                        return Err(ReplayError::DuplicateId { op, id });
                    }

                    let ptr = allocator
                        .allocate(size)
                        .map_err(|source| ReplayError::Alloc { op, source })?;

                    check_aligned(op, id, ptr)?;
                    fill(ptr, size, pattern(id));

                    live.insert(id, (ptr, size));
                    payload += size;
                }
                TraceOp::Realloc { id, size } => {
                    let (ptr, old_size) = *live.get(&id).ok_or(ReplayError::UnknownId { op, id })?;

                    check_payload(op, id, ptr, old_size)?;

                    let new_ptr = unsafe { allocator.reallocate(ptr, size) }
                        .map_err(|source| ReplayError::Alloc { op, source })?;

                    check_aligned(op, id, new_ptr)?;
                    check_payload(op, id, new_ptr, old_size.min(size))?;
                    fill(new_ptr, size, pattern(id));

                    live.insert(id, (new_ptr, size));
                    payload = payload - old_size + size;
                }
                TraceOp::Free { id } => {
                    let (ptr, size) = live.remove(&id).ok_or(ReplayError::UnknownId { op, id })?;

                    check_payload(op, id, ptr, size)?;
                    unsafe { allocator.free(ptr) };
                    payload -= size;
                }
            }

            peak_payload = peak_payload.max(payload);
            max_heap_size = max_heap_size.max(allocator.heap_size());
        }

        let utilization = if max_heap_size == 0 {
            0.0
        } else {
            peak_payload as f64 / max_heap_size as f64
        };

        debug!(
            "replayed {} ops, peak payload {}, max heap {}",
            self.ops.len(),
            peak_payload,
            max_heap_size
        );

        Ok(ReplayReport {
            ops: self.ops.len(),
            peak_payload,
            max_heap_size,
            utilization,
        })
    }
}

fn pattern(id: usize) -> u8 {
    (id % 251) as u8 ^ 0x5a
}

fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), byte, len) }
}

fn check_aligned(op: usize, id: usize, ptr: NonNull<u8>) -> Result<(), ReplayError> {
    if ptr.as_ptr() as usize % ALIGNMENT != 0 {
        return Err(ReplayError::Misaligned { op, id });
    }

    Ok(())
}

fn check_payload(op: usize, id: usize, ptr: NonNull<u8>, len: usize) -> Result<(), ReplayError> {
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
    let byte = pattern(id);

    if bytes.iter().any(|b| *b != byte) {
        return Err(ReplayError::PayloadCorrupted { op, id });
    }

    Ok(())
}
