//! The I/O orchestrator: single-owner parallel read/write sequencing.
//!
//! One rank — the owner — touches the file. Everything the other ranks need
//! from the header travels in a single broadcast of scalar facts; the bulk
//! data reaches them through the runtime's scatter. The orchestrator is an
//! explicitly constructed value, not a process-wide singleton: construct it
//! once and reuse it across many read/write calls, passing it by reference
//! to whoever needs it.
//!
//! Failure anywhere on the owner follows a fixed two-step contract: signal
//! all peers (collective abort), then fail locally. MPI collectives hang
//! forever if one participant dies silently; in a batch job partial
//! completion has no value, so every error is terminal.
#![warn(missing_docs)]

mod reader;
mod writer;

use std::path::Path;

use log::error;

use crate::error::BridgeError;
use crate::runtime::comm::Collective;
use crate::runtime::format::{FileMode, FormatEngine};
use crate::staging::{FileStagingArea, StagingCache};
use crate::store::values::ElementType;

/// Scalar facts every rank needs before a field can be allocated: read on
/// the owner, broadcast to the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ScalarFacts {
    pub element_type: ElementType,
    pub buffer_levels: usize,
    pub points: usize,
}

impl ScalarFacts {
    pub(crate) const WIRE_LEN: usize = 17;

    pub(crate) fn encode(self) -> [u8; Self::WIRE_LEN] {
        let mut wire = [0u8; Self::WIRE_LEN];
        wire[0] = self.element_type.code();
        wire[1..9].copy_from_slice(&(self.buffer_levels as u64).to_le_bytes());
        wire[9..17].copy_from_slice(&(self.points as u64).to_le_bytes());
        wire
    }

    pub(crate) fn decode(wire: &[u8; Self::WIRE_LEN]) -> Result<Self, BridgeError> {
        let element_type = ElementType::from_code(wire[0])?;
        let mut levels = [0u8; 8];
        levels.copy_from_slice(&wire[1..9]);
        let mut points = [0u8; 8];
        points.copy_from_slice(&wire[9..17]);
        Ok(Self {
            element_type,
            buffer_levels: u64::from_le_bytes(levels) as usize,
            points: u64::from_le_bytes(points) as usize,
        })
    }
}

/// Drives the end-to-end read and write sequences across all ranks.
///
/// Generic over the format engine and the collective backend so tests run
/// the same sequencing serially over the in-memory engine.
pub struct Orchestrator<E: FormatEngine, C: Collective> {
    engine: E,
    comm: C,
    owner: usize,
    cache: StagingCache,
}

impl<E: FormatEngine, C: Collective> Orchestrator<E, C> {
    /// Creates an orchestrator with rank 0 as the file owner.
    pub fn new(engine: E, comm: C) -> Self {
        Self::with_owner(engine, comm, 0)
    }

    /// Creates an orchestrator with an explicit owner rank.
    pub fn with_owner(engine: E, comm: C, owner: usize) -> Self {
        Self {
            engine,
            comm,
            owner,
            cache: StagingCache::new(),
        }
    }

    /// Whether this rank owns the file.
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.comm.rank() == self.owner
    }

    /// The owner rank.
    #[inline]
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Read-only view of a grid's staging area, if one exists.
    pub fn staging(&self, grid: &str) -> Option<&FileStagingArea> {
        self.cache.get(grid)
    }

    /// Mutable access to a grid's staging area, created on first use.
    /// Callers use this to pre-register schema entries before writing.
    pub fn staging_mut(&mut self, grid: &str) -> &mut FileStagingArea {
        self.cache.entry(grid)
    }

    /// Grid identifiers with cached staging state.
    pub fn cached_grids(&self) -> impl Iterator<Item = &str> {
        self.cache.grids()
    }

    /// Opens the file for reading. Owner only; other ranks no-op.
    pub fn open_read(&mut self, path: &Path) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        match self.engine.open(path, FileMode::Read) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Opens the file for writing, truncating. Owner only; other ranks no-op.
    pub fn open_write(&mut self, path: &Path) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        match self.engine.open(path, FileMode::Write) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Closes the current handle. Owner only; other ranks no-op.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        match self.engine.close() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// The two-step failure contract: signal all peers, then fail locally.
    ///
    /// Closes the handle best-effort first so the file is not left dangling
    /// on the owner.
    pub(crate) fn fail(&mut self, err: BridgeError) -> BridgeError {
        let _ = self.engine.close();
        error!("aborting process group: {err}");
        self.comm.abort(1);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_facts_wire_roundtrip() {
        let facts = ScalarFacts {
            element_type: ElementType::Float,
            buffer_levels: 70,
            points: 13_824,
        };
        let wire = facts.encode();
        assert_eq!(ScalarFacts::decode(&wire).unwrap(), facts);
    }

    #[test]
    fn scalar_facts_reject_garbage_code() {
        let mut wire = [0u8; ScalarFacts::WIRE_LEN];
        wire[0] = 200;
        assert!(matches!(
            ScalarFacts::decode(&wire),
            Err(BridgeError::BadTypeCode(200))
        ));
    }
}
