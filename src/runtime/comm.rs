//! Thin façade over the process group's collective operations.
//!
//! Parallelism here is one process per partition under MPI-style message
//! passing; there are no local threads or coroutines. Every "wait" in this
//! crate is a blocking collective that all participating ranks must reach,
//! which is why the error path signals the whole group (`abort`) before
//! failing locally — a silently dead rank leaves everyone else hanging in a
//! broadcast forever.

use log::error;

/// Blocking collective interface (minimal by design).
///
/// Only what the orchestrator needs: rank identity, a byte broadcast for
/// scalar facts, and a group-wide abort for the fail-fast error path.
pub trait Collective: Send + Sync {
    /// This process's rank within the group.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Broadcasts `buf` from `root` to every rank, blocking until all
    /// participants arrive. On non-root ranks `buf` is overwritten.
    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]);

    /// Signals the whole group to terminate. Called on the detecting rank
    /// just before it raises an error locally, so no peer deadlocks waiting
    /// on a collective that will never be posted.
    fn abort(&self, code: i32);
}

/// Serial no-op group for single-process runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Collective for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_bytes(&self, _root: usize, _buf: &mut [u8]) {}

    fn abort(&self, code: i32) {
        // With one rank there is nobody to signal; the local error that
        // follows carries the diagnosis.
        error!("serial abort requested (code {code})");
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Collective;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI-backed collective group over the world communicator.
    pub struct MpiComm {
        universe: mpi::environment::Universe,
    }

    impl MpiComm {
        /// Initializes MPI and binds to the world communicator.
        pub fn new() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            Self { universe }
        }

        fn world(&self) -> SimpleCommunicator {
            self.universe.world()
        }
    }

    impl Default for MpiComm {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Collective for MpiComm {
        fn rank(&self) -> usize {
            self.world().rank() as usize
        }

        fn size(&self) -> usize {
            self.world().size() as usize
        }

        fn broadcast_bytes(&self, root: usize, buf: &mut [u8]) {
            self.world()
                .process_at_rank(root as i32)
                .broadcast_into(buf);
        }

        fn abort(&self, code: i32) {
            self.world().abort(code);
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_group_is_rank_zero_of_one() {
        let comm = NoComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
    }

    #[test]
    fn serial_broadcast_leaves_root_buffer_intact() {
        let comm = NoComm;
        let mut buf = [1u8, 2, 3];
        comm.broadcast_bytes(0, &mut buf);
        assert_eq!(buf, [1, 2, 3]);
    }
}
