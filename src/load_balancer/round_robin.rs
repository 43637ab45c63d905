//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::load_balancer::{Pool, Upstream};

/// Every backend in the pool is currently marked dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no healthy backend available")]
pub struct NoHealthyBackend;

/// Liveness-aware round-robin selector.
///
/// The cursor is a ticket counter; slot = ticket mod N. A successful
/// selection moves the cursor one past the chosen slot, so dead backends
/// are skipped without disturbing the order of the live ones.
#[derive(Debug)]
pub struct Selector {
    pool: Arc<Pool>,
    cursor: AtomicUsize,
}

impl Selector {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self {
            pool,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Choose the next live backend, starting from the cursor.
    pub fn next(&self) -> Result<Arc<dyn Upstream>, NoHealthyBackend> {
        let ticket = self.claim()?;
        let backends = self.pool.backends();
        Ok(backends[ticket % backends.len()].clone())
    }

    /// Scan one full rotation from the cursor and claim the first live slot.
    ///
    /// Returns the claimed ticket. A lost CAS means another caller claimed
    /// the slot first; rescan from the new cursor.
    fn claim(&self) -> Result<usize, NoHealthyBackend> {
        let backends = self.pool.backends();
        let len = backends.len();
        let mut current = self.cursor.load(Ordering::Acquire);

        'scan: loop {
            for i in 0..len {
                let ticket = current.wrapping_add(i);
                if !backends[ticket % len].is_alive() {
                    continue;
                }
                match self.cursor.compare_exchange_weak(
                    current,
                    ticket.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Ok(ticket),
                    Err(actual) => {
                        current = actual;
                        continue 'scan;
                    }
                }
            }
            return Err(NoHealthyBackend);
        }
    }
}
