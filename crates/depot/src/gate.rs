//! One-shot wait gates used to stagger chained transfers.
//!
//! A gate starts closed and is opened at most logically once by a chain
//! predecessor (or by the scheduler when admitting a root). Opening is
//! idempotent, which lets a ring's last member "re-open" the first
//! member's pre-opened gates without special casing.
//!
//! Lock order: the scheduler opens gates while holding the global state
//! mutex, and waiters park on a gate without it, so the state mutex
//! always precedes a gate mutex and no cycle is possible.

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub(crate) fn closed() -> Self {
        Self {
            open: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn opened() -> Self {
        Self {
            open: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Opens the gate and wakes every parked waiter. Idempotent.
    pub(crate) fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.cond.notify_all();
        }
    }

    /// Blocks the calling thread until the gate has been opened.
    pub(crate) fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

/// The two gates every pending transfer staggers on: the prepare gate
/// admits stage-1, the perform gate admits stage-2.
#[derive(Debug)]
pub(crate) struct GatePair {
    pub(crate) prepare: Gate,
    pub(crate) perform: Gate,
}

impl GatePair {
    /// Gates for a transfer that must wait to be chained or granted.
    pub(crate) fn closed() -> Self {
        Self {
            prepare: Gate::closed(),
            perform: Gate::closed(),
        }
    }

    /// Gates for a chain root, which has nothing to wait for.
    pub(crate) fn opened() -> Self {
        Self {
            prepare: Gate::opened(),
            perform: Gate::opened(),
        }
    }

    /// Opens both gates, turning the owner into a runnable root.
    pub(crate) fn open_both(&self) {
        self.prepare.open();
        self.perform.open();
    }
}
