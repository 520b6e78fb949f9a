//! CPU and RAM accounting for admitted work.
//!
//! The ledger is a plain value with no interior locking. It lives inside the
//! scheduler state next to the task store so that a reservation and the
//! `Running` transition it pays for happen under the same write guard.

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Point-in-time copy of the ledger counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Total CPU cores managed.
    pub total_cpu: u32,
    /// Total RAM in megabytes managed.
    pub total_ram: u32,
    /// CPU cores not reserved by running tasks.
    pub available_cpu: u32,
    /// RAM megabytes not reserved by running tasks.
    pub available_ram: u32,
}

impl LedgerSnapshot {
    /// CPU cores currently reserved.
    #[must_use]
    pub const fn used_cpu(&self) -> u32 {
        self.total_cpu - self.available_cpu
    }

    /// RAM megabytes currently reserved.
    #[must_use]
    pub const fn used_ram(&self) -> u32 {
        self.total_ram - self.available_ram
    }
}

/// Tracks total and available CPU/RAM.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    total_cpu: u32,
    total_ram: u32,
    available_cpu: u32,
    available_ram: u32,
}

impl ResourceLedger {
    /// Create a ledger with everything available.
    #[must_use]
    pub const fn new(total_cpu: u32, total_ram: u32) -> Self {
        Self {
            total_cpu,
            total_ram,
            available_cpu: total_cpu,
            available_ram: total_ram,
        }
    }

    /// Static admissibility: the demand must fit the *total* capacity,
    /// regardless of what is currently running.
    ///
    /// # Errors
    /// [`SchedulerError::InsufficientCapacity`] naming the first resource
    /// that does not fit.
    pub fn check(&self, cpu: u32, ram: u32) -> Result<(), SchedulerError> {
        if cpu > self.total_cpu {
            return Err(SchedulerError::InsufficientCapacity {
                resource: "cpu",
                requested: cpu,
                total: self.total_cpu,
            });
        }
        if ram > self.total_ram {
            return Err(SchedulerError::InsufficientCapacity {
                resource: "ram",
                requested: ram,
                total: self.total_ram,
            });
        }
        Ok(())
    }

    /// Whether the demand fits what is available right now.
    #[must_use]
    pub const fn fits(&self, cpu: u32, ram: u32) -> bool {
        cpu <= self.available_cpu && ram <= self.available_ram
    }

    /// Reserve resources. The caller has already confirmed [`Self::fits`].
    pub fn consume(&mut self, cpu: u32, ram: u32) {
        if !self.fits(cpu, ram) {
            tracing::error!(
                cpu,
                ram,
                available_cpu = self.available_cpu,
                available_ram = self.available_ram,
                "ledger consume without headroom"
            );
        }
        self.available_cpu = self.available_cpu.saturating_sub(cpu);
        self.available_ram = self.available_ram.saturating_sub(ram);
    }

    /// Return resources. Each successful [`Self::consume`] is matched by
    /// exactly one release.
    pub fn release(&mut self, cpu: u32, ram: u32) {
        let next_cpu = self.available_cpu.saturating_add(cpu);
        let next_ram = self.available_ram.saturating_add(ram);
        if next_cpu > self.total_cpu || next_ram > self.total_ram {
            tracing::error!(cpu, ram, "ledger release above total capacity");
        }
        self.available_cpu = next_cpu.min(self.total_cpu);
        self.available_ram = next_ram.min(self.total_ram);
    }

    /// Copy the counters.
    #[must_use]
    pub const fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total_cpu: self.total_cpu,
            total_ram: self.total_ram,
            available_cpu: self.available_cpu,
            available_ram: self.available_ram,
        }
    }
}
