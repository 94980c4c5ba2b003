//! The hosts-table capability consumed by the registry.

use crate::entry::{HostsEntry, validate_name};
use crate::error::Result;
use std::net::IpAddr;

/// A persistent, line-oriented address/name table.
///
/// Implementations may buffer `add`/`remove` and persist them on `flush`,
/// or apply them immediately and treat `flush` as a no-op.
pub trait HostsTable: Send {
    /// Binds `names` to `address`. Names already bound to `address` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the association cannot be recorded.
    fn add(&mut self, address: IpAddr, names: &[String]) -> Result<()>;

    /// Unbinds `names` from `address`. Unknown pairs are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the association cannot be removed.
    fn remove(&mut self, address: IpAddr, names: &[String]) -> Result<()>;

    /// Makes pending changes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the changes cannot be persisted.
    fn flush(&mut self) -> Result<()>;
}

impl<T: HostsTable + ?Sized> HostsTable for Box<T> {
    fn add(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        (**self).add(address, names)
    }

    fn remove(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        (**self).remove(address, names)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// In-memory table, one line per `add` call. Useful for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryTable {
    lines: Vec<HostsEntry>,
}

impl MemoryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current lines.
    #[must_use]
    pub fn lines(&self) -> &[HostsEntry] {
        &self.lines
    }

    /// Returns `true` if `name` is bound to `address` on any line.
    #[must_use]
    pub fn contains(&self, address: IpAddr, name: &str) -> bool {
        self.lines
            .iter()
            .any(|l| l.address == address && l.names.iter().any(|n| n == name))
    }
}

impl HostsTable for MemoryTable {
    fn add(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        let mut fresh = Vec::new();
        for name in names {
            validate_name(name)?;
            if !self.contains(address, name) && !fresh.contains(name) {
                fresh.push(name.clone());
            }
        }
        if !fresh.is_empty() {
            self.lines.push(HostsEntry {
                address,
                names: fresh,
            });
        }
        Ok(())
    }

    fn remove(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        for line in self.lines.iter_mut().filter(|l| l.address == address) {
            line.names.retain(|n| !names.contains(n));
        }
        self.lines.retain(|l| !l.names.is_empty());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
