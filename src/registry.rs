//! Id-keyed host bindings mirrored into a hosts table.

use crate::config::{Consistency, HostsConfig};
use crate::entry::HostsEntry;
use crate::error::{ResolverError, Result};
use crate::hosts_file::HostsFile;
use crate::resolver::{Capabilities, Resolver};
use crate::table::HostsTable;
use std::collections::HashMap;
use std::net::IpAddr;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Hosts-table backed [`Resolver`].
///
/// Keeps an `id → HostsEntry` map and mirrors every change into the owned
/// table, flushing after each call. One mutex covers the map and the table
/// for the whole of each call, so the two are updated as a unit.
///
/// # Failure policy
///
/// With [`Consistency::Rollback`] (the default) a failed call undoes its own
/// table changes and leaves the map as it was. With
/// [`Consistency::BestEffort`] the map is updated first and kept even when
/// the table fails. Either way the error is returned, and a flush failure is
/// reported as [`ResolverError::Flush`] rather than [`ResolverError::Write`].
///
/// # Shared names
///
/// If two ids bind the same name to the same address, removing one keeps the
/// table binding until the other is removed too.
///
/// # Lifecycle
///
/// There is no listener. [`listen`](Resolver::listen) is a no-op,
/// [`close`](Resolver::close) only releases [`wait`](Resolver::wait), and the
/// table is not cleaned when the process exits.
///
/// # Example
///
/// ```
/// use hosts_resolver::{HostsRegistry, MemoryTable, Resolver};
///
/// let registry = HostsRegistry::with_table(MemoryTable::new());
/// let addr = "192.168.1.10".parse().unwrap();
///
/// registry.add_host("web1", addr, "web.internal", &["www.internal"]).unwrap();
/// assert!(registry.inspect_table(|t| t.contains(addr, "www.internal")));
///
/// registry.remove_host("web1").unwrap();
/// assert!(registry.is_empty());
/// ```
pub struct HostsRegistry<T: HostsTable = HostsFile> {
    state: Mutex<State<T>>,
    consistency: Consistency,
    stopped: Mutex<bool>,
    stop_signal: Condvar,
}

struct State<T> {
    entries: HashMap<String, HostsEntry>,
    table: T,
}

/// Table operations of one call, applied in order: release, claim, flush.
struct Change<'a> {
    release: Option<(IpAddr, &'a [String])>,
    claim: Option<(IpAddr, &'a [String])>,
    /// Names `claim` introduces; removed again on undo.
    claimed: &'a [String],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Nothing,
    Released,
    Claimed,
}

impl HostsRegistry<HostsFile> {
    /// Opens the hosts file named by `config`.
    ///
    /// Runs [`HostsFile::cleanup_orphaned`] first when the config asks for it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Io`] if the file cannot be read, or cannot be
    /// rewritten during orphan cleanup.
    pub fn open(config: &HostsConfig) -> Result<Self> {
        let mut table = HostsFile::from_config(config)?;
        if config.cleanup_orphaned {
            let removed = table.cleanup_orphaned()?;
            tracing::debug!(removed, path = %table.path().display(), "Orphan cleanup done");
        }
        tracing::info!(
            path = %table.path().display(),
            owner = %table.owner(),
            "Opened hosts file resolver"
        );
        Ok(Self::with_table(table).consistency(config.consistency))
    }
}

impl<T: HostsTable> HostsRegistry<T> {
    /// Creates an empty registry over `table` with the default failure policy.
    #[must_use]
    pub fn with_table(table: T) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                table,
            }),
            consistency: Consistency::default(),
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
        }
    }

    /// Overrides the failure policy.
    #[must_use]
    pub const fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Returns the binding for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<HostsEntry> {
        self.lock_state().entries.get(id).cloned()
    }

    /// Returns `true` if `id` has a binding.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock_state().entries.contains_key(id)
    }

    /// Returns every bound id, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.lock_state().entries.keys().cloned().collect()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    /// Returns `true` if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    /// Runs `f` against the table while holding the registry lock.
    pub fn inspect_table<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock_state().table)
    }

    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        // Map and table agree whenever the lock is released.
        self.state.lock()
    }

    fn rollback(&self) -> bool {
        self.consistency == Consistency::Rollback
    }
}

impl<T: HostsTable> State<T> {
    /// Names of `entry` that no other id claims and `keep` does not reuse.
    fn releasable(&self, id: &str, entry: &HostsEntry, keep: Option<&HostsEntry>) -> Vec<String> {
        entry
            .names
            .iter()
            .filter(|n| !keep.is_some_and(|k| k.address == entry.address && k.names.contains(*n)))
            .filter(|n| {
                !self.entries.iter().any(|(other, e)| {
                    other != id && e.address == entry.address && e.names.contains(*n)
                })
            })
            .cloned()
            .collect()
    }

    fn apply(&mut self, id: &str, change: &Change<'_>, rollback: bool) -> Result<()> {
        let mut stage = Stage::Nothing;
        let result = self.try_apply(id, change, &mut stage);
        if result.is_err() && rollback {
            self.undo(id, change, stage);
        }
        result
    }

    fn try_apply(&mut self, id: &str, change: &Change<'_>, stage: &mut Stage) -> Result<()> {
        if let Some((address, names)) = change.release {
            if !names.is_empty() {
                self.table
                    .remove(address, names)
                    .map_err(|e| ResolverError::write(id, e))?;
            }
        }
        *stage = Stage::Released;

        if let Some((address, names)) = change.claim {
            self.table
                .add(address, names)
                .map_err(|e| ResolverError::write(id, e))?;
        }
        *stage = Stage::Claimed;

        self.table.flush().map_err(|e| ResolverError::flush(id, e))
    }

    /// Reverts the table operations that succeeded before `stage` failed.
    ///
    /// Buffered tables end up matching what was last flushed, so no flush is
    /// attempted here.
    fn undo(&mut self, id: &str, change: &Change<'_>, stage: Stage) {
        if stage == Stage::Claimed && !change.claimed.is_empty() {
            if let Some((address, _)) = change.claim {
                if let Err(e) = self.table.remove(address, change.claimed) {
                    tracing::warn!(id = %id, error = %e, "Failed to undo hosts table add");
                }
            }
        }
        if stage != Stage::Nothing {
            if let Some((address, names)) = change.release {
                if !names.is_empty() {
                    if let Err(e) = self.table.add(address, names) {
                        tracing::warn!(id = %id, error = %e, "Failed to undo hosts table removal");
                    }
                }
            }
        }
    }
}

impl<T: HostsTable> Resolver for HostsRegistry<T> {
    fn add_host(&self, id: &str, address: IpAddr, name: &str, aliases: &[&str]) -> Result<()> {
        let entry = HostsEntry::new(address, name, aliases);
        entry.validate()?;

        let mut state = self.lock_state();
        let previous = state.entries.get(id).cloned();
        let stale = previous
            .as_ref()
            .map_or_else(Vec::new, |p| state.releasable(id, p, Some(&entry)));
        let claimed = state.releasable(id, &entry, previous.as_ref());

        if !self.rollback() {
            state.entries.insert(id.to_string(), entry.clone());
        }

        let change = Change {
            release: previous.as_ref().map(|p| (p.address, stale.as_slice())),
            claim: Some((entry.address, entry.names.as_slice())),
            claimed: &claimed,
        };
        state.apply(id, &change, self.rollback())?;

        tracing::info!(id = %id, address = %address, names = ?entry.names, "Added host");
        state.entries.insert(id.to_string(), entry);
        Ok(())
    }

    fn remove_host(&self, id: &str) -> Result<()> {
        let mut state = self.lock_state();
        let Some(entry) = state.entries.get(id).cloned() else {
            tracing::debug!(id = %id, "Host not registered, skipping");
            return Ok(());
        };
        let released = state.releasable(id, &entry, None);

        if !self.rollback() {
            state.entries.remove(id);
        }

        let change = Change {
            release: Some((entry.address, released.as_slice())),
            claim: None,
            claimed: &[],
        };
        state.apply(id, &change, self.rollback())?;

        state.entries.remove(id);
        tracing::info!(id = %id, address = %entry.address, "Removed host");
        Ok(())
    }

    fn add_upstream(&self, id: &str, address: IpAddr, port: u16, domains: &[&str]) -> Result<()> {
        tracing::warn!(
            id = %id,
            address = %address,
            port,
            domains = ?domains,
            "add_upstream is not supported by the hosts file resolver"
        );
        Ok(())
    }

    fn remove_upstream(&self, id: &str) -> Result<()> {
        tracing::warn!(id = %id, "remove_upstream is not supported by the hosts file resolver");
        Ok(())
    }

    fn listen(&self) -> Result<()> {
        tracing::warn!("listen is not supported by the hosts file resolver");
        Ok(())
    }

    fn close(&self) {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            *stopped = true;
            self.stop_signal.notify_all();
            tracing::debug!("Hosts file resolver closed");
        }
    }

    fn wait(&self) -> Result<()> {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            self.stop_signal.wait(&mut stopped);
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}
