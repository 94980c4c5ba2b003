//! # hosts-resolver
//!
//! Keep id-keyed host bindings in sync with the system hosts file.
//!
//! Callers bind one or more names to an address under an id they manage
//! (a container id, a service name) and later drop the binding by id. Every
//! change is written to the hosts file and flushed before the call returns,
//! so the operating system's own resolver picks the names up. Nothing here
//! answers DNS queries.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use hosts_resolver::{HostsConfig, HostsRegistry, Resolver};
//!
//! // Requires root for /etc/hosts.
//! let registry = HostsRegistry::open(&HostsConfig::new().with_owner("myapp"))?;
//!
//! registry.add_host("web1", "192.168.1.10".parse()?, "web.internal", &["www.internal"])?;
//! // /etc/hosts now contains:
//! // 192.168.1.10 web.internal www.internal # managed by myapp (pid=12345)
//!
//! registry.remove_host("web1")?;
//! ```
//!
//! ## Backends
//!
//! [`Resolver`] is the surface shared with query-serving backends. This
//! crate's [`HostsRegistry`] implements the upstream and listener methods as
//! logged no-ops; [`Resolver::capabilities`] says so explicitly.
//!
//! The registry is generic over [`HostsTable`]: [`HostsFile`] edits a real
//! file, [`MemoryTable`] keeps everything in memory.
//!
//! ## Crash recovery
//!
//! Lines record the PID of the process that wrote them. Enable
//! [`HostsConfig::with_orphan_cleanup`] (or call
//! [`HostsFile::cleanup_orphaned`]) to drop lines left behind by processes
//! that exited without removing their bindings.
//!
//! ## Permissions
//!
//! Writing to `/etc/hosts` requires root. The caller is responsible for
//! privilege elevation.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entry;
pub mod error;
pub mod hosts_file;
pub mod registry;
pub mod resolver;
pub mod table;
pub mod util;

pub use config::{Consistency, HostsConfig};
pub use entry::HostsEntry;
pub use error::{ResolverError, Result};
pub use hosts_file::HostsFile;
pub use registry::HostsRegistry;
pub use resolver::{Capabilities, Resolver};
pub use table::{HostsTable, MemoryTable};
