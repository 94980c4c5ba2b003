//! The backend-agnostic resolver surface.

use crate::error::Result;
use std::net::IpAddr;

/// What a backend actually supports beyond host bindings.
///
/// Every backend implements every [`Resolver`] method, but unsupported ones
/// are no-ops. Callers that care can branch on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Forwards queries for some domains to upstream servers.
    pub upstreams: bool,

    /// Serves queries itself and has a real `listen`/`close` lifecycle.
    pub listener: bool,
}

/// A name-resolution backend.
///
/// Implementations must be usable from many threads at once. Methods a
/// backend cannot support are documented no-ops returning `Ok(())`, so code
/// written against this trait works with any backend.
pub trait Resolver: Send + Sync {
    /// Binds `name` and `aliases` to `address` under `id`, replacing any
    /// previous binding for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding could not be recorded or persisted.
    fn add_host(&self, id: &str, address: IpAddr, name: &str, aliases: &[&str]) -> Result<()>;

    /// Drops the binding for `id`. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding could not be removed or the removal
    /// could not be persisted.
    fn remove_host(&self, id: &str) -> Result<()>;

    /// Forwards queries for `domains` to `address:port` under `id`.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn add_upstream(&self, id: &str, address: IpAddr, port: u16, domains: &[&str]) -> Result<()>;

    /// Drops the upstream registered under `id`.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn remove_upstream(&self, id: &str) -> Result<()>;

    /// Starts serving.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn listen(&self) -> Result<()>;

    /// Stops serving and releases [`wait`](Self::wait). Never blocks.
    fn close(&self);

    /// Blocks until [`close`](Self::close) has been called.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn wait(&self) -> Result<()>;

    /// Reports which optional capabilities are real.
    fn capabilities(&self) -> Capabilities;
}
