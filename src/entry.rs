//! Host bindings.

use crate::error::{ResolverError, Result};
use std::fmt;
use std::net::IpAddr;

/// An address bound to one or more names.
///
/// The first name is the primary name, the rest are aliases. Renders as a
/// single hosts line.
///
/// # Example
///
/// ```
/// use hosts_resolver::HostsEntry;
///
/// let entry = HostsEntry::new("192.168.1.10".parse().unwrap(), "web.internal", &["www.internal"]);
///
/// assert_eq!(entry.primary(), "web.internal");
/// assert_eq!(entry.to_string(), "192.168.1.10 web.internal www.internal");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry {
    /// Resolution target.
    pub address: IpAddr,

    /// Primary name followed by aliases. Never empty.
    pub names: Vec<String>,
}

impl HostsEntry {
    /// Creates an entry from a primary name and zero or more aliases.
    #[must_use]
    pub fn new(address: IpAddr, name: impl Into<String>, aliases: &[&str]) -> Self {
        let mut names = Vec::with_capacity(aliases.len() + 1);
        names.push(name.into());
        names.extend(aliases.iter().map(ToString::to_string));
        Self { address, names }
    }

    /// Returns the primary name.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.names.first().map_or("", String::as_str)
    }

    /// Returns the aliases (every name after the primary one).
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        self.names.get(1..).unwrap_or_default()
    }

    /// Checks every name can be written on a hosts line.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidName`] for the first offending name.
    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(ResolverError::InvalidName(String::new()));
        }
        self.names.iter().try_for_each(|n| validate_name(n))
    }
}

impl fmt::Display for HostsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for name in &self.names {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

/// Rejects names that would corrupt a line: empty, whitespace, or `#`.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('#') || name.chars().any(char::is_whitespace) {
        return Err(ResolverError::InvalidName(name.to_string()));
    }
    Ok(())
}
