//! File-based hosts table.
//!
//! Every line written by this module carries a marker comment with the owner
//! tag and the creating process's PID, enabling safe ownership checks and
//! orphan cleanup. Lines without the marker are never modified.

use crate::config::HostsConfig;
use crate::entry::{HostsEntry, validate_name};
use crate::error::Result;
use crate::table::HostsTable;
use crate::util::is_process_alive;
use std::fs::Permissions;
use std::io::{ErrorKind, Write as _};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix of the marker comment embedded in every managed line.
const MANAGED_BY_MARKER: &str = "# managed by";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eol {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    None,
}

impl Eol {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

#[derive(Debug, Clone)]
enum Body {
    Entry {
        address: IpAddr,
        names: Vec<String>,
        comment: Option<String>,
        /// Original text, dropped once the line is edited.
        raw: Option<String>,
    },
    Raw(String),
}

#[derive(Debug, Clone)]
struct Line {
    body: Body,
    eol: Eol,
}

impl Body {
    fn parse(text: &str, lineno: usize) -> Self {
        let (content, comment) = match text.find('#') {
            Some(i) => (&text[..i], Some(text[i..].trim_end().to_string())),
            None => (text, None),
        };

        let mut tokens = content.split_whitespace();
        let Some(first) = tokens.next() else {
            return Self::Raw(text.to_string());
        };
        let Ok(address) = first.parse::<IpAddr>() else {
            tracing::warn!(line = lineno, token = %first, "Unrecognized hosts line, keeping as-is");
            return Self::Raw(text.to_string());
        };
        let names: Vec<String> = tokens.map(ToString::to_string).collect();
        if names.is_empty() {
            return Self::Raw(text.to_string());
        }

        Self::Entry {
            address,
            names,
            comment,
            raw: Some(text.to_string()),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Raw(text) | Self::Entry { raw: Some(text), .. } => text.clone(),
            Self::Entry {
                address,
                names,
                comment,
                raw: None,
            } => {
                let mut out = format!("{address} {}", names.join(" "));
                if let Some(c) = comment {
                    out.push(' ');
                    out.push_str(c);
                }
                out
            }
        }
    }
}

/// A buffered change, replayed onto the file as it is on disk at flush time.
#[derive(Debug, Clone)]
enum Edit {
    Add {
        address: IpAddr,
        names: Vec<String>,
        comment: String,
    },
    Remove {
        address: IpAddr,
        names: Vec<String>,
    },
    DropOrphans,
}

impl Edit {
    /// Applies the edit and returns the number of lines it added or dropped.
    fn apply(&self, lines: &mut Vec<Line>, marker: &str) -> usize {
        match self {
            Self::Add {
                address,
                names,
                comment,
            } => {
                let mut fresh: Vec<String> = Vec::new();
                for name in names {
                    if !has(lines, *address, name) && !fresh.contains(name) {
                        fresh.push(name.clone());
                    }
                }
                if fresh.is_empty() {
                    return 0;
                }
                let eol = default_eol(lines);
                lines.push(Line {
                    body: Body::Entry {
                        address: *address,
                        names: fresh,
                        comment: Some(comment.clone()),
                        raw: None,
                    },
                    eol,
                });
                1
            }
            Self::Remove { address, names } => {
                for line in lines.iter_mut() {
                    if let Body::Entry {
                        address: a,
                        names: line_names,
                        comment: Some(c),
                        raw,
                    } = &mut line.body
                    {
                        if *a != *address || extract_pid(c, marker).is_none() {
                            continue;
                        }
                        let before = line_names.len();
                        line_names.retain(|n| !names.contains(n));
                        if line_names.len() != before {
                            *raw = None;
                        }
                    }
                }
                let before = lines.len();
                lines.retain(|l| !matches!(&l.body, Body::Entry { names, .. } if names.is_empty()));
                before - lines.len()
            }
            Self::DropOrphans => {
                let before = lines.len();
                lines.retain(|l| {
                    let Body::Entry {
                        comment: Some(c), ..
                    } = &l.body
                    else {
                        return true;
                    };
                    extract_pid(c, marker).is_none_or(is_process_alive)
                });
                before - lines.len()
            }
        }
    }
}

/// Edits a hosts file in place.
///
/// Changes from [`add`](HostsTable::add) and [`remove`](HostsTable::remove)
/// are buffered. [`flush`](HostsTable::flush) re-reads the file, replays the
/// buffered changes onto it, and atomically replaces it, so lines other tools
/// wrote since the last read survive.
///
/// # Ownership
///
/// Added lines end in `# managed by <owner> (pid=<N>)`. `remove` only strips
/// names from lines carrying this crate's owner tag, so hand-written lines
/// such as `127.0.0.1 localhost` are left alone. Line endings (LF or CRLF)
/// are kept as found.
///
/// # Crash recovery
///
/// Managed lines outlive the process that wrote them. Call
/// [`cleanup_orphaned`](Self::cleanup_orphaned) on startup to remove lines
/// whose creating PID is no longer running.
///
/// # Permissions
///
/// `/etc/hosts` requires root. The caller must handle elevation.
///
/// # Example
///
/// ```rust,ignore
/// use hosts_resolver::{HostsFile, HostsTable};
///
/// let mut hosts = HostsFile::open("/etc/hosts", "myapp")?;
/// hosts.add("10.0.0.5".parse()?, &["svc.local".to_string()])?;
/// hosts.flush()?;
/// ```
#[derive(Debug)]
pub struct HostsFile {
    path: PathBuf,
    owner: String,
    /// Last read of the file with `pending` applied.
    lines: Vec<Line>,
    pending: Vec<Edit>,
}

impl HostsFile {
    /// Loads `path`. A missing file is treated as empty and created on the
    /// first flush.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Io`](crate::ResolverError::Io) if the file
    /// exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>, owner: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let lines = read_lines(&path)?;
        Ok(Self {
            path,
            owner: owner.into(),
            lines,
            pending: Vec::new(),
        })
    }

    /// Loads the file named by `config`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn from_config(config: &HostsConfig) -> Result<Self> {
        Self::open(config.path.clone(), config.owner.clone())
    }

    /// Returns the hosts file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the owner tag.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Re-reads the file and re-applies changes not yet flushed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Io`](crate::ResolverError::Io) if the file
    /// exists but cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        self.lines = self.replayed()?;
        Ok(())
    }

    /// Returns every entry line, managed or not, in file order.
    #[must_use]
    pub fn entries(&self) -> Vec<HostsEntry> {
        self.entry_lines(|_| true)
    }

    /// Returns the entry lines written by this owner.
    #[must_use]
    pub fn managed(&self) -> Vec<HostsEntry> {
        let marker = self.marker_prefix();
        self.entry_lines(|c| c.is_some_and(|c| extract_pid(c, &marker).is_some()))
    }

    /// Returns every address `name` is bound to.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Vec<IpAddr> {
        self.lines
            .iter()
            .filter_map(|l| match &l.body {
                Body::Entry { address, names, .. } if names.iter().any(|n| n == name) => {
                    Some(*address)
                }
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if `name` is bound to `address` on any line.
    #[must_use]
    pub fn has(&self, address: IpAddr, name: &str) -> bool {
        has(&self.lines, address, name)
    }

    /// Removes managed lines whose creating PID is no longer running, then
    /// flushes.
    ///
    /// Returns the number of lines removed. Unmanaged lines and lines owned by
    /// still-alive processes are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Io`](crate::ResolverError::Io) if the file
    /// cannot be read or rewritten.
    pub fn cleanup_orphaned(&mut self) -> Result<usize> {
        self.reload()?;
        let removed = self.edit(Edit::DropOrphans);
        if removed > 0 {
            tracing::info!(
                removed,
                path = %self.path.display(),
                "Removing orphaned hosts lines (process dead)"
            );
            self.flush()?;
        } else {
            self.pending.pop();
        }
        Ok(removed)
    }

    fn edit(&mut self, edit: Edit) -> usize {
        let marker = self.marker_prefix();
        let changed = edit.apply(&mut self.lines, &marker);
        self.pending.push(edit);
        changed
    }

    fn replayed(&self) -> Result<Vec<Line>> {
        let mut lines = read_lines(&self.path)?;
        let marker = self.marker_prefix();
        for edit in &self.pending {
            edit.apply(&mut lines, &marker);
        }
        Ok(lines)
    }

    fn entry_lines(&self, keep: impl Fn(Option<&str>) -> bool) -> Vec<HostsEntry> {
        self.lines
            .iter()
            .filter_map(|l| match &l.body {
                Body::Entry {
                    address,
                    names,
                    comment,
                    ..
                } if keep(comment.as_deref()) => Some(HostsEntry {
                    address: *address,
                    names: names.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn marker_prefix(&self) -> String {
        format!("{MANAGED_BY_MARKER} {}", self.owner)
    }
}

impl HostsTable for HostsFile {
    fn add(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        names.iter().try_for_each(|n| validate_name(n))?;
        let pid = std::process::id();
        let added = self.edit(Edit::Add {
            address,
            names: names.to_vec(),
            comment: format!("{} (pid={pid})", self.marker_prefix()),
        });
        if added == 0 {
            tracing::debug!(address = %address, "All names already present, nothing to add");
        }
        Ok(())
    }

    fn remove(&mut self, address: IpAddr, names: &[String]) -> Result<()> {
        self.edit(Edit::Remove {
            address,
            names: names.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let lines = self.replayed()?;
        write_atomic(&self.path, render(&lines).as_bytes())?;
        self.lines = lines;
        self.pending.clear();
        tracing::debug!(path = %self.path.display(), "Flushed hosts file");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_lines(path: &Path) -> Result<Vec<Line>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Hosts file does not exist, starting empty");
            String::new()
        }
        Err(e) => return Err(e.into()),
    };
    Ok(parse(&content))
}

fn parse(content: &str) -> Vec<Line> {
    content
        .split_inclusive('\n')
        .enumerate()
        .map(|(i, segment)| {
            let (text, eol) = if let Some(t) = segment.strip_suffix("\r\n") {
                (t, Eol::CrLf)
            } else if let Some(t) = segment.strip_suffix('\n') {
                (t, Eol::Lf)
            } else {
                (segment, Eol::None)
            };
            Line {
                body: Body::parse(text, i + 1),
                eol,
            }
        })
        .collect()
}

/// CRLF if the file already uses it anywhere, LF otherwise.
fn default_eol(lines: &[Line]) -> Eol {
    if lines.iter().any(|l| l.eol == Eol::CrLf) {
        Eol::CrLf
    } else {
        Eol::Lf
    }
}

fn render(lines: &[Line]) -> String {
    let eol = default_eol(lines);
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(&line.body.render());
        let line_eol = if line.eol == Eol::None && i + 1 < lines.len() {
            eol
        } else {
            line.eol
        };
        out.push_str(line_eol.as_str());
    }
    out
}

fn has(lines: &[Line], address: IpAddr, name: &str) -> bool {
    lines.iter().any(|l| {
        matches!(&l.body, Body::Entry { address: a, names, .. }
            if *a == address && names.iter().any(|n| n == name))
    })
}

/// Replaces `path` with `content` via a synced temp file and a rename.
///
/// Falls back to rewriting in place when the rename is refused, as it is for
/// a bind-mounted `/etc/hosts` inside a container.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    if let Some(perms) = permissions_for(&target)? {
        tmp.as_file().set_permissions(perms)?;
    }
    tmp.as_file().sync_all()?;

    match tmp.persist(&target) {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.error.kind(), ErrorKind::CrossesDevices | ErrorKind::ResourceBusy) => {
            tracing::debug!(
                path = %target.display(),
                error = %e.error,
                "Cannot replace hosts file, rewriting in place"
            );
            let mut file = std::fs::File::create(&target)?;
            file.write_all(content)?;
            file.sync_all()
        }
        Err(e) => Err(e.error),
    }
}

/// Mode of the existing file, or `0644` for a new one.
fn permissions_for(path: &Path) -> std::io::Result<Option<Permissions>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(default_permissions()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
const fn default_permissions() -> Option<Permissions> {
    None
}

/// Extracts the PID from `# managed by <owner> (pid=<N>)`.
fn extract_pid(comment: &str, marker: &str) -> Option<u32> {
    let rest = comment.strip_prefix(marker)?;
    let rest = rest.trim().strip_prefix("(pid=")?;
    rest.strip_suffix(')')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(ToString::to_string).collect()
    }

    const SAMPLE: &str = "\
# static table
127.0.0.1\tlocalhost
::1 localhost ip6-localhost # loopback
fe80::1%lo0 localhost

";

    #[test]
    fn parse_keeps_unmanaged_content_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        assert_eq!(hosts.entries().len(), 2);
        assert!(hosts.managed().is_empty());

        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        hosts.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(SAMPLE));
        assert!(content.contains("10.0.0.5 svc.local # managed by test (pid="));
    }

    #[test]
    fn crlf_endings_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let original = "# windows\r\n127.0.0.1 localhost\r\n";
        std::fs::write(&path, original).unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        hosts.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(original));
        assert!(content.ends_with(")\r\n"));
        assert!(!content.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn missing_trailing_newline_is_completed_before_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost").unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        hosts.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("127.0.0.1 localhost\n10.0.0.5 svc.local"));
        assert!(content.ends_with(")\n"));
    }

    #[test]
    fn flush_keeps_lines_written_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost\n").unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        std::fs::write(&path, "127.0.0.1 localhost\n10.1.1.1 admin.example\n").unwrap();
        hosts.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("127.0.0.1 localhost\n10.1.1.1 admin.example\n"));
        assert!(content.contains("10.0.0.5 svc.local"));
        assert_eq!(hosts.lookup("admin.example"), vec!["10.1.1.1".parse::<IpAddr>().unwrap()]);
    }

    #[cfg(unix)]
    #[test]
    fn flush_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost\n").unwrap();
        std::fs::set_permissions(&path, Permissions::from_mode(0o644)).unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        hosts.flush().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        // Only the hosts file is left; the temp file was renamed over it.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let mut hosts = HostsFile::open(&path, "test").unwrap();
        assert!(hosts.entries().is_empty());

        hosts.flush().unwrap();
        assert!(!path.exists());

        hosts.add("10.0.0.5".parse().unwrap(), &names(&["svc.local"])).unwrap();
        hosts.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn add_skips_names_bound_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts
            .add("127.0.0.1".parse().unwrap(), &names(&["localhost"]))
            .unwrap();
        assert!(hosts.managed().is_empty());
    }

    #[test]
    fn remove_only_touches_managed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost app.local\n").unwrap();

        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        let mut hosts = HostsFile::open(&path, "test").unwrap();
        hosts.add(addr, &names(&["app.local", "api.local"])).unwrap();
        assert_eq!(hosts.managed()[0].names, ["api.local"]);

        hosts.remove(addr, &names(&["app.local", "api.local"])).unwrap();
        hosts.flush().unwrap();

        assert!(hosts.has(addr, "app.local"));
        assert!(!hosts.has(addr, "api.local"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "127.0.0.1 localhost app.local\n"
        );
    }

    #[test]
    fn remove_strips_partial_names() {
        let dir = tempfile::tempdir().unwrap();
        let addr: IpAddr = "10.0.0.5".parse().unwrap();
        let mut hosts = HostsFile::open(dir.path().join("hosts"), "test").unwrap();
        hosts.add(addr, &names(&["a.local", "b.local"])).unwrap();
        hosts.remove(addr, &names(&["a.local"])).unwrap();

        let managed = hosts.managed();
        assert_eq!(managed.len(), 1);
        assert_eq!(managed[0].names, ["b.local"]);
        assert_eq!(hosts.lookup("b.local"), vec![addr]);
        assert!(hosts.lookup("a.local").is_empty());
    }

    #[test]
    fn other_owners_are_not_managed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "10.0.0.9 x.local # managed by testapp (pid=1)\n").unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        assert!(hosts.managed().is_empty());
        hosts
            .remove("10.0.0.9".parse().unwrap(), &names(&["x.local"]))
            .unwrap();
        assert_eq!(hosts.entries().len(), 1);
    }

    #[test]
    fn extract_pid_parses_marker() {
        assert_eq!(
            extract_pid("# managed by test (pid=42)", "# managed by test"),
            Some(42)
        );
        assert_eq!(extract_pid("# loopback", "# managed by test"), None);
        assert_eq!(
            extract_pid("# managed by testapp (pid=42)", "# managed by test"),
            None
        );
    }

    #[test]
    fn cleanup_removes_dead_pid_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let pid = std::process::id();
        std::fs::write(
            &path,
            format!(
                "127.0.0.1 localhost\n\
                 10.0.0.1 stale.local # managed by test (pid=999999999)\n\
                 10.0.0.2 alive.local # managed by test (pid={pid})\n"
            ),
        )
        .unwrap();

        let mut hosts = HostsFile::open(&path, "test").unwrap();
        assert_eq!(hosts.cleanup_orphaned().unwrap(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale.local"));
        assert!(content.contains("alive.local"));
        assert!(content.contains("localhost"));

        assert_eq!(hosts.cleanup_orphaned().unwrap(), 0);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut hosts = HostsFile::open(dir.path().join("hosts"), "test").unwrap();
        assert!(
            hosts
                .add("10.0.0.1".parse().unwrap(), &names(&["a#b"]))
                .is_err()
        );
        assert!(hosts.entries().is_empty());
    }
}
