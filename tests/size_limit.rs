//! A failed hosts-file rewrite must leave the previous content on disk.
//!
//! Kept in its own test binary: it lowers `RLIMIT_FSIZE` for the whole
//! process while the write runs.

#![cfg(unix)]

use hosts_resolver::{HostsConfig, HostsRegistry, Resolver};
use std::fmt::Write as _;

#[test]
fn failed_flush_leaves_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let mut original = String::from("127.0.0.1 localhost\n");
    for i in 0..200u32 {
        writeln!(original, "10.9.{}.{} static{i}.local", i / 256, i % 256).unwrap();
    }
    std::fs::write(&path, &original).unwrap();

    let r = HostsRegistry::open(&HostsConfig::new().with_path(&path).with_owner("testapp"))
        .unwrap();

    let mut saved = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let capped;
    // SAFETY: plain libc calls on valid pointers. Ignoring SIGXFSZ turns an
    // oversized write into an EFBIG error instead of killing the process.
    unsafe {
        libc::signal(libc::SIGXFSZ, libc::SIG_IGN);
        assert_eq!(libc::getrlimit(libc::RLIMIT_FSIZE, &mut saved), 0);
        capped = libc::rlimit {
            rlim_cur: 512,
            rlim_max: saved.rlim_max,
        };
        assert_eq!(libc::setrlimit(libc::RLIMIT_FSIZE, &capped), 0);
    }

    let result = r.add_host("c1", "10.0.0.5".parse().unwrap(), "svc.local", &[]);

    // SAFETY: restores the limit read above.
    unsafe {
        assert_eq!(libc::setrlimit(libc::RLIMIT_FSIZE, &saved), 0);
    }

    assert!(result.unwrap_err().is_flush());
    assert!(!r.contains("c1"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    // The temp file is gone too.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    // Once the limit is lifted the same call goes through.
    r.add_host("c1", "10.0.0.5".parse().unwrap(), "svc.local", &[])
        .unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with(&original));
    assert!(content.contains("10.0.0.5 svc.local"));
}
