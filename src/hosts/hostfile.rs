//! Hosts-file parsing.
//!
//! Each non-comment line is `IP name1 name2 ...`. When several files (or
//! lines) name the same domain, the first occurrence wins. Only IPv4 lines
//! become overrides.

use rustc_hash::FxHashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use tracing::warn;

use crate::record::normalize;

/// One generation of static overrides. Immutable once built.
#[derive(Debug, Default)]
pub struct Hosts {
    entries: FxHashMap<String, IpAddr>,
}

impl Hosts {
    /// Parse a single hosts file's contents.
    pub fn parse(text: &str) -> Self {
        let mut hosts = Self::default();
        hosts.extend_from(text);
        hosts
    }

    /// Load and merge `paths` in order. Unreadable files are skipped with a
    /// warning.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut hosts = Self::default();
        for path in paths {
            let path = path.as_ref();
            match fs::read_to_string(path) {
                Ok(text) => hosts.extend_from(&text),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read hosts file"),
            }
        }
        hosts
    }

    fn extend_from(&mut self, text: &str) {
        for line in text.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let mut fields = line.split_whitespace();
            let Some(Ok(ip)) = fields.next().map(str::parse::<Ipv4Addr>) else {
                continue;
            };
            for name in fields {
                self.entries.entry(normalize(name)).or_insert(IpAddr::V4(ip));
            }
        }
    }

    /// Look up a normalized domain.
    pub fn get(&self, domain: &str) -> Option<IpAddr> {
        self.entries.get(domain).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    #[test]
    fn parse_reads_all_names_on_a_line() {
        let hosts = Hosts::parse("10.0.0.1 router.lan gateway.lan\n");

        assert_eq!(hosts.get("router.lan"), ip(10, 0, 0, 1));
        assert_eq!(hosts.get("gateway.lan"), ip(10, 0, 0, 1));
        assert_eq!(hosts.len(), 2);
    }

    #[test]
    fn parse_skips_comments_and_junk() {
        let hosts = Hosts::parse(
            "# full line comment\n\
             \n\
             not-an-ip some.host\n\
             10.0.0.2\n\
             10.0.0.3 nas.lan # trailing comment\n",
        );

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts.get("nas.lan"), ip(10, 0, 0, 3));
        assert_eq!(hosts.get("some.host"), None);
    }

    #[test]
    fn parse_ignores_ipv6_lines() {
        let hosts = Hosts::parse(
            "::1 localhost ip6-localhost
             fe80::1%lo0 link.lan
             127.0.0.1 localhost
",
        );

        assert_eq!(hosts.get("ip6-localhost"), None);
        assert_eq!(hosts.get("link.lan"), None);
        assert_eq!(hosts.get("localhost"), ip(127, 0, 0, 1));
        assert_eq!(hosts.len(), 1);
    }

    #[test]
    fn parse_first_occurrence_wins() {
        let hosts = Hosts::parse("10.0.0.1 dup.lan\n10.0.0.9 dup.lan\n");

        assert_eq!(hosts.get("dup.lan"), ip(10, 0, 0, 1));
    }

    #[test]
    fn parse_normalizes_names() {
        let hosts = Hosts::parse("10.0.0.1 Printer.LAN.\n");

        assert_eq!(hosts.get("printer.lan"), ip(10, 0, 0, 1));
    }

    #[test]
    fn load_merges_files_in_order_and_skips_missing() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "10.0.0.1 shared.lan first.lan").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "10.0.0.2 shared.lan second.lan").unwrap();

        let hosts = Hosts::load(&[
            first.path().to_path_buf(),
            "/definitely/not/here".into(),
            second.path().to_path_buf(),
        ]);

        assert_eq!(hosts.get("shared.lan"), ip(10, 0, 0, 1));
        assert_eq!(hosts.get("first.lan"), ip(10, 0, 0, 1));
        assert_eq!(hosts.get("second.lan"), ip(10, 0, 0, 2));
    }
}
