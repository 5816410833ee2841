use crate::error::{DotupError, Result};
use regex::Regex;
use std::fmt;

/// An installed node runtime as nvm names it (`v20.11.1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeVersion(semver::Version);

impl NodeVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        semver::Version::parse(bare).ok().map(NodeVersion)
    }
}

impl fmt::Display for NodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Extract installed versions from `nvm ls` output.
///
/// Only lines that start with a version (optionally behind the `->` marker
/// for the active one) count; alias lines such as `default -> 20 (-> v20.11.1)`
/// and `system` are ignored. The result is sorted ascending without duplicates.
pub fn parse_nvm_ls(output: &str) -> Result<Vec<NodeVersion>> {
    let ansi = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]")
        .map_err(|e| DotupError::Parse(format!("Regex error: {}", e)))?;
    let installed = Regex::new(r"^\s*(?:->)?\s*(v\d+\.\d+\.\d+)\b")
        .map_err(|e| DotupError::Parse(format!("Regex error: {}", e)))?;

    let mut versions: Vec<NodeVersion> = output
        .lines()
        .map(|line| ansi.replace_all(line, ""))
        .filter_map(|line| {
            installed
                .captures(&line)
                .and_then(|cap| cap.get(1))
                .and_then(|m| NodeVersion::parse(m.as_str()))
        })
        .collect();

    versions.sort();
    versions.dedup();
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v(raw: &str) -> NodeVersion {
        NodeVersion::parse(raw).unwrap()
    }

    #[test]
    fn parses_installed_lines_and_skips_aliases() {
        let output = "\
       v16.20.2
->     v18.19.0 *
       v20.11.1 *
         system
default -> 18 (-> v18.19.0 *)
iojs -> N/A (default)
node -> stable (-> v20.11.1 *) (default)
stable -> 20.11 (-> v20.11.1 *) (default)
lts/* -> lts/iron (-> v20.11.1 *)
lts/hydrogen -> v18.19.0 *
";
        let versions = parse_nvm_ls(output).unwrap();
        assert_eq!(versions, vec![v("v16.20.2"), v("v18.19.0"), v("v20.11.1")]);
    }

    #[test]
    fn strips_colour_codes() {
        let output = "\x1b[0;32m->     v20.11.1 *\x1b[0m\n\x1b[0;34m       v18.19.0 *\x1b[0m\n";
        let versions = parse_nvm_ls(output).unwrap();
        assert_eq!(versions, vec![v("18.19.0"), v("20.11.1")]);
    }

    #[test]
    fn sorts_semantically_and_dedupes() {
        let output = "v9.11.2\nv10.0.0\n->v9.11.2\n";
        let versions = parse_nvm_ls(output).unwrap();
        assert_eq!(versions, vec![v("9.11.2"), v("10.0.0")]);
        assert_eq!(versions[1].to_string(), "v10.0.0");
    }

    #[test]
    fn empty_or_unrelated_output_yields_nothing() {
        assert!(parse_nvm_ls("").unwrap().is_empty());
        assert!(parse_nvm_ls("N/A\n            system\n").unwrap().is_empty());
    }

    #[test]
    fn display_keeps_the_v_prefix() {
        assert_eq!(v("18.19.0").to_string(), "v18.19.0");
        assert_eq!(v("v18.19.0").to_string(), "v18.19.0");
    }
}
