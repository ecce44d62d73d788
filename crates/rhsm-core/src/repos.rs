//! Parsing of `yum repoinfo` output
//!
//! Standard output is a sequence of blocks, each starting at a `Repo-id`
//! line and ending with a `Repo-filename` line. Every block must yield both
//! fields; a block that does not is a parse failure, never a silent skip.
//! Standard error is scanned separately for duplicate repository warnings.

use crate::error::{FailureKind, TerminalError};
use crate::report::{Flag, Report, ReportSink, Severity, Tag};
use crate::Result;
use regex::{Matches, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Repo file that subscription-manager generates
pub const DEFAULT_RHSM_REPOFILE: &str = "/etc/yum.repos.d/redhat.repo";

const REPO_ID_MARKER: &str = "Repo-id";
const REPO_FILE_MARKER: &str = "Repo-filename";
const LIST_SEPARATOR: &str = "\n    - ";

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Repo-id.*?Repo-filename[^\n]*(?:\n|\z)").expect("valid block regex")
});

static REPO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Repo-id[ \t]*:[ \t]*([^/\s]+)(?:/\S*)?[ \t\r]*$").expect("valid repo-id regex")
});

static REPO_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Repo-filename[ \t]*:[ \t]*(\S[^\r\n]*?)[ \t\r]*$")
        .expect("valid repo-filename regex")
});

static DUPLICATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Repository ['"`]?([^\s'"`]+)['"`]? is listed more than once"#)
        .expect("valid duplicate regex")
});

/// A repository as reported by `yum repoinfo`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    /// Repository id without the `/<releasever>/<arch>` suffix
    pub repo_id: String,
    /// Repo file the repository is defined in, verbatim
    pub source_file: String,
}

/// Lazy iterator over the repositories in a `yum repoinfo` listing.
///
/// Yields blocks in document order. After the first error it is exhausted.
#[derive(Debug)]
pub struct RepoIter<'a> {
    text: &'a str,
    blocks: Matches<'static, 'a>,
    tail_from: usize,
    done: bool,
}

impl Iterator for RepoIter<'_> {
    type Item = Result<Repository>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.blocks.next() {
            Some(block) => {
                let gap = &self.text[self.tail_from..block.start()];
                self.tail_from = block.end();
                if let Some(err) = orphan_filename(gap) {
                    self.done = true;
                    return Some(Err(err));
                }
                let parsed = parse_repo_block(block.as_str());
                self.done = parsed.is_err();
                Some(parsed)
            }
            None => {
                self.done = true;
                // a Repo-id that never reaches a Repo-filename
                let tail = &self.text[self.tail_from..];
                match tail.find(REPO_ID_MARKER) {
                    Some(start) => Some(Err(parse_error(REPO_FILE_MARKER, &tail[start..]))),
                    None => orphan_filename(tail).map(Err),
                }
            }
        }
    }
}

/// A `Repo-filename` outside any block belongs to a repository without a `Repo-id`.
fn orphan_filename(gap: &str) -> Option<TerminalError> {
    gap.contains(REPO_FILE_MARKER)
        .then(|| parse_error(REPO_ID_MARKER, gap.trim()))
}

/// Split `yum repoinfo` standard output into repositories.
///
/// Parsing the same text again yields the same sequence.
pub fn parse_repos(stdout: &str) -> RepoIter<'_> {
    RepoIter {
        text: stdout,
        blocks: BLOCK_RE.find_iter(stdout),
        tail_from: 0,
        done: false,
    }
}

fn parse_repo_block(block: &str) -> Result<Repository> {
    // a second Repo-id before the Repo-filename would pair the wrong fields
    if block[REPO_ID_MARKER.len()..].contains(REPO_ID_MARKER) {
        return Err(parse_error(REPO_FILE_MARKER, block));
    }

    let repo_id = capture(&REPO_ID_RE, block).ok_or_else(|| parse_error(REPO_ID_MARKER, block))?;
    let source_file =
        capture(&REPO_FILE_RE, block).ok_or_else(|| parse_error(REPO_FILE_MARKER, block))?;

    Ok(Repository {
        repo_id,
        source_file,
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_error(field: &str, block: &str) -> TerminalError {
    TerminalError::new(FailureKind::Parse, "Failed to parse the `yum repoinfo` output")
        .with_detail(
            TerminalError::DETAILS,
            format!(
                "Failed to parse the '{}' repo parameter within the following part of the `yum repoinfo` output:\n{}",
                field, block
            ),
        )
        .with_detail("field", field)
        .with_hint("Please check the yum repository configuration and the yum/dnf installation.")
}

/// Repository ids that `yum` reported as defined more than once.
///
/// Distinct ids, in order of first occurrence.
pub fn find_duplicate_repos(stderr: &str) -> Vec<String> {
    let mut duplicates: Vec<String> = Vec::new();
    for caps in DUPLICATE_RE.captures_iter(stderr) {
        let repo_id = &caps[1];
        if !duplicates.iter().any(|d| d == repo_id) {
            duplicates.push(repo_id.to_string());
        }
    }
    duplicates
}

/// Inhibit the upgrade when any repository id is defined multiple times.
///
/// Creates at most one report listing every duplicate; never fails.
/// Returns the duplicates found.
pub fn inhibit_on_duplicate_repos(stderr: &str, reports: &dyn ReportSink) -> Vec<String> {
    let duplicates = find_duplicate_repos(stderr);
    if duplicates.is_empty() {
        return duplicates;
    }

    let listing = format!("{}{}", LIST_SEPARATOR, duplicates.join(LIST_SEPARATOR));
    warn!(repo_ids = ?duplicates, "The following repoids are defined multiple times:{}", listing);

    reports.create_report(Report {
        title: "A YUM/DNF repository defined multiple times".to_string(),
        summary: format!(
            "The `yum repoinfo` command reports that the following repositories are defined multiple times:{}",
            listing
        ),
        severity: Severity::Medium,
        tags: vec![Tag::Repository],
        flags: vec![Flag::Inhibitor],
        remediation_hint: Some("Remove the duplicate repository definitions.".to_string()),
    });

    duplicates
}

/// Ids of the repositories defined in `repo_file`, in listing order.
pub fn rhsm_repo_ids<'r>(
    repos: impl IntoIterator<Item = &'r Repository>,
    repo_file: &str,
) -> Vec<String> {
    let ids: Vec<String> = repos
        .into_iter()
        .filter(|repo| repo.source_file == repo_file)
        .map(|repo| repo.repo_id.clone())
        .collect();

    if ids.is_empty() {
        info!("There are no repos available through RHSM.");
    } else {
        info!(
            "The following repoids are available through RHSM:{}{}",
            LIST_SEPARATOR,
            ids.join(LIST_SEPARATOR)
        );
    }
    ids
}
