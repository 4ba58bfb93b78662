//! Locate the file to install inside an unpacked asset.
//!
//! Upstream archives are not laid out consistently. The wanted file may sit
//! at the archive root, under a single version-named wrapper folder, inside
//! `lib/` or `bin/`, or somewhere nobody anticipated. [`locate`] tries a
//! fixed sequence of strategies, from the most specific to the most
//! permissive, and stops at the first hit:
//!
//! 1. configured candidate paths, matched against archive members in the
//!    order the archive lists them;
//! 2. the same candidates relative to a lone top-level directory;
//! 3. the conventional `lib/` and `bin/` folders under the effective root;
//! 4. a recursive scan of the whole tree, sorted by file name.
//!
//! Candidate paths are `/`-separated. A `*` segment matches any single
//! segment, and a leading `**` segment drops the anchor at the root so the
//! remaining segments only need to match the end of a member path. Without
//! it a candidate is anchored at the root: `x86/SDL3.dll` does not match
//! `a/x86/SDL3.dll`, so write `**/x86/SDL3.dll` to match by suffix. A bare
//! file name is likewise only a root-level match; deeper copies are left to
//! the later strategies.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use walkdir::WalkDir;

/// Folders checked by the conventional-directory strategy, in order.
const CONVENTIONAL_DIRS: [&str; 2] = ["lib", "bin"];

/// The strategy that found a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// A configured candidate path matched an archive member.
    Candidate,
    /// A candidate matched relative to the lone top-level directory.
    UnwrappedCandidate,
    /// The file sat in a conventional `lib/` or `bin/` folder.
    ConventionalDir,
    /// The file was found by scanning the whole tree.
    RecursiveScan,
}

impl fmt::Display for LocateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Candidate => "candidate path",
            Self::UnwrappedCandidate => "candidate path under wrapper directory",
            Self::ConventionalDir => "conventional directory",
            Self::RecursiveScan => "recursive scan",
        })
    }
}

/// A located file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Absolute path of the file inside the scratch directory.
    pub path: Utf8PathBuf,
    /// How it was found.
    pub strategy: LocateStrategy,
}

/// Find `file_name` under `root`.
///
/// `members` lists the unpacked files relative to `root` in archive order;
/// `candidates` lists the configured candidate paths in priority order.
/// Returns `None` when every strategy comes up empty.
///
/// The result depends only on the directory contents and the arguments, so
/// repeated calls return the same path.
#[must_use]
pub fn locate(
    root: &Utf8Path,
    members: &[Utf8PathBuf],
    file_name: &str,
    candidates: &[String],
) -> Option<Located> {
    let found = find_candidate(root, members, candidates, LocateStrategy::Candidate)
        .or_else(|| {
            let wrapper = single_wrapper_dir(root)?;
            let inner: Vec<Utf8PathBuf> = members
                .iter()
                .filter_map(|member| member.strip_prefix(&wrapper).ok())
                .map(Utf8Path::to_path_buf)
                .collect();
            find_candidate(
                &root.join(&wrapper),
                &inner,
                candidates,
                LocateStrategy::UnwrappedCandidate,
            )
        })
        .or_else(|| {
            let effective_root = match single_wrapper_dir(root) {
                Some(wrapper) => root.join(wrapper),
                None => root.to_path_buf(),
            };
            find_conventional(&effective_root, file_name)
        })
        .or_else(|| scan_tree(root, file_name));

    match &found {
        Some(located) => log::debug!("located {} via {}", located.path, located.strategy),
        None => log::debug!("{file_name} not found under {root}"),
    }
    found
}

fn find_candidate(
    root: &Utf8Path,
    members: &[Utf8PathBuf],
    candidates: &[String],
    strategy: LocateStrategy,
) -> Option<Located> {
    candidates.iter().find_map(|candidate| {
        members
            .iter()
            .find(|member| candidate_matches(candidate, member))
            .map(|member| Located {
                path: root.join(member),
                strategy,
            })
    })
}

/// Return true when `member` matches the candidate path syntax.
fn candidate_matches(candidate: &str, member: &Utf8Path) -> bool {
    let pattern: Vec<&str> = candidate
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    let path: Vec<&str> = member
        .components()
        .filter(|component| !matches!(component, Utf8Component::CurDir))
        .map(|component| component.as_str())
        .collect();

    match pattern.split_first() {
        Some((&"**", rest)) => {
            !rest.is_empty()
                && path.len() >= rest.len()
                && segments_match(rest, &path[path.len() - rest.len()..])
        }
        Some(_) => segments_match(&pattern, &path),
        None => false,
    }
}

fn segments_match(pattern: &[&str], path: &[&str]) -> bool {
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(path)
            .all(|(expected, actual)| *expected == "*" || expected == actual)
}

/// Return the name of the lone top-level entry when it is a directory.
fn single_wrapper_dir(root: &Utf8Path) -> Option<String> {
    let mut entries = root.read_dir_utf8().ok()?.filter_map(Result::ok);
    let only = entries.next()?;
    if entries.next().is_some() {
        return None;
    }
    let is_dir = fs::symlink_metadata(only.path()).ok()?.is_dir();
    is_dir.then(|| only.file_name().to_owned())
}

fn find_conventional(effective_root: &Utf8Path, file_name: &str) -> Option<Located> {
    CONVENTIONAL_DIRS
        .iter()
        .map(|dir| effective_root.join(dir).join(file_name))
        .find(|path| path.is_file())
        .map(|path| Located {
            path,
            strategy: LocateStrategy::ConventionalDir,
        })
}

fn scan_tree(root: &Utf8Path, file_name: &str) -> Option<Located> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name() == file_name && entry.path().is_file())
        .find_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .map(|path| Located {
            path,
            strategy: LocateStrategy::RecursiveScan,
        })
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
