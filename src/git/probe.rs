//! Git subprocess invocations.
//!
//! All operations run `git` in the workspace directory and fail with
//! [`GitError`] on a non-zero exit or a missing binary. Output-heavy calls
//! (`ls-files` on large repos) are captured in full.

use std::path::Path;
use std::process::Command;

use crate::error::GitError;
use crate::Result;

use super::diff::{parse_name_status, GitDiff};

/// Branch names treated as base branches everywhere.
const BASE_BRANCH_NAMES: &[&str] = &["main", "master", "develop", "development"];

/// Candidates tried when the remote default branch cannot be determined.
const BASE_BRANCH_FALLBACKS: &[&str] = &["main", "develop", "master"];

/// Run a git command in `ws` and return trimmed stdout.
fn run_git(ws: &Path, args: &[&str]) -> Result<String> {
    let command = format!("git {}", args.join(" "));

    let output = Command::new("git")
        .args(args)
        .current_dir(ws)
        .output()
        .map_err(|source| GitError::Launch {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(GitError::CommandFailed { command, stderr }.into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether `ws` is inside a git work tree.
#[must_use]
pub fn is_repo(ws: &Path) -> bool {
    run_git(ws, &["rev-parse", "--is-inside-work-tree"])
        .map(|out| out == "true")
        .unwrap_or(false)
}

/// Current branch name (`HEAD` when detached).
///
/// # Errors
///
/// Returns an error if git fails.
pub fn current_branch(ws: &Path) -> Result<String> {
    run_git(ws, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Current commit SHA.
///
/// # Errors
///
/// Returns an error if git fails.
pub fn current_commit(ws: &Path) -> Result<String> {
    run_git(ws, &["rev-parse", "HEAD"])
}

/// URL of the `origin` remote.
///
/// # Errors
///
/// Returns an error if git fails or no `origin` remote exists.
pub fn remote_url(ws: &Path) -> Result<String> {
    run_git(ws, &["remote", "get-url", "origin"])
}

/// Whether the work tree has uncommitted changes.
///
/// # Errors
///
/// Returns an error if git fails.
pub fn has_uncommitted(ws: &Path) -> Result<bool> {
    let status = run_git(ws, &["status", "--porcelain"])?;
    Ok(!status.is_empty())
}

/// All tracked files, in the deterministic order git reports them.
///
/// # Errors
///
/// Returns an error if git fails.
pub fn tracked_files(ws: &Path) -> Result<Vec<String>> {
    let out = run_git(ws, &["ls-files"])?;

    Ok(out
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}

/// Default branch as advertised by `origin/HEAD`, if known.
///
/// When the symbolic ref is missing, one `git remote set-head origin --auto`
/// repair attempt is made before giving up.
#[must_use]
pub fn default_branch_from_remote(ws: &Path) -> Option<String> {
    if let Some(name) = read_origin_head(ws) {
        return Some(name);
    }

    if run_git(ws, &["remote", "set-head", "origin", "--auto"]).is_err() {
        return None;
    }

    read_origin_head(ws)
}

fn read_origin_head(ws: &Path) -> Option<String> {
    let full = run_git(ws, &["symbolic-ref", "refs/remotes/origin/HEAD"]).ok()?;
    let name = full.strip_prefix("refs/remotes/origin/")?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Whether `name` refers locally to a commit.
fn verifies(ws: &Path, name: &str) -> bool {
    run_git(ws, &["rev-parse", "--verify", name]).is_ok()
}

/// Resolve the base branch for this workspace.
///
/// Prefers the remote's default branch when it also verifies locally; falls
/// back through well-known names, ultimately `"main"`.
#[must_use]
pub fn base_branch(ws: &Path) -> String {
    if let Some(name) = default_branch_from_remote(ws) {
        if verifies(ws, &name) {
            return name;
        }
    }

    for candidate in BASE_BRANCH_FALLBACKS {
        if verifies(ws, candidate) {
            return (*candidate).to_string();
        }
    }

    "main".to_string()
}

/// Whether `name` is considered a base branch.
///
/// Matches the well-known base names case-insensitively, plus the remote's
/// default branch when a workspace is supplied.
#[must_use]
pub fn is_base_branch(name: &str, ws: Option<&Path>) -> bool {
    if BASE_BRANCH_NAMES
        .iter()
        .any(|base| base.eq_ignore_ascii_case(name))
    {
        return true;
    }

    if let Some(ws) = ws {
        if let Some(default) = default_branch_from_remote(ws) {
            return default.eq_ignore_ascii_case(name);
        }
    }

    false
}

/// Name-status diff of `feature` against its merge base with `base`.
///
/// # Errors
///
/// Returns an error if git fails (unknown branch, missing merge base).
pub fn diff(feature: &str, base: &str, ws: &Path) -> Result<GitDiff> {
    let merge_base = run_git(ws, &["merge-base", base, feature])?;
    if merge_base.is_empty() {
        return Err(crate::error::GitError::UnexpectedOutput {
            command: format!("git merge-base {base} {feature}"),
            reason: "empty merge base".to_string(),
        }
        .into());
    }

    let range = format!("{merge_base}..{feature}");
    let out = run_git(ws, &["diff", "--name-status", &range])?;
    Ok(parse_name_status(&out))
}
