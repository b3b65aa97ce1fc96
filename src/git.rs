//! Detect the `owner/repo` a working directory belongs to, from its git
//! remote. Used both for repo auto-detection and for the project-config
//! walk-up in [`crate::config`].

use std::path::Path;
use std::process::Command;

/// Detect `owner/repo` from the git remote of the directory at `path`.
///
/// Tries the `origin` remote first, falls back to the first listed remote.
/// Parses both SSH (`git@github.com:owner/repo.git`) and HTTPS
/// (`https://github.com/owner/repo.git`) URL formats.
pub fn detect_repo(path: &Path) -> Option<(String, String)> {
    let url = remote_url(path, "origin").or_else(|| {
        let first = first_remote_name(path)?;
        remote_url(path, &first)
    })?;
    parse_remote_url(&url)
}

/// Walk upward from `start` looking for a directory containing `.git`,
/// returning that directory. Used by the config loader's project-config
/// discovery (§4.10).
pub fn find_repo_root(start: &Path) -> Option<std::path::PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// List files changed between `base` and `head` (`git diff --name-only
/// base..head`), run inside `repo_path`. Returns `None` if the repo path,
/// refs, or the `git` binary itself are unavailable — callers treat absence
/// the same way as a missing remote: skip the enrichment, don't fail.
pub fn diff_name_only(repo_path: &Path, base: &str, head: &str) -> Option<Vec<String>> {
    let output = Command::new("git")
        .args(["diff", "--name-only", &format!("{base}..{head}")])
        .current_dir(repo_path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect(),
    )
}

/// Resolve the tip commit SHA of `branch_ref` inside `repo_path`.
pub fn rev_parse(repo_path: &Path, branch_ref: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", branch_ref])
        .current_dir(repo_path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if sha.is_empty() { None } else { Some(sha) }
}

fn remote_url(path: &Path, remote: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", remote])
        .current_dir(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if url.is_empty() { None } else { Some(url) }
}

fn first_remote_name(path: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["remote"])
        .current_dir(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()?
        .trim()
        .to_owned();
    if name.is_empty() { None } else { Some(name) }
}

/// Parse `owner/repo` from an SSH or HTTPS remote URL.
fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let slug = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':')?.1
    } else if url.starts_with("https://") || url.starts_with("http://") {
        let after_scheme = url.split_once("://")?.1;
        after_scheme.split_once('/')?.1
    } else {
        return None;
    };

    let slug = slug.strip_suffix(".git").unwrap_or(slug);
    let (owner, name) = slug.split_once('/')?;
    Some((owner.to_owned(), name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ssh_url() {
        let (owner, name) = parse_remote_url("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn parse_ssh_url_no_git_suffix() {
        let (owner, name) = parse_remote_url("git@github.com:acme/widgets").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn parse_https_url() {
        let (owner, name) = parse_remote_url("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn parse_https_url_no_git_suffix() {
        let (owner, name) = parse_remote_url("https://github.com/acme/widgets").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widgets");
    }

    #[test]
    fn parse_invalid_url() {
        assert!(parse_remote_url("not-a-url").is_none());
    }

    #[test]
    fn detect_repo_returns_none_for_no_remote() {
        let tmp = std::env::temp_dir().join("firewatch-test-no-remote");
        let _ = std::fs::create_dir_all(&tmp);
        let _ = std::process::Command::new("git")
            .args(["init"])
            .current_dir(&tmp)
            .output();
        let result = detect_repo(&tmp);
        assert!(result.is_none());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
