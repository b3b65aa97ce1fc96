use std::process::Command;

/// Resolve a GitHub auth token, trying each source in order and returning
/// the first that yields a non-empty string.
///
/// Priority (§4.3):
/// 1. A token already configured (e.g. `github_token` in config).
/// 2. An external credential helper equivalent to `gh auth token`.
/// 3. The `FIREWATCH_GITHUB_TOKEN` environment variable.
pub fn detect_auth(configured_token: Option<&str>) -> Result<String, String> {
    let mut tried = Vec::new();

    if let Some(token) = configured_token {
        if !token.is_empty() {
            return Ok(token.to_owned());
        }
        tried.push("configured token (empty)".to_owned());
    } else {
        tried.push("no configured token".to_owned());
    }

    match token_from_credential_helper() {
        Ok(token) if !token.is_empty() => return Ok(token),
        Ok(_) => tried.push("credential helper returned empty string".to_owned()),
        Err(e) => tried.push(format!("credential helper: {e}")),
    }

    match std::env::var("FIREWATCH_GITHUB_TOKEN") {
        Ok(token) if !token.is_empty() => return Ok(token),
        Ok(_) => tried.push("FIREWATCH_GITHUB_TOKEN is empty".to_owned()),
        Err(_) => tried.push("FIREWATCH_GITHUB_TOKEN not set".to_owned()),
    }

    Err(format!(
        "no GitHub token found. Tried: {}. Set `github_token` in config, run `gh auth login`, \
         or export FIREWATCH_GITHUB_TOKEN.",
        tried.join("; ")
    ))
}

/// Shell out to `gh auth token`, mirroring the teacher's `token_from_gh_cli`.
fn token_from_credential_helper() -> Result<String, String> {
    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .map_err(|e| format!("failed to run `gh auth token`: {e}"))?;

    if !output.status.success() {
        return Err("gh auth token exited with non-zero status".to_owned());
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|e| format!("gh auth token produced non-UTF-8 output: {e}"))?
        .trim()
        .to_owned();

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_token_wins_first() {
        assert_eq!(detect_auth(Some("abc123")).unwrap(), "abc123");
    }

    #[test]
    fn empty_configured_token_falls_through() {
        // With no `gh` CLI available and no env var, this should report a
        // descriptive error rather than silently returning an empty token.
        // SAFETY: test-local env mutation.
        unsafe {
            std::env::remove_var("FIREWATCH_GITHUB_TOKEN");
        }
        let result = detect_auth(Some(""));
        if let Ok(token) = result {
            // `gh` happened to be present in the test environment.
            assert!(!token.is_empty());
        }
    }

    #[test]
    fn env_var_used_when_nothing_else_available() {
        unsafe {
            std::env::set_var("FIREWATCH_GITHUB_TOKEN", "env-token");
        }
        let result = detect_auth(None);
        unsafe {
            std::env::remove_var("FIREWATCH_GITHUB_TOKEN");
        }
        // Only assert the env var path when the credential helper isn't
        // available in this sandbox (gh is not expected to be installed).
        if Command::new("gh").arg("--version").output().is_err() {
            assert_eq!(result.unwrap(), "env-token");
        }
    }
}
