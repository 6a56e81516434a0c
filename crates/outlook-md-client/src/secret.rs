//! Secret reference resolver.
//!
//! `[auth]` values in `config.toml` may point at a secret instead of holding
//! it:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and uses the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as written

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else {
        Ok(value.to_string())
    }
}

/// Resolves an optional setting, treating blank results as unset.
pub fn resolve_optional(value: Option<&str>) -> Result<Option<String>, String> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let resolved = resolve(raw.trim())?;
            let resolved = resolved.trim();
            Ok((!resolved.is_empty()).then(|| resolved.to_string()))
        }
    }
}

fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("contoso.onmicrosoft.com").unwrap(), "contoso.onmicrosoft.com");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_OUTLOOK_MD_SECRET_TEST_TENANT", "tenant-from-env");
        }
        assert_eq!(
            resolve("env::_OUTLOOK_MD_SECRET_TEST_TENANT").unwrap(),
            "tenant-from-env"
        );
        unsafe {
            std::env::remove_var("_OUTLOOK_MD_SECRET_TEST_TENANT");
        }
    }

    #[test]
    fn missing_env_reference_errors() {
        let err = resolve("env::_OUTLOOK_MD_SECRET_TEST_UNSET_98765").unwrap_err();
        assert!(err.contains("not set"));
    }

    #[test]
    fn pass_reference_to_missing_entry_errors() {
        assert!(resolve("pass::outlook-md/does/not/exist/98765").is_err());
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(resolve_optional(None).unwrap(), None);
        assert_eq!(resolve_optional(Some("   ")).unwrap(), None);
        assert_eq!(
            resolve_optional(Some(" app-id ")).unwrap(),
            Some("app-id".to_string())
        );
    }
}
