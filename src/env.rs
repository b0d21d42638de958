//! Environment lookups: `${VAR}` interpolation in harness files and boolean
//! switches.

use thiserror::Error;

/// Switch preserving failed scenarios' workspaces on disk.
pub const KEEP_FAILED_ENV: &str = "WELLBEHAVED_KEEP_FAILED_WORKSPACES";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
    #[error("unclosed variable reference: ${{{0}")]
    Unclosed(String),
    #[error("environment variable '{0}' is not set")]
    Unset(String),
}

/// Interpolates `${VAR}` references from the process environment.
///
/// ```
/// // SAFETY: doctest runs single-threaded.
/// unsafe { std::env::set_var("WELLBEHAVED_DOC_VAR", "gradle") };
/// assert_eq!(
///     wellbehaved::env::interpolate_env("${WELLBEHAVED_DOC_VAR}w").unwrap(),
///     "gradlew"
/// );
/// ```
pub fn interpolate_env(s: &str) -> Result<String, InterpolationError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => name.push(c),
                    None => return Err(InterpolationError::Unclosed(name)),
                }
            }
            let value = std::env::var(&name).map_err(|_| InterpolationError::Unset(name))?;
            result.push_str(&value);
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

/// Parses a boolean switch value. Unrecognized values yield `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Reads a boolean switch from the process environment.
pub fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().as_deref().and_then(parse_flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_process_environment() {
        // SAFETY: only this test touches WELLBEHAVED_ENV_TEST_VAR.
        unsafe {
            std::env::set_var("WELLBEHAVED_ENV_TEST_VAR", "hello");
        }
        assert_eq!(interpolate_env("${WELLBEHAVED_ENV_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            interpolate_env("prefix_${WELLBEHAVED_ENV_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        assert_eq!(interpolate_env("no vars here").unwrap(), "no vars here");
        assert_eq!(interpolate_env("$HOME stays").unwrap(), "$HOME stays");
    }

    #[test]
    fn missing_variable_is_named() {
        assert_eq!(
            interpolate_env("${WELLBEHAVED_NONEXISTENT_12345}"),
            Err(InterpolationError::Unset("WELLBEHAVED_NONEXISTENT_12345".to_string()))
        );
    }

    #[test]
    fn unclosed_reference_is_rejected() {
        assert!(matches!(
            interpolate_env("${UNCLOSED"),
            Err(InterpolationError::Unclosed(_))
        ));
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
