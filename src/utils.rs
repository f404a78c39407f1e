//! Small shared helpers

use std::env::var;

/// Get the value of an ENV var, or compute a default
///
/// Empty values count as unset; an empty `PORT=` line in a `.env` file
/// should not override anything.
pub fn env_var_or_else(var_name: &str, or_else: impl FnOnce() -> String) -> String {
    match var(var_name) {
        Ok(value) if !value.is_empty() => value,
        _ => or_else(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_else_falls_back() {
        assert_eq!(
            env_var_or_else("GOLINKS_TEST_UNSET_VAR", || "fallback".to_string()),
            "fallback"
        );
    }
}
