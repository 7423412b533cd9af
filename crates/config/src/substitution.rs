use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").unwrap();
    let mut result = content.to_string();
    let mut missing_vars = Vec::new();

    for caps in re.captures_iter(content) {
        let var_name = caps.get(1).or(caps.get(2)).unwrap().as_str();
        let placeholder = caps.get(0).unwrap().as_str();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                result = result.replace(placeholder, &value);
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                // Keep the placeholder; the validator reports it later
            }
        }
    }

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").unwrap();
    re.is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_var() {
        env::set_var("SWAPVAULT_TEST_PORT", "9999");
        let result = substitute_env_vars("port: ${SWAPVAULT_TEST_PORT}").unwrap();
        assert_eq!(result, "port: 9999");
    }

    #[test]
    fn test_unset_var_kept_as_placeholder() {
        let content = "host: ${SWAPVAULT_DEFINITELY_UNSET_VAR}";
        let result = substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
        assert!(has_unresolved_env_vars(&result));
    }
}
