use crate::config::validate_username;
use crate::error::Result;
use crate::storage::LocalState;
use colored::Colorize;

/// Validate and store the username used for every later request
pub fn run_login(local: &LocalState, username: &str) -> Result<String> {
    let username = validate_username(username)?;
    local.set_username(&username);
    tracing::info!(username = %username, "Stored username");
    println!("{}", format!("Signed in as {}", username).green());
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_stores_trimmed_username() {
        let local = LocalState::in_memory();
        assert_eq!(run_login(&local, "  ada ").unwrap(), "ada");
        assert_eq!(local.username().as_deref(), Some("ada"));
    }

    #[test]
    fn test_login_rejects_long_username() {
        let local = LocalState::in_memory();
        assert!(run_login(&local, &"x".repeat(40)).is_err());
        assert!(local.username().is_none());
    }
}
