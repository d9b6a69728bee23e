/// Prefix checked before the bare variable name.
pub const ENV_PREFIX: &str = "BILLDESK_";

/// Get environment variable with BILLDESK_ prefix, falling back to unprefixed version
///
/// Checks `BILLDESK_{key}` first, then `{key}`, so deployments can either
/// namespace their variables or reuse conventional names like `STRIPE_API_KEY`.
///
/// # Examples
///
/// ```rust
/// use billdesk::utils::get_env_with_prefix;
///
/// // Checks BILLDESK_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}
