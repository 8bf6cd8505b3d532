//! Cache Key Builders
//!
//! Keys follow the `{domain}:{userCode}:{...}` layout so per-user data can be
//! invalidated with a single prefix pattern (e.g. `bonuses:E001:`).

/// Key domains scoped per user, cleared together by user invalidation
pub const USER_KEY_DOMAINS: [&str; 5] = ["user", "bonuses", "kilometers", "stats", "faults"];

/// Key for one cached bonus window: `bonuses:{user}:{year|current}:{month|all}`
pub fn bonus_window(user_code: &str, year: Option<i32>, month: Option<u32>) -> String {
    let year = year.map_or_else(|| "current".to_string(), |y| y.to_string());
    let month = month.map_or_else(|| "all".to_string(), |m| m.to_string());
    format!("bonuses:{user_code}:{year}:{month}")
}

/// Key for arbitrary per-user data: `user:{code}:{dataType}` plus sorted
/// `key:value` params joined with `|`
pub fn user_data(user_code: &str, data_type: &str, params: &[(&str, String)]) -> String {
    let base = format!("user:{user_code}:{data_type}");
    if params.is_empty() {
        return base;
    }

    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);

    let suffix = sorted
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("|");

    format!("{base}:{suffix}")
}

/// All invalidation patterns for one user, one glob per key domain
pub fn user_patterns(user_code: &str) -> Vec<String> {
    USER_KEY_DOMAINS
        .iter()
        .map(|domain| format!("{domain}:{user_code}:*"))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonus_window_key() {
        assert_eq!(
            bonus_window("E001", Some(2025), Some(6)),
            "bonuses:E001:2025:6"
        );
        assert_eq!(bonus_window("E001", Some(2025), None), "bonuses:E001:2025:all");
        assert_eq!(bonus_window("E001", None, None), "bonuses:E001:current:all");
    }

    #[test]
    fn test_user_data_key_without_params() {
        assert_eq!(user_data("E001", "profile", &[]), "user:E001:profile");
    }

    #[test]
    fn test_user_data_key_sorts_params() {
        let key = user_data(
            "E001",
            "bonus-quick-stats",
            &[("year", "2025".to_string()), ("month", "6".to_string())],
        );
        assert_eq!(key, "user:E001:bonus-quick-stats:month:6|year:2025");
    }

    #[test]
    fn test_user_patterns_cover_all_domains() {
        let patterns = user_patterns("E001");
        assert_eq!(patterns.len(), USER_KEY_DOMAINS.len());
        assert!(patterns.contains(&"bonuses:E001:*".to_string()));
        assert!(patterns.contains(&"faults:E001:*".to_string()));
    }
}
