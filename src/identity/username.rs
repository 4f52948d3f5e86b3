//! Collision-free username allocation

use std::future::Future;

use crate::error::AppError;

/// Base used when nothing usable survives sanitizing
pub const USERNAME_FALLBACK: &str = "user";
/// Longest base kept from the preferred name
pub const MAX_BASE_LENGTH: usize = 20;
/// Hard limit for any candidate, suffix included
pub const MAX_USERNAME_LENGTH: usize = 30;
/// Highest numeric suffix probed before giving up
pub const MAX_SUFFIX: u32 = 999;

/// Derives a unique username from a preferred string.
///
/// The preferred string is reduced to `[A-Za-z0-9_-]`, falls back to
/// `"user"` when empty and is cut to 20 characters. If that base is taken,
/// numeric suffixes `1..=999` are tried in order. The allocator only reads;
/// a concurrent writer can still claim the returned name, which the store's
/// unique constraint catches.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameAllocator;

impl UsernameAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Sanitized base for `preferred`
    pub fn sanitize(preferred: &str) -> String {
        let cleaned: String = preferred
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(MAX_BASE_LENGTH)
            .collect();

        if cleaned.is_empty() {
            USERNAME_FALLBACK.to_string()
        } else {
            cleaned
        }
    }

    /// Whether `username` is already in canonical form
    pub fn is_valid(username: &str) -> bool {
        !username.is_empty()
            && username.len() <= MAX_USERNAME_LENGTH
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// First free candidate for `preferred`; `exists` reports whether a name is taken
    pub async fn allocate<F, Fut>(&self, preferred: &str, mut exists: F) -> Result<String, AppError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, AppError>>,
    {
        let base = Self::sanitize(preferred);
        if !exists(base.clone()).await? {
            return Ok(base);
        }

        for suffix in 1..=MAX_SUFFIX {
            let name = candidate(&base, suffix);
            if !exists(name.clone()).await? {
                return Ok(name);
            }
        }

        tracing::warn!(base = %base, "Username suffixes exhausted");
        Err(AppError::AllocationExhausted(base))
    }
}

/// `base` followed by `suffix`, trimming the base so the digits always fit
fn candidate(base: &str, suffix: u32) -> String {
    let digits = suffix.to_string();
    let keep = MAX_USERNAME_LENGTH.saturating_sub(digits.len());
    let base: String = base.chars().take(keep).collect();
    format!("{base}{digits}")
}
