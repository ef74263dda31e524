//! The demo build's "always have something to show" policy.
//!
//! Backend results that fail, or succeed with nothing usable, are
//! swapped for a locally built value. Both the prediction refresh and
//! the login soft-fallback go through [`with_fallback`].

use std::fmt::Display;

use tracing::warn;

/// Which side of the policy produced a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// The primary result was usable.
    Primary(T),
    /// The primary result was replaced.
    Fallback {
        /// Locally built substitute.
        value: T,
        /// Why the primary result was rejected.
        reason: String,
    },
}

impl<T> Resolved<T> {
    /// Whether the substitute was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolved::Fallback { .. })
    }

    /// Borrow the resolved value.
    pub fn value(&self) -> &T {
        match self {
            Resolved::Primary(value) | Resolved::Fallback { value, .. } => value,
        }
    }

    /// Take the resolved value.
    pub fn into_value(self) -> T {
        match self {
            Resolved::Primary(value) | Resolved::Fallback { value, .. } => value,
        }
    }
}

/// Keep `primary` when it is `Ok` and passes `usable`; otherwise build `fallback`.
pub fn with_fallback<T, E, U, F>(primary: Result<T, E>, usable: U, fallback: F) -> Resolved<T>
where
    E: Display,
    U: FnOnce(&T) -> bool,
    F: FnOnce() -> T,
{
    let reason = match primary {
        Ok(value) if usable(&value) => return Resolved::Primary(value),
        Ok(_) => "empty response".to_string(),
        Err(err) => err.to_string(),
    };
    warn!(%reason, "substituting fallback value");
    Resolved::Fallback {
        value: fallback(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_primary_wins() {
        let resolved = with_fallback(Ok::<_, String>(vec![1, 2]), |v| !v.is_empty(), || vec![9]);
        assert_eq!(resolved, Resolved::Primary(vec![1, 2]));
        assert!(!resolved.is_fallback());
    }

    #[test]
    fn unusable_primary_is_replaced() {
        let resolved = with_fallback(Ok::<Vec<i32>, String>(vec![]), |v| !v.is_empty(), || vec![9]);
        assert_eq!(
            resolved,
            Resolved::Fallback {
                value: vec![9],
                reason: "empty response".to_string()
            }
        );
    }

    #[test]
    fn errors_are_replaced_with_reason() {
        let resolved = with_fallback(Err::<Vec<i32>, _>("offline"), |_| true, || vec![9]);
        assert!(resolved.is_fallback());
        assert_eq!(resolved.value(), &vec![9]);
        match resolved {
            Resolved::Fallback { reason, .. } => assert_eq!(reason, "offline"),
            Resolved::Primary(_) => panic!("expected fallback"),
        }
    }
}
