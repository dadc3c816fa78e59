use uuid::Uuid;

use crate::error::AppError;

/// Why a best-effort aggregate has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absent {
    /// The store answered but holds nothing for this scope.
    Missing,
    /// The store call failed; the error was logged.
    Failed,
}

/// Resolve a secondary lookup without failing the surrounding call.
///
/// Errors are logged at warn level. Callers that render the value fall back
/// with `unwrap_or_default()`, so "unavailable" and "zero" look the same to
/// them unless they inspect the `Absent` reason.
pub fn soft_fetch<T>(
    result: Result<Option<T>, AppError>,
    what: &'static str,
    org_id: Option<Uuid>,
) -> Result<T, Absent> {
    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => {
            tracing::debug!(what, org_id = ?org_id, "soft fetch: no data");
            Err(Absent::Missing)
        }
        Err(e) => {
            tracing::warn!(what, org_id = ?org_id, error = %e, "soft fetch failed, defaulting to zero");
            Err(Absent::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_fetch_distinguishes_missing_from_failed() {
        assert_eq!(soft_fetch(Ok(Some(3)), "x", None), Ok(3));
        assert_eq!(soft_fetch::<i32>(Ok(None), "x", None), Err(Absent::Missing));
        assert_eq!(
            soft_fetch::<i32>(Err(AppError::NotFound("x".into())), "x", None),
            Err(Absent::Failed)
        );
    }

    #[test]
    fn test_absent_defaults_to_zero() {
        let v: i64 = soft_fetch(Err(AppError::BadRequest("x".into())), "x", None).unwrap_or_default();
        assert_eq!(v, 0);
    }
}
