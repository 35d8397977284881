pub mod details;
pub mod reviews;
pub mod subjects;
pub mod sync;
pub mod user;

use crate::error::{ApiError, Result};

/// Parse a comma-separated integer list. Entries that are not integers are
/// skipped; an absent or entirely unusable list is a validation error.
pub(crate) fn parse_id_list(raw: Option<&str>, name: &str) -> Result<Vec<i64>> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{name} query parameter required")))?;

    let values: Vec<i64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();

    if values.is_empty() {
        return Err(ApiError::Validation(format!("Invalid {name} parameter")));
    }
    Ok(values)
}
