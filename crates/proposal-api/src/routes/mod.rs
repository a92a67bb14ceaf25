//! # API Route Modules
//!
//! | Prefix | Module |
//! |---|---|
//! | `/v1/documents/*` | [`documents`] |
//! | `/v1/integrity/*` | [`integrity`] |

pub mod documents;
pub mod integrity;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Pagination parameters for list endpoints.
#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    /// Number of items to skip (default: 0).
    pub offset: Option<usize>,
}

impl PaginationParams {
    const DEFAULT_LIMIT: usize = 100;
    const MAX_LIMIT: usize = 1000;

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// Render a unit enum through its serde name (`"SCREAMING_SNAKE"` etc).
pub(crate) fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proposal_state::{FindingKind, IntegrityVerdict};

    #[test]
    fn pagination_defaults_and_caps() {
        let p = PaginationParams::default();
        assert_eq!(p.effective_limit(), 100);
        assert_eq!(p.effective_offset(), 0);

        let p = PaginationParams {
            limit: Some(50_000),
            offset: Some(7),
        };
        assert_eq!(p.effective_limit(), 1000);
        assert_eq!(p.effective_offset(), 7);
    }

    #[test]
    fn wire_names_follow_serde() {
        assert_eq!(wire_name(&IntegrityVerdict::Mismatch), "MISMATCH");
        assert_eq!(
            wire_name(&FindingKind::MissingAuditRecord),
            "MISSING_AUDIT_RECORD"
        );
    }
}
