//! Listing and detail read models.

use crate::aggregate::{AccessRequest, RequestSummary};
use crate::audit::{ApprovalRecord, HistoryEntry};
use crate::authorization::DataScope;
use crate::types::{Priority, RequestStatus};
use serde::{Deserialize, Serialize};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Caller-supplied list filters. Every present filter must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilters {
    /// Exact status
    pub status: Option<RequestStatus>,
    /// Exact department
    pub department: Option<String>,
    /// Exact priority
    pub priority: Option<Priority>,
    /// Case-insensitive substring over names, request number and employee id
    pub search: Option<String>,
}

impl ListFilters {
    /// The search term, trimmed and lowercased, if any.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `summary` passes every filter.
    #[must_use]
    pub fn matches(&self, summary: &RequestSummary) -> bool {
        if self.status.is_some_and(|s| s != summary.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != summary.priority) {
            return false;
        }
        if self
            .department
            .as_deref()
            .is_some_and(|d| d != summary.department)
        {
            return false;
        }
        match self.search_term() {
            None => true,
            Some(term) => [
                Some(summary.employee_first_name.as_str()),
                Some(summary.employee_last_name.as_str()),
                Some(summary.request_number.as_str()),
                summary.employee_id.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&term)),
        }
    }
}

/// 1-based page selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build from optional caller input, clamping into `1..=max_page_size`.
    #[must_use]
    pub fn clamped(
        page: Option<u32>,
        page_size: Option<u32>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Self {
        let max = max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(default_page_size).clamp(1, max),
        }
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

/// A fully resolved listing query: visibility scope ANDed with filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    /// Derived from the caller, never from input
    pub scope: DataScope,
    /// Caller filters
    pub filters: ListFilters,
    /// Page
    pub page: PageRequest,
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Matching items across all pages
    pub total: u64,
    /// Page number
    pub page: u32,
    /// Page size
    pub page_size: u32,
    /// Number of pages
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page, deriving `total_pages`.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let size = u64::from(request.page_size.max(1));
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total.div_ceil(size),
        }
    }
}

/// Single-request view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    /// The request with its grants and handover items
    #[serde(flatten)]
    pub request: AccessRequest,
    /// Decisions, oldest first
    pub approvals: Vec<ApprovalRecord>,
    /// Ledger, oldest first; `None` when the caller may not view history
    pub history: Option<Vec<HistoryEntry>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::numbering::RequestNumber;
    use crate::types::{PrincipalId, RequestId, RequestType};
    use chrono::Utc;

    fn summary() -> RequestSummary {
        RequestSummary {
            id: RequestId::new(),
            request_number: RequestNumber::format(2025, 14),
            employee_first_name: "Maria".into(),
            employee_last_name: "Okafor".into(),
            employee_id: Some("EMP-0042".into()),
            department: "Finance".into(),
            email: "maria@x.com".into(),
            status: RequestStatus::Pending,
            priority: Priority::High,
            request_type: RequestType::Software,
            requested_by: PrincipalId::new(),
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(ListFilters::default().matches(&summary()));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let s = summary();
        for term in ["maria", "OKAF", "sar-2025-014", "emp-0042"] {
            let filters = ListFilters {
                search: Some(term.into()),
                ..ListFilters::default()
            };
            assert!(filters.matches(&s), "{term} should match");
        }
        let miss = ListFilters {
            search: Some("finance".into()),
            ..ListFilters::default()
        };
        assert!(!miss.matches(&s));
    }

    #[test]
    fn filters_are_conjunctive() {
        let filters = ListFilters {
            status: Some(RequestStatus::Pending),
            priority: Some(Priority::Low),
            ..ListFilters::default()
        };
        assert!(!filters.matches(&summary()));
    }

    #[test]
    fn page_request_is_clamped() {
        let page = PageRequest::clamped(Some(0), Some(500), 20, 100);
        assert_eq!(page, PageRequest { page: 1, page_size: 100 });
        assert_eq!(PageRequest::clamped(None, None, 20, 100).page_size, 20);
        assert_eq!(PageRequest::clamped(Some(3), Some(10), 20, 100).offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(vec![1, 2], 41, PageRequest { page: 1, page_size: 20 });
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }
}
