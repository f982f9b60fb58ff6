//! Workflow configuration

use serde::{Deserialize, Serialize};

use quorate_common::{QuorateError, Result, DEFAULT_PAGE_SIZE, DEFAULT_QUORUM_NUMBER};

/// Largest page a caller may request unless configured otherwise
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// How an approval submission expresses its vote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Approver states approve or reject; approvals are `Approved`/`Rejected`
    #[default]
    Explicit,
    /// Creating the approval is the vote; approvals are `Verified` and count
    /// toward quorum
    Legacy,
}

impl ApprovalMode {
    /// Whether `Verified` approvals count as approving votes
    pub fn verified_counts(&self) -> bool {
        matches!(self, ApprovalMode::Legacy)
    }
}

impl std::str::FromStr for ApprovalMode {
    type Err = QuorateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "explicit" => Ok(ApprovalMode::Explicit),
            "legacy" => Ok(ApprovalMode::Legacy),
            other => Err(QuorateError::invalid(format!("unknown approval mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Quorum used when a proposal is submitted without one
    pub default_quorum: u32,
    pub approval_mode: ApprovalMode,
    /// Page size for bulk listings
    pub page_size: usize,
    /// Upper bound on a caller-requested page size
    pub max_page_size: usize,
    /// Permit administrative status overrides on proposals and approvals
    pub allow_status_override: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_quorum: DEFAULT_QUORUM_NUMBER,
            approval_mode: ApprovalMode::Explicit,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            allow_status_override: false,
        }
    }
}

impl WorkflowConfig {
    pub fn with_default_quorum(mut self, quorum: u32) -> Self {
        self.default_quorum = quorum;
        self
    }

    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_status_override(mut self, allow: bool) -> Self {
        self.allow_status_override = allow;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_quorum == 0 {
            return Err(QuorateError::invalid("default_quorum must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(QuorateError::invalid("page_size must be at least 1"));
        }
        if self.max_page_size < self.page_size {
            return Err(QuorateError::invalid(format!(
                "max_page_size ({}) is below page_size ({})",
                self.max_page_size, self.page_size
            )));
        }
        Ok(())
    }

    /// Resolve a caller-requested page size against the configured bounds
    pub fn resolve_page_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.page_size),
            Some(0) => Err(QuorateError::invalid("page size must be at least 1")),
            Some(n) if n > self.max_page_size => Err(QuorateError::invalid(format!(
                "page size {n} exceeds the maximum of {}",
                self.max_page_size
            ))),
            Some(n) => Ok(n),
        }
    }
}
