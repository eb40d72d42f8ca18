//! Quota and content-rotation services.
//!
//! [`QuotaService`] is the only entry point the adapters use; it gates
//! [`SelectionService`] draws behind the daily quota.

mod quota;
mod selection;

pub use quota::{Draw, DrawOutcome, QuotaError, QuotaService};
pub use selection::SelectionService;
