//! GreenGain Roadmap Orchestrator
//!
//! An energy-upgrade advisor core that:
//! - Turns a household survey profile into targeted incentive queries
//! - Routes retrieval between an indexed knowledge base and live web search
//! - Gates context behind a bounded credibility-grading loop
//! - Synthesizes a rebate/tax-credit roadmap under a programmatic
//!   financial policy engine
//! - Finalizes ROI figures with a deterministic calculator
//!
//! PIPELINE:
//! ANALYZE → ROUTE → RETRIEVE (local | hybrid) → GRADE? → GENERATE → DONE

pub mod api;
pub mod error;
pub mod finance;
pub mod gemini;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod retrieval;
pub mod search;
pub mod synthesis;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use pipeline::Pipeline;
