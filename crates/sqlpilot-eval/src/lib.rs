pub mod equivalence;
pub mod harness;
pub mod report;

pub use equivalence::equivalent;
pub use harness::{EvalItemResult, EvalSummary, run_eval};
pub use report::render_report;
