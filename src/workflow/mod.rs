pub mod test_ctx;
pub mod test_plan;

pub use test_ctx::TestCtx;
pub use test_plan::{plan_tests, TestPlan};
