//! Diagnostics: issues, lint, fix planning and coverage reports.

mod fix;
mod issue;
mod lint;
mod report;

pub(crate) use fix::insert_adapter;
pub use fix::{
    FixPolicy, FixReport, apply_fixes, fix_to_fixed_point, materialize_merge_nodes,
    materialize_synthetic_adapters, plan_fixes,
};
pub use issue::{FixAction, Issue, IssueKind, Severity, count_kind};
pub use lint::lint;
pub use report::{CoverageReport, coverage};
