// filters.rs — clap-friendly mirrors of the store's filter enums. `list`'s
// CLI surface needs `ValueEnum` for argument parsing, which the store types
// themselves don't derive (they're shaped for serde, not clap).

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl From<StatusArg> for lc_store::ExecutionStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => lc_store::ExecutionStatus::Pending,
            StatusArg::Running => lc_store::ExecutionStatus::Running,
            StatusArg::Completed => lc_store::ExecutionStatus::Completed,
            StatusArg::Failed => lc_store::ExecutionStatus::Failed,
            StatusArg::RolledBack => lc_store::ExecutionStatus::RolledBack,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VerdictArg {
    Allow,
    NeedApproval,
    Deny,
}

impl From<VerdictArg> for lc_policy::Verdict {
    fn from(value: VerdictArg) -> Self {
        match value {
            VerdictArg::Allow => lc_policy::Verdict::Allow,
            VerdictArg::NeedApproval => lc_policy::Verdict::NeedApproval,
            VerdictArg::Deny => lc_policy::Verdict::Deny,
        }
    }
}

/// Which of §4.9's three similarity queries `lc similar` should run.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SimilarByArg {
    #[default]
    Combined,
    Error,
    Paths,
}
