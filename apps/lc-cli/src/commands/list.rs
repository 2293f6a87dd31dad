// list.rs — `lc list`: list executions with optional status/verdict/
// correlation filters.

use lc_executor::Gcec;
use lc_store::ListFilters;

use crate::commands::filters::{StatusArg, VerdictArg};

pub fn execute(
    gcec: &Gcec,
    status: Option<StatusArg>,
    verdict: Option<VerdictArg>,
    correlation_id: Option<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let mut filters = ListFilters::new();
    filters.status = status.map(Into::into);
    filters.verdict = verdict.map(Into::into);
    filters.correlation_id = correlation_id;
    filters.limit = limit;

    let executions = gcec.list_executions(&filters)?;
    if executions.is_empty() {
        println!("No executions found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<12} {:<10} {:<8} STARTED",
        "EXECUTION_ID", "STATUS", "VERDICT", "RISK"
    );
    for record in executions {
        println!(
            "{:<38} {:<12} {:<10} {:<8} {}",
            record.execution_id,
            record.status.as_str(),
            format!("{:?}", record.verdict),
            format!("{:?}", record.risk_level),
            record.started_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}
