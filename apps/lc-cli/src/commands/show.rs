// show.rs — `lc show`/`events`/`lineage`/`correlation`/`replay`/`stats`:
// read-only inspection of a single execution or the store as a whole.

use lc_executor::Gcec;

pub fn execute(gcec: &Gcec, execution_id: &str) -> anyhow::Result<()> {
    let Some(summary) = gcec.get_execution(execution_id)? else {
        anyhow::bail!("no execution `{execution_id}`");
    };
    println!("{}", serde_json::to_string_pretty(&summary.record)?);
    println!();
    println!("steps:");
    for step in &summary.steps {
        println!(
            "  [{:>2}] {:<10} {:<10} {}",
            step.step_num,
            step.step_name,
            step.status.as_str(),
            step.error_message.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

pub fn events(gcec: &Gcec, execution_id: &str, tail: usize) -> anyhow::Result<()> {
    let events = gcec.get_execution_events(execution_id, tail)?;
    for event in events {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

pub fn lineage(gcec: &Gcec, execution_id: &str, depth: usize) -> anyhow::Result<()> {
    let lineage = gcec.get_execution_lineage(execution_id, depth)?;
    println!("self: {} ({})", lineage.this.execution_id, lineage.this.status.as_str());
    println!("ancestors: {}", ids(&lineage.ancestors));
    println!("descendants: {}", ids(&lineage.descendants));
    println!("siblings: {}", ids(&lineage.siblings));
    Ok(())
}

pub fn correlation(gcec: &Gcec, correlation_id: &str) -> anyhow::Result<()> {
    let tree = gcec.list_executions_by_correlation(correlation_id)?;
    for record in tree {
        println!(
            "{} {:<10} parent={} trigger={:?}",
            record.execution_id,
            record.status.as_str(),
            record.parent_execution_id.as_deref().unwrap_or("-"),
            record.trigger_kind,
        );
    }
    Ok(())
}

pub fn replay(gcec: &Gcec, execution_id: &str) -> anyhow::Result<()> {
    let summary = gcec.replay_execution(execution_id)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn stats(gcec: &Gcec) -> anyhow::Result<()> {
    let stats = gcec.get_statistics()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn ids(records: &[lc_store::ExecutionRecord]) -> String {
    if records.is_empty() {
        return "-".to_string();
    }
    records
        .iter()
        .map(|r| r.execution_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
