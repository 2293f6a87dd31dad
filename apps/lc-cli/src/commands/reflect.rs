// reflect.rs — `lc similar`/`reflect`/`repair`: Similarity & Reflection's
// offline, advisory queries (§4.9). None of these mutate an execution or
// change a WriteGate verdict.

use std::path::Path;

use lc_executor::Gcec;

use crate::commands::filters::SimilarByArg;

pub fn similar(
    gcec: &Gcec,
    execution_id: &str,
    limit: usize,
    min_similarity: f64,
    by: SimilarByArg,
) -> anyhow::Result<()> {
    let neighbors = match by {
        SimilarByArg::Combined => gcec.find_similar_executions(execution_id, limit, min_similarity, true)?,
        SimilarByArg::Error => gcec.find_similar_executions_by_error(execution_id, limit, min_similarity, true)?,
        SimilarByArg::Paths => gcec.find_similar_executions_by_paths(execution_id, limit, min_similarity, true)?,
    };
    if neighbors.is_empty() {
        println!("No similar executions found.");
        return Ok(());
    }
    for neighbor in neighbors {
        println!("{:<38} score={:.3}", neighbor.execution_id, neighbor.score);
    }
    Ok(())
}

pub fn build_hints(gcec: &Gcec, workspace: &Path, window_days: i64) -> anyhow::Result<()> {
    let hints = gcec.build_reflection_hints(window_days)?;
    let path = workspace.join(".lonelycat").join("reflection").join("hints_7d.json");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&hints)?)?;
    println!("wrote {}", path.display());
    println!("top_error_steps: {}", hints.top_error_steps.len());
    println!("false_allow_patterns: {}", hints.false_allow_patterns.len());
    println!("slow_steps: {}", hints.slow_steps.len());
    for note in &hints.suggested_policy_notes {
        println!("  - {note}");
    }
    Ok(())
}

pub fn repair(gcec: &Gcec, execution_id: &str, limit: usize, min_similarity: f64) -> anyhow::Result<()> {
    let draft = gcec.synthesize_repair(execution_id, limit, min_similarity)?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}
