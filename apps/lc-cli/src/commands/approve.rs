// approve.rs — `lc approve`: record a human sign-off on a NEED_APPROVAL
// decision so a subsequent `submit` of the same decision is accepted.

use lc_executor::Gcec;
use uuid::Uuid;

pub fn execute(gcec: &Gcec, decision_id: Uuid, approved_by: &str, note: Option<String>) -> anyhow::Result<()> {
    let approval = gcec.approve(decision_id, approved_by, note)?;
    println!("approval_id: {}", approval.approval_id);
    println!("decision_id: {}", approval.decision_id);
    println!("approved_by: {}", approval.approved_by);
    println!("approved_at: {}", approval.approved_at);
    Ok(())
}
