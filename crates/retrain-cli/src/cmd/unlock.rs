use crate::output::print_json;
use anyhow::Context;
use retrain_core::lock::RunLock;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let holder = RunLock::holder(root).context("failed to read run lock")?;
    let removed = RunLock::force_release(root).context("failed to remove run lock")?;

    if json {
        return print_json(&serde_json::json!({
            "removed": removed,
            "holder": holder,
        }));
    }
    match (removed, holder) {
        (false, _) => println!("No run lock held."),
        (true, Some(h)) => println!(
            "Removed lock held by run {} (pid {}, since {}).",
            h.run_id,
            h.pid,
            h.acquired_at.to_rfc3339()
        ),
        (true, None) => println!("Removed unreadable run lock."),
    }
    Ok(())
}
