use bff::{DeploymentOutcome, DeploymentRecord, OperationRecord};

/// Print deployments (or operations), most recent first.
pub fn history(limit: Option<usize>, json: bool, operations: bool) -> anyhow::Result<()> {
    let root = super::project_root()?;
    let state = bff::status::read_state(&root)?;
    let limit = limit.unwrap_or(usize::MAX);

    if operations {
        let ops: Vec<&OperationRecord> = state.operations.iter().rev().take(limit).collect();
        if json {
            println!("{}", serde_json::to_string_pretty(&ops)?);
        } else if ops.is_empty() {
            println!("No operations recorded.");
        } else {
            for op in ops {
                print_operation(op);
            }
        }
        return Ok(());
    }

    let records: Vec<&DeploymentRecord> = state.history().iter().take(limit).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No deployments recorded.");
    } else {
        for record in records {
            print_deployment(record);
        }
    }
    Ok(())
}

fn print_deployment(record: &DeploymentRecord) {
    let when = record.timestamp.format("%Y-%m-%d %H:%M:%S");
    let digest = record
        .digest
        .as_deref()
        .map(|d| d.get(..19).unwrap_or(d))
        .unwrap_or("-");
    match &record.outcome {
        DeploymentOutcome::Success { url } => {
            println!("{when}  ok      {}  {digest}  {url}", record.region)
        }
        DeploymentOutcome::Failure { message } => {
            let first_line = message.lines().next().unwrap_or_default();
            println!("{when}  failed  {}  {digest}  {first_line}", record.region)
        }
    }
}

fn print_operation(op: &OperationRecord) {
    let details: Vec<String> = op
        .details
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    println!(
        "{}  {:<20} {}",
        op.timestamp.format("%Y-%m-%d %H:%M:%S"),
        op.operation.as_str(),
        details.join(" ")
    );
}
