use bff::RealExecutor;
use bff::clean::{CleanOptions, StepResult};
use bff::confirm::{Decision, ReadKeys, prompt_for_name};
use std::io::{IsTerminal, Write};

use crate::terminal::{CrLf, TerminalKeys};

/// Delete everything the project created, after the user types its name.
pub async fn clean(skip_local: bool, fresh_template: bool) -> anyhow::Result<()> {
    let root = super::project_root()?;
    let state = bff::status::read_state(&root)?;
    let identity = state.identity()?;
    let name = identity.name();

    println!("This will delete:");
    println!("  - Cloud Run service '{name}'");
    println!("  - Service account {}", identity.service_account_email());
    println!("  - Local containers and image {}", identity.image_reference());
    println!("  - The GitHub repository of this checkout");
    if skip_local {
        println!("  (keeping {})", root.display());
    } else {
        println!("  - {}", root.display());
        if fresh_template {
            println!("    (a fresh template checkout takes its place)");
        }
    }
    println!();
    println!("Type the project name to confirm, or 'q' to abort.");

    if confirm_name(name)? == Decision::Abort {
        println!("Aborted.");
        return Ok(());
    }

    let mut skip_local = skip_local;
    if !skip_local {
        println!();
        println!("{} cannot be recovered once deleted.", root.display());
        if !super::confirm_yes("Are you absolutely sure?")? {
            println!("Keeping the local directory.");
            skip_local = true;
        }
    }

    let options = CleanOptions {
        skip_local,
        fresh_template,
    };
    let report = bff::clean::clean(&RealExecutor, &root, options).await?;

    println!();
    for (step, result) in &report.steps {
        match result {
            StepResult::Done(detail) => println!("  {step}: {detail}"),
            StepResult::Skipped(reason) => println!("  {step}: skipped ({reason})"),
            StepResult::Failed(e) => println!("  {step}: FAILED ({e})"),
        }
    }

    if !report.is_complete() {
        let failed: Vec<String> = report
            .failures()
            .map(|(step, _)| step.to_string())
            .collect();
        let state = if report.state_reset {
            "reset"
        } else {
            "kept so it can be retried"
        };
        anyhow::bail!(
            "clean did not finish: {} failed; state was {state}",
            failed.join(", ")
        );
    }

    println!();
    println!("Clean complete.");
    Ok(())
}

/// Keypresses from a terminal, so escape aborts at once; lines from a pipe.
fn confirm_name(name: &str) -> anyhow::Result<Decision> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let decision = if stdin.is_terminal() {
        let mut keys = TerminalKeys::new()?;
        prompt_for_name(&mut keys, CrLf(&mut stdout), name)?
    } else {
        prompt_for_name(&mut ReadKeys::new(stdin.lock()), &mut stdout, name)?
    };
    stdout.flush()?;
    Ok(decision)
}
