use bff::RealExecutor;
use bff::build::{FileStatus, StepStatus};
use bff::init::InitOptions;

/// Render templates, bootstrap the local environment, and provision in
/// admin mode.
pub async fn init(options: InitOptions) -> anyhow::Result<()> {
    let root = super::project_root()?;

    println!("Initializing {}...", root.display());
    let outcome = bff::init::init(&RealExecutor, &root, &options)
        .await
        .map_err(super::with_hint)?;

    println!();
    println!("Project:  {}", outcome.identity);
    println!("Mode:     {}", outcome.target.mode);
    println!("Region:   {}", outcome.target.region);

    match &outcome.render {
        Some(render) => {
            println!("Templates:");
            for file in &render.files {
                match file.status {
                    FileStatus::Rendered { replacements } => {
                        println!("  rendered {} ({replacements})", file.path.display())
                    }
                    FileStatus::AlreadyRendered => {
                        println!("  already rendered {}", file.path.display())
                    }
                }
            }
        }
        None => println!("Templates: already rendered"),
    }

    println!("Environment:");
    for (step, status) in &outcome.bootstrap.steps {
        match status {
            StepStatus::Done => println!("  {step}: done"),
            StepStatus::Skipped(reason) => println!("  {step}: skipped ({reason})"),
        }
    }
    if outcome.dockerfile_written {
        println!("  Dockerfile: generated");
    }

    if let Some(provision) = &outcome.provision {
        println!("Cloud:");
        println!(
            "  service account: {}",
            if provision.account_created { "created" } else { "exists" }
        );
        if !provision.roles_added.is_empty() {
            println!("  roles bound: {}", provision.roles_added.join(", "));
        }
        println!(
            "  CI secret {}: {}",
            outcome.identity.ci_secret_name(),
            if provision.key_published { "published" } else { "already published" }
        );
        println!("  image pushed: {}", provision.image.reference);
    }

    println!();
    println!("Next steps:");
    if outcome.provision.is_some() {
        println!("  bff deploy");
    } else {
        println!("  make local");
        println!("  bff init --admin   # provision GCP when ready");
    }

    Ok(())
}
