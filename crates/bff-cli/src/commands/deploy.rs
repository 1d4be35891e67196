use bff::RealExecutor;
use bff::deploy::DeployOptions;

/// Rebuild, push and roll out to Cloud Run.
pub async fn deploy(options: DeployOptions) -> anyhow::Result<()> {
    let root = super::project_root()?;

    println!("Deploying...");
    let result = bff::deploy::deploy(&RealExecutor, &root, &options)
        .await
        .map_err(super::with_hint)?;

    println!();
    println!("Image:   {}", result.record.image);
    if let Some(digest) = &result.record.digest {
        println!("Digest:  {digest}");
    }
    println!("Region:  {}", result.record.region);
    println!();
    println!("Deployed: {}", result.url);

    Ok(())
}
