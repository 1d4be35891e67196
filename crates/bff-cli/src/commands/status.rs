pub fn status(verbose: bool) -> anyhow::Result<()> {
    let root = super::project_root()?;
    let report = bff::status::status(&root, verbose)?;
    print!("{report}");
    Ok(())
}
