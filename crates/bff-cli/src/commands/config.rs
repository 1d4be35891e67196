pub fn config_get(key: &str) -> anyhow::Result<()> {
    let root = super::project_root()?;
    match bff::config::get(&root, key)? {
        Some(value) => println!("{value}"),
        None => anyhow::bail!("{key} is not set; run `bff init` first"),
    }
    Ok(())
}

pub fn config_set(assignment: &str) -> anyhow::Result<()> {
    let root = super::project_root()?;
    let (key, value) = bff::config::parse_assignment(assignment)
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got {assignment:?}"))?;

    bff::config::set(&root, key, value)?;
    println!("{key} = {value}");
    Ok(())
}

pub fn config_list() -> anyhow::Result<()> {
    let root = super::project_root()?;
    let entries = bff::config::list(&root)?;
    if entries.is_empty() {
        println!("No configuration yet; run `bff init` first.");
        return Ok(());
    }
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    Ok(())
}
