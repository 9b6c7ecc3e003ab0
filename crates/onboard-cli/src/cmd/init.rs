use crate::output::print_json;
use anyhow::Context;
use onboard_core::{paths, Platform};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "platform".to_string())
    });

    let created = Platform::init(root, &name)
        .with_context(|| format!("failed to initialize {}", root.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "config_created": created,
            "database": paths::db_path(root),
        }));
    }

    println!("Initializing onboarding in: {}", root.display());
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    println!("  ready:   {}", paths::DB_FILE);
    Ok(())
}
