use std::path::Path;

use anyhow::Result;

use super::{read_input, write_output, App};

pub fn export(app: &App, output: Option<&Path>) -> Result<()> {
    let store = app.open_store()?;
    let snapshot = store.export_all();
    write_output(output, &snapshot.to_json()?)?;
    eprintln!("Exported {} profiles", snapshot.profiles.len());
    Ok(())
}

/// Imported profiles always get added; ids already taken are replaced.
pub fn import(app: &App, file: &Path) -> Result<()> {
    let text = read_input(file)?;
    let mut store = app.open_store()?;
    let imported = store.import_snapshot(&text)?;
    println!("Imported {} profiles", imported.len());
    for profile in &imported {
        println!("  {} ({})", profile.name, profile.id);
    }
    Ok(())
}
