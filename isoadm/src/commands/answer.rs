use std::path::{Path, PathBuf};

use answerfile::{answer_file_name, render_answer};
use anyhow::Result;

use super::{find, write_output, App};

pub fn run(app: &App, key: &str, placeholders: bool, output: Option<&Path>) -> Result<()> {
    let store = app.open_store()?;
    let profile = find(&store, key)?;
    let text = render_answer(profile, placeholders)?;

    let default_path = PathBuf::from(answer_file_name(profile));
    write_output(Some(output.unwrap_or(&default_path)), &text)
}
