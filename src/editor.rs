use std::env;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Resolve the external editor: `$VISUAL`, then `$EDITOR`, then `vi`.
pub fn editor_command() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

/// Run the editor on `path` and block until it exits. The caller owns the
/// terminal suspend/resume around this call.
pub fn edit_file(path: &Path) -> Result<()> {
    let editor = editor_command();
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("editor command is empty");
    };

    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("could not launch editor `{editor}`"))?;

    if !status.success() {
        bail!("editor `{editor}` exited with {status}");
    }
    Ok(())
}
