//! Append-only construction of script files inside a workspace.

use crate::error::WorkspaceError;
use crate::workspace::Workspace;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// Appends `lines` to `file_name` inside the workspace, one per line.
///
/// The file is created if absent and never truncated, so a scripted environment
/// can be built up across several calls. Content is written verbatim.
pub fn append<I, S>(workspace: &mut Workspace, file_name: &str, lines: I) -> Result<(), WorkspaceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = workspace.dir()?.join(file_name);
    let append_error = |source| WorkspaceError::Append {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(append_error)?;
    }

    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(append_error)?;
    file.write_all(content.as_bytes()).map_err(append_error)?;
    debug!(path = %path.display(), bytes = content.len(), "appended script lines");
    Ok(())
}
