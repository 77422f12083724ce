//! Writing generated simulation programs to disk.

use color_eyre::eyre::WrapErr;
use std::path::{Path, PathBuf};

/// File name used when the output is a directory
pub const SCRIPT_FILE: &str = "simulation.py";

/// Where the program goes: a `.py` output path is taken as-is, anything
/// else is a directory that receives [`SCRIPT_FILE`].
pub fn script_path(output: &Path) -> PathBuf {
    if output.extension().is_some_and(|ext| ext == "py") {
        output.to_path_buf()
    } else {
        output.join(SCRIPT_FILE)
    }
}

/// Write a script, creating its directory, and mark it executable.
pub fn write_script(path: &Path, content: &str) -> color_eyre::eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create output directory '{}'", parent.display()))?;
    }
    std::fs::write(path, content)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to write script {:?}: {}", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}
