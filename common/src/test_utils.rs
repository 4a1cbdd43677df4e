use std::path::PathBuf;

/// Returns the workspace root directory (parent of the calling crate's manifest dir).
fn workspace_root(manifest_dir: &str) -> PathBuf {
    let manifest_dir = PathBuf::from(manifest_dir);
    manifest_dir
        .parent()
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Returns the path to a test output file under `<workspace>/test_output/`,
/// creating the directory on first use.
///
/// Pass `env!("CARGO_MANIFEST_DIR")` from the calling crate.
pub fn test_output_path(manifest_dir: &str, name: &str) -> PathBuf {
    let dir = workspace_root(manifest_dir).join("test_output");
    std::fs::create_dir_all(&dir).expect("Failed to create test_output directory");
    dir.join(name)
}
