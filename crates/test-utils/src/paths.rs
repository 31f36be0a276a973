//! Locating optional reference rasters and creating scratch directories.

use std::path::PathBuf;

/// Environment variable naming an extra directory with test rasters.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Returns the workspace root directory (two levels above this crate).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Directories searched for test rasters, in priority order.
///
/// 1. `$TEST_DATA_DIR` (if set)
/// 2. `crates/raster-engine/testdata/`
/// 3. `testdata/` at the workspace root
/// 4. `/opt/appdata/`, where deployed workers keep the NLCD reference
pub fn test_data_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(dir) = std::env::var(TEST_DATA_ENV) {
        dirs.push(PathBuf::from(dir));
    }

    let root = workspace_root();
    dirs.push(root.join("crates/raster-engine/testdata"));
    dirs.push(root.join("testdata"));
    dirs.push(PathBuf::from("/opt/appdata"));
    dirs
}

/// Returns the first existing `name` under [`test_data_dirs`].
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    test_data_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// A scratch directory that is removed when dropped.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_search_order_ends_with_appdata() {
        let dirs = test_data_dirs();
        assert_eq!(dirs.last(), Some(&PathBuf::from("/opt/appdata")));
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("definitely_not_here_9f2c.tif").is_none());
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("scenario_test_");
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("scenario_test_"));
    }
}
