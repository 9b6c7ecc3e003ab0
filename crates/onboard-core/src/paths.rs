use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ONBOARD_DIR: &str = ".onboard";
pub const CONFIG_FILE: &str = ".onboard/config.yaml";
pub const DB_FILE: &str = ".onboard/onboard.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn onboard_dir(root: &Path) -> PathBuf {
    root.join(ONBOARD_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.onboard/config.yaml")
        );
        assert_eq!(db_path(root), PathBuf::from("/tmp/proj/.onboard/onboard.db"));
        assert_eq!(onboard_dir(root), PathBuf::from("/tmp/proj/.onboard"));
    }
}
