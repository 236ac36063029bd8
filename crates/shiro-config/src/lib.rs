//! YAML configuration loading and normalization for Shiro.

pub mod error;
pub mod loader;
pub mod model;
pub mod normalize;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use model::*;

/// The conventional per-user config path (`~/.config/shiro/shiro.yaml` on
/// Linux), offered as a default for callers that don't pass `--config`
/// explicitly. Not used by [`ConfigLoader`] itself, which always loads
/// exactly the path it is given.
pub fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "shiro")
        .map(|dirs| dirs.config_dir().join("shiro.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_ends_with_expected_file_name() {
        if let Some(path) = default_config_path() {
            assert_eq!(path.file_name().unwrap(), "shiro.yaml");
        }
    }
}
