use crate::error::Result;
use crate::suppress::SuppressList;
use crate::suppress::parser::SuppressParser;
use std::path::{Path, PathBuf};

/// Name of the suppress file looked up in each directory.
pub const SUPPRESS_FILE: &str = "suppress.txt";

/// Loads suppress lists from the custom and standard config directories
#[derive(Debug, Clone, Default)]
pub struct SuppressLoader {
    /// Custom config directory path
    custom_dir: Option<PathBuf>,
    /// Standard config directory path
    standard_dir: Option<PathBuf>,
    /// Skip the built-in defaults
    without_defaults: bool,
}

impl SuppressLoader {
    /// Loader reading from the user config directory (`~/.config/chronicle` on Linux)
    pub fn new() -> Self {
        SuppressLoaderBuilder::new().standard_dir_opt(Self::default_standard_dir()).build()
    }

    /// Load the merged list: defaults, then the standard file, then the custom file
    ///
    /// A file that fails to parse is an error; a missing file is skipped.
    pub fn load(&self) -> Result<SuppressList> {
        let mut list = if self.without_defaults { SuppressList::new() } else { SuppressList::defaults() };

        for path in self.find_files() {
            let parsed = SuppressParser::parse_file(&path)?;
            tracing::debug!(path = %path.display(), entries = parsed.len(), "Loaded suppress list");
            list.merge(&parsed);
        }

        Ok(list)
    }

    /// Existing suppress files, lowest priority first
    fn find_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();

        for dir in [&self.standard_dir, &self.custom_dir].into_iter().flatten() {
            let path = dir.join(SUPPRESS_FILE);
            if path.exists() && !files.contains(&path) {
                files.push(path);
            }
        }

        files
    }

    fn default_standard_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chronicle"))
    }
}

/// Builder for SuppressLoader
#[derive(Debug, Default)]
pub struct SuppressLoaderBuilder {
    custom_dir: Option<PathBuf>,
    standard_dir: Option<PathBuf>,
    without_defaults: bool,
}

impl SuppressLoaderBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom config directory
    pub fn custom_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.custom_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set standard config directory
    pub fn standard_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.standard_dir = Some(path.as_ref().to_path_buf());
        self
    }

    fn standard_dir_opt(mut self, path: Option<PathBuf>) -> Self {
        self.standard_dir = path;
        self
    }

    /// Do not start from the built-in defaults
    pub fn without_defaults(mut self) -> Self {
        self.without_defaults = true;
        self
    }

    /// Build the SuppressLoader
    pub fn build(self) -> SuppressLoader {
        SuppressLoader {
            custom_dir: self.custom_dir,
            standard_dir: self.standard_dir,
            without_defaults: self.without_defaults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppress::Heuristic;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_loader_builder() {
        let temp_dir = TempDir::new().unwrap();
        let custom_path = temp_dir.path().join("custom");

        let loader = SuppressLoaderBuilder::new().custom_dir(&custom_path).build();

        assert_eq!(loader.custom_dir, Some(custom_path));
        assert_eq!(loader.standard_dir, None);
    }

    #[test]
    fn test_load_without_files_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loader = SuppressLoaderBuilder::new().custom_dir(temp_dir.path()).build();

        assert_eq!(loader.load().unwrap(), SuppressList::defaults());
    }

    #[test]
    fn test_load_merges_directories() {
        let temp_dir = TempDir::new().unwrap();
        let custom_path = temp_dir.path().join("custom");
        let standard_path = temp_dir.path().join("standard");
        fs::create_dir_all(&custom_path).unwrap();
        fs::create_dir_all(&standard_path).unwrap();

        fs::write(custom_path.join(SUPPRESS_FILE), "low_confidence_animated: Tales of the Empire\n").unwrap();
        fs::write(standard_path.join(SUPPRESS_FILE), "low_confidence_manga: Star Wars: Visions\n").unwrap();

        let list = SuppressLoaderBuilder::new()
            .custom_dir(&custom_path)
            .standard_dir(&standard_path)
            .without_defaults()
            .build()
            .load()
            .unwrap();

        assert_eq!(list.len(), 2);
        assert!(list.contains(Heuristic::LowConfidenceAnimated, "Tales of the Empire"));
        assert!(list.contains(Heuristic::LowConfidenceManga, "Star Wars: Visions"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SUPPRESS_FILE), "garbage").unwrap();

        let loader = SuppressLoaderBuilder::new().custom_dir(temp_dir.path()).build();
        assert!(loader.load().is_err());
    }
}
