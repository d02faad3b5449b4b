//! Loader for configurations split across several files.
//!
//! The main file may name other files through `include`. Sections are merged
//! at the top level only, so every section must come from exactly one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Track loaded files to prevent circular includes
	loaded_files: HashSet<PathBuf>,
	/// Track which sections come from which files for error reporting
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a new ConfigLoader with the given base path.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		// Load the main configuration file
		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Value = toml::from_str(&main_content)?;

		// Check for includes
		let includes = self.extract_includes(&main_toml)?;

		if includes.is_empty() {
			return main_content.parse();
		}

		// Build combined TOML with validation
		let combined_toml = self
			.load_and_combine(main_toml, includes, config_path.clone())
			.await?;

		// Round-trip through text so the combined document is validated like a single file
		let config_str = toml::to_string(&combined_toml).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		config_str.parse()
	}

	/// Loads a file and resolves environment variables.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		// Check for circular includes
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Extracts `include` directives. Accepts a single path or an array of paths.
	fn extract_includes(&self, toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		match toml.get("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.iter()
				.map(|item| {
					item.as_str().map(PathBuf::from).ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Loads and combines configuration files with section uniqueness validation.
	async fn load_and_combine(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_file_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		// Remove include directives from main config
		if let Some(table) = main_toml.as_table_mut() {
			table.remove("include");
		}

		// Track sections in main file
		if let Some(main_table) = main_toml.as_table() {
			for key in main_table.keys() {
				self.section_sources
					.insert(key.clone(), main_file_path.clone());
			}
		}

		// Load and validate each included file
		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let include_toml: toml::Value = toml::from_str(&include_content)?;

			// Validate no duplicate sections
			if let Some(include_table) = include_toml.as_table() {
				for key in include_table.keys() {
					if let Some(existing_source) = self.section_sources.get(key) {
						return Err(ConfigError::Validation(format!(
							"Duplicate section '{}' found in {} and {}. \
							Each top-level section must be unique across all configuration files.",
							key,
							existing_source.display(),
							resolved_path.display()
						)));
					}
					self.section_sources
						.insert(key.clone(), resolved_path.clone());
				}

				// Merge the tables
				if let Some(main_table) = main_toml.as_table_mut() {
					for (key, value) in include_table {
						main_table.insert(key.clone(), value.clone());
					}
				}
			}
		}

		Ok(main_toml)
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		// Verify the file exists
		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const MARKET: &str = r#"
[market]
id = "test-market"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
cleanup_interval_seconds = 3600
[storage.implementations.memory]
"#;

	const CATALOG: &str = r#"
[[catalog.products]]
id = 3
name = "Cold pressed groundnut oil"
price = 200
unit = "L"
owner = "Ravi Kumar"
location = "Mandya"
available_quantity = 50
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{}{}", MARKET, STORAGE)).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.market.id, "test-market");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"storage.toml\", \"catalog.toml\"]\n{}", MARKET);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();
		fs::write(temp_dir.path().join("catalog.toml"), CATALOG).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.market.id, "test-market");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.catalog.products[0].name, "Cold pressed groundnut oil");
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = \"storage.toml\"\n{}", MARKET);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(loader.load_config("main.toml").await.is_ok());
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"duplicate.toml\"]\n{}{}", MARKET, STORAGE);
		let duplicate_config = r#"
[market]
id = "another-market"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'market'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = format!("include = [\"self.toml\"]\n{}", MARKET);
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_file() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"absent.toml\"]\n{}", MARKET);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[tokio::test]
	async fn test_non_string_include_rejected() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [1]\n{}", MARKET);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader.load_config("main.toml").await.unwrap_err().to_string();
		assert!(error_msg.contains("only strings"));
	}
}
