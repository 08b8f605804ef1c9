use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub const COLLECTION_INPUT: &str = "challenge1b_input.json";
pub const COLLECTION_OUTPUT: &str = "challenge1b_output.json";

/// Tuning knobs for the analysis engines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for one run, after which it ends in a timeout.
    pub timeout: Duration,
    pub max_sections: usize,
    pub max_subsections: usize,
    pub refined_text_chars: usize,
    /// Shell out to `pdftotext` when the built-in parser finds no text.
    pub ocr_fallback: bool,
    /// Delay between stages of the simulated engine.
    pub simulated_step: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_sections: 5,
            max_subsections: 5,
            refined_text_chars: 600,
            ocr_fallback: true,
            simulated_step: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub collections_dir: PathBuf,
    pub engine: EngineConfig,
    /// Level for the crate's own logs when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Loads configuration from the environment (and `.env` if present),
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = EngineConfig::default();
        let collections_dir = match std::env::var("DOCINTEL_COLLECTIONS_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()?.join("collections"),
        };

        Ok(Self {
            collections_dir,
            engine: EngineConfig {
                timeout: Duration::from_secs(env_or(
                    "DOCINTEL_TIMEOUT_SECS",
                    defaults.timeout.as_secs(),
                )?),
                max_sections: env_or("DOCINTEL_MAX_SECTIONS", defaults.max_sections)?,
                max_subsections: env_or("DOCINTEL_MAX_SUBSECTIONS", defaults.max_subsections)?,
                refined_text_chars: env_or(
                    "DOCINTEL_REFINED_TEXT_CHARS",
                    defaults.refined_text_chars,
                )?,
                ocr_fallback: env_or("DOCINTEL_OCR_FALLBACK", defaults.ocr_fallback)?,
                simulated_step: Duration::from_millis(env_or(
                    "DOCINTEL_SIMULATED_STEP_MS",
                    defaults.simulated_step.as_millis() as u64,
                )?),
            },
            log_level: std::env::var("DOCINTEL_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Every collection directory directly under `root` that holds an input
/// manifest, as `(name, input_path, output_path)`.
pub fn collection_paths(root: &Path) -> Result<Vec<(String, PathBuf, PathBuf)>> {
    let mut collections = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let input_path = entry.path().join(COLLECTION_INPUT);
        if !input_path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let output_path = entry.path().join(COLLECTION_OUTPUT);
        collections.push((name, input_path, output_path));
    }
    Ok(collections)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_advertised_bound() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.simulated_step, Duration::from_secs(1));
        assert_eq!(cfg.max_sections, 5);
    }

    #[test]
    fn test_env_or_parses_and_falls_back() {
        std::env::set_var("DOCINTEL_TEST_ENV_OR", " 42 ");
        assert_eq!(env_or::<u64>("DOCINTEL_TEST_ENV_OR", 7).unwrap(), 42);
        std::env::set_var("DOCINTEL_TEST_ENV_OR_BAD", "many");
        assert!(env_or::<u64>("DOCINTEL_TEST_ENV_OR_BAD", 7).is_err());
        assert_eq!(env_or::<u64>("DOCINTEL_TEST_ENV_OR_UNSET", 7).unwrap(), 7);
    }

    #[test]
    fn test_log_level_reads_crate_variable() {
        std::env::set_var("DOCINTEL_LOG", "debug");
        assert_eq!(Config::from_env().unwrap().log_level, "debug");
        std::env::remove_var("DOCINTEL_LOG");
        assert_eq!(Config::from_env().unwrap().log_level, "info");
    }

    #[test]
    fn test_collection_paths_only_lists_dirs_with_input() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("Collection 2")).unwrap();
        std::fs::write(root.path().join("Collection 2").join(COLLECTION_INPUT), "{}").unwrap();
        std::fs::create_dir(root.path().join("Collection 1")).unwrap();
        std::fs::write(root.path().join("Collection 1").join(COLLECTION_INPUT), "{}").unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();
        std::fs::write(root.path().join("stray.json"), "{}").unwrap();

        let found = collection_paths(root.path()).unwrap();
        let names: Vec<_> = found.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Collection 1", "Collection 2"]);
        assert!(found[0].2.ends_with(COLLECTION_OUTPUT));
    }
}
