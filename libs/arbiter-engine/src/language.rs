// Language profiles: how to stage, build and run a submission per language
use anyhow::{bail, Context, Result};
use arbiter_common::config::{RunnerConfig, DEFAULT_LANGUAGE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Placeholder in a run command replaced by the per-test input file
pub const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub source_filename: String,
    #[serde(default)]
    pub compile_command: Option<String>,
    pub run_command: String,
}

impl LanguageProfile {
    fn new(
        name: &str,
        aliases: &[&str],
        source_filename: &str,
        compile_command: Option<&str>,
        run_command: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            source_filename: source_filename.to_string(),
            compile_command: compile_command.map(str::to_string),
            run_command: run_command.to_string(),
        }
    }

    pub fn needs_compile(&self) -> bool {
        self.compile_command.is_some()
    }

    /// Command for one test case, reading its input from `input_file`.
    ///
    /// `input_file` is always an index-derived name produced by the stager,
    /// never caller-supplied text.
    pub fn run_command_for(&self, input_file: &str) -> String {
        if self.run_command.contains(INPUT_PLACEHOLDER) {
            self.run_command.replace(INPUT_PLACEHOLDER, input_file)
        } else {
            format!("{} < {}", self.run_command, input_file)
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported language '{requested}'; supported: {}", supported.join(", "))]
pub struct UnsupportedLanguage {
    pub requested: String,
    pub supported: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageProfile>,
}

/// Immutable lookup table from language identifier to profile.
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: HashMap<String, Arc<LanguageProfile>>,
    default_language: String,
}

impl LanguageRegistry {
    /// The table the provisioned template image supports out of the box
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in builtin_profiles() {
            let profile = Arc::new(profile);
            for key in std::iter::once(&profile.name).chain(profile.aliases.iter()) {
                profiles.insert(key.clone(), Arc::clone(&profile));
            }
        }

        Self {
            profiles,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Profiles from `config.languages_config` (built-in table when unset),
    /// defaulting to `config.default_language`
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let registry = match &config.languages_config {
            Some(path) => Self::load(path)?,
            None => Self::builtin(),
        };
        registry.with_default_language(&config.default_language)
    }

    /// Load profiles from a languages.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json_str(&content)
            .with_context(|| format!("Invalid language config in {}", config_path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;
        Self::from_profiles(languages_json.languages)
    }

    pub fn from_profiles(profiles: Vec<LanguageProfile>) -> Result<Self> {
        if profiles.is_empty() {
            bail!("No languages configured");
        }

        let mut table = HashMap::new();
        for mut profile in profiles {
            profile.name = normalize(&profile.name);
            profile.aliases = profile.aliases.iter().map(|a| normalize(a)).collect();

            if profile.name.is_empty() {
                bail!("Language with empty name");
            }
            if profile.source_filename.trim().is_empty() {
                bail!("Language '{}' has no source filename", profile.name);
            }
            if profile.run_command.trim().is_empty() {
                bail!("Language '{}' has no run command", profile.name);
            }
            if matches!(&profile.compile_command, Some(cmd) if cmd.trim().is_empty()) {
                bail!("Language '{}' has an empty compile command", profile.name);
            }

            let profile = Arc::new(profile);
            let keys = std::iter::once(&profile.name).chain(profile.aliases.iter());
            for key in keys {
                if table.insert(key.clone(), Arc::clone(&profile)).is_some() {
                    bail!("Language identifier '{}' is defined more than once", key);
                }
            }
        }

        Ok(Self {
            profiles: table,
            default_language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    /// Language used when a request does not name one
    pub fn with_default_language(mut self, language: &str) -> Result<Self> {
        let language = normalize(language);
        let canonical = match self.profiles.get(&language) {
            Some(profile) => profile.name.clone(),
            None => bail!("Default language '{}' is not configured", language),
        };
        self.default_language = canonical;
        Ok(self)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Resolve a raw identifier (case and surrounding whitespace ignored).
    /// A missing or blank identifier resolves to the default language.
    pub fn resolve(
        &self,
        requested: Option<&str>,
    ) -> Result<Arc<LanguageProfile>, UnsupportedLanguage> {
        let key = match requested.map(normalize) {
            Some(key) if !key.is_empty() => key,
            _ => self.default_language.clone(),
        };

        self.profiles
            .get(&key)
            .cloned()
            .ok_or_else(|| UnsupportedLanguage {
                requested: requested.unwrap_or_default().to_string(),
                supported: self.supported(),
            })
    }

    /// Every accepted identifier, canonical names and aliases, sorted
    pub fn supported(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// One entry per canonical language, sorted by name
    pub fn profiles(&self) -> Vec<Arc<LanguageProfile>> {
        let names: BTreeSet<&String> = self.profiles.values().map(|p| &p.name).collect();
        names
            .into_iter()
            .filter_map(|name| self.profiles.get(name).cloned())
            .collect()
    }
}

fn builtin_profiles() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile::new("python", &[], "solution.py", None, "python3 solution.py"),
        LanguageProfile::new("go", &[], "main.go", Some("go build -o main main.go"), "./main"),
        LanguageProfile::new(
            "javascript",
            &["js", "node"],
            "solution.js",
            None,
            "node solution.js",
        ),
        LanguageProfile::new("java", &[], "Main.java", Some("javac Main.java"), "java Main"),
    ]
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_consistent() {
        assert!(LanguageRegistry::from_profiles(builtin_profiles()).is_ok());
    }

    #[test]
    fn test_resolve_canonical_and_aliases() {
        let registry = LanguageRegistry::builtin();

        assert_eq!(registry.resolve(Some("python")).unwrap().name, "python");
        assert_eq!(registry.resolve(Some("go")).unwrap().name, "go");
        assert_eq!(registry.resolve(Some("java")).unwrap().name, "java");
        for alias in ["javascript", "js", "node"] {
            assert_eq!(registry.resolve(Some(alias)).unwrap().name, "javascript");
        }
    }

    #[test]
    fn test_resolve_ignores_case_and_whitespace() {
        let registry = LanguageRegistry::builtin();

        assert_eq!(registry.resolve(Some("  PyThOn ")).unwrap().name, "python");
        assert_eq!(registry.resolve(Some("NODE")).unwrap().name, "javascript");
    }

    #[test]
    fn test_missing_language_uses_default() {
        let registry = LanguageRegistry::builtin();

        assert_eq!(registry.resolve(None).unwrap().name, "python");
        assert_eq!(registry.resolve(Some("   ")).unwrap().name, "python");

        let registry = registry.with_default_language("JS").unwrap();
        assert_eq!(registry.resolve(None).unwrap().name, "javascript");
    }

    #[test]
    fn test_unsupported_language_lists_supported_set() {
        let registry = LanguageRegistry::builtin();

        let err = registry.resolve(Some("ruby")).unwrap_err();

        assert_eq!(err.requested, "ruby");
        assert_eq!(
            err.supported,
            vec!["go", "java", "javascript", "js", "node", "python"]
        );
        assert!(err.to_string().contains("ruby"));
    }

    #[test]
    fn test_only_java_and_go_compile() {
        let registry = LanguageRegistry::builtin();

        assert!(registry.resolve(Some("java")).unwrap().needs_compile());
        assert!(registry.resolve(Some("go")).unwrap().needs_compile());
        assert!(!registry.resolve(Some("python")).unwrap().needs_compile());
        assert!(!registry.resolve(Some("js")).unwrap().needs_compile());
    }

    #[test]
    fn test_run_command_for_input_file() {
        let registry = LanguageRegistry::builtin();
        let python = registry.resolve(Some("python")).unwrap();

        assert_eq!(
            python.run_command_for("input_3.txt"),
            "python3 solution.py < input_3.txt"
        );

        let templated = LanguageProfile::new("x", &[], "x.sh", None, "sh x.sh --in {input}");
        assert_eq!(templated.run_command_for("input_0.txt"), "sh x.sh --in input_0.txt");
    }

    #[test]
    fn test_profiles_are_listed_once() {
        let registry = LanguageRegistry::builtin();
        let names: Vec<String> = registry.profiles().iter().map(|p| p.name.clone()).collect();

        assert_eq!(names, vec!["go", "java", "javascript", "python"]);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let result = LanguageRegistry::from_json_str(
            r#"{"languages": [
                {"name": "python", "source_filename": "a.py", "run_command": "python3 a.py"},
                {"name": "py3", "aliases": ["Python"], "source_filename": "b.py", "run_command": "python3 b.py"}
            ]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_commands_rejected() {
        let result = LanguageRegistry::from_json_str(
            r#"{"languages": [{"name": "c", "source_filename": "main.c", "compile_command": " ", "run_command": "./a.out"}]}"#,
        );
        assert!(result.is_err());

        let result = LanguageRegistry::from_json_str(
            r#"{"languages": [{"name": "c", "source_filename": "main.c", "run_command": ""}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_default_rejected() {
        assert!(LanguageRegistry::builtin().with_default_language("ruby").is_err());
    }

    #[test]
    fn test_load_repository_config_matches_builtin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/languages.json");
        let loaded = LanguageRegistry::load(&path).unwrap();

        assert_eq!(loaded.supported(), LanguageRegistry::builtin().supported());
        for profile in LanguageRegistry::builtin().profiles() {
            assert_eq!(loaded.resolve(Some(&profile.name)).unwrap(), profile);
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(LanguageRegistry::load(Path::new("does/not/exist.json")).is_err());
    }

    #[test]
    fn test_from_config_honors_file_and_default() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/languages.json");
        let config = RunnerConfig::from_lookup(|key| match key {
            "ARBITER_DEFAULT_LANGUAGE" => Some("node".to_string()),
            "ARBITER_LANGUAGES_CONFIG" => Some(path.display().to_string()),
            _ => None,
        })
        .unwrap();

        let registry = LanguageRegistry::from_config(&config).unwrap();
        assert_eq!(registry.default_language(), "javascript");
        assert_eq!(registry.resolve(None).unwrap().name, "javascript");

        let config = RunnerConfig::from_lookup(|key| match key {
            "ARBITER_LANGUAGES_CONFIG" => Some("does/not/exist.json".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(LanguageRegistry::from_config(&config).is_err());
    }
}
