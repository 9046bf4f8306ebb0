//! `relnote.toml`: store defaults, extra schemas and step pipelines.

use relnote_steps::{BuiltinStep, StepSpec};
use relnote_store::{RELEASE_NOTE_SCHEMA, RecordSchema, find_schema};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "relnote.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown schema `{0}`; run `relnote schemas` to list known schemas")]
    UnknownSchema(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelnoteConfig {
    pub store: StoreConfig,
    /// Extra schemas; a name shared with a built-in schema replaces it.
    pub schemas: Vec<RecordSchema>,
    pub pipelines: PipelinesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Schema used when a command does not name one.
    pub schema: String,
    /// Hold `<file>.lock` for the whole step sequence.
    pub serialize_writes: bool,
    /// Where rendered payloads are written; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: RELEASE_NOTE_SCHEMA.to_string(),
            serialize_writes: false,
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelinesConfig {
    pub insert: Pipeline,
    pub update: Pipeline,
    pub remove: Pipeline,
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            insert: Pipeline::builtin(&[BuiltinStep::Touch, BuiltinStep::Insert]),
            update: Pipeline::builtin(&[BuiltinStep::Update]),
            remove: Pipeline::builtin(&[BuiltinStep::Remove]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pipeline {
    pub steps: Vec<StepSpec>,
    /// Best-effort compensation run when `steps` aborts.
    #[serde(default)]
    pub rollback: Vec<StepSpec>,
}

impl Pipeline {
    fn builtin(steps: &[BuiltinStep]) -> Self {
        Self {
            steps: steps.iter().copied().map(StepSpec::builtin).collect(),
            rollback: Vec::new(),
        }
    }
}

impl RelnoteConfig {
    /// Load `path`, or `relnote.toml` in the working directory when it exists.
    ///
    /// Without either, built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    Self::load_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), schemas = config.schemas.len(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Configured schemas first, then built-ins they do not shadow.
    pub fn all_schemas(&self) -> Vec<RecordSchema> {
        let mut schemas = self.schemas.clone();
        for builtin in RecordSchema::builtin() {
            if find_schema(&schemas, &builtin.name).is_none() {
                schemas.push(builtin);
            }
        }
        schemas
    }

    /// Resolve `name`, or the configured default schema.
    pub fn schema(&self, name: Option<&str>) -> Result<RecordSchema, ConfigError> {
        let name = name.unwrap_or(&self.store.schema);
        find_schema(&self.all_schemas(), name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSchema(name.to_string()))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.store
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relnote_steps::StepAction;
    use relnote_store::{FieldKind, SUBSCRIBER_SCHEMA};

    #[test]
    fn defaults_use_builtin_pipelines() {
        let config = RelnoteConfig::from_toml("").expect("empty config");
        assert_eq!(config.store.schema, RELEASE_NOTE_SCHEMA);
        assert!(!config.store.serialize_writes);
        assert_eq!(
            config
                .pipelines
                .insert
                .steps
                .iter()
                .map(|step| step.name.as_str())
                .collect::<Vec<_>>(),
            vec!["touch", "insert"]
        );
        assert_eq!(
            config.pipelines.remove.steps[0].action,
            StepAction::Builtin(BuiltinStep::Remove)
        );
    }

    #[test]
    fn parses_store_schemas_and_pipelines() {
        let config = RelnoteConfig::from_toml(
            r#"
[store]
schema = "changelog"
serialize_writes = true

[[schemas]]
name = "changelog"
fields = [
  { name = "summary", title = "Summary", kind = "line", required = true },
  { name = "areas", title = "Areas", kind = "checklist", items = ["Api", "Ui"] },
]

[pipelines.insert]
steps = [
  { name = "pull", run = ["git", "pull"], quiet = true },
  { builtin = "insert" },
  { name = "commit", run = ["git", "commit", "-m", "notes: %groupName%", "%origFile%"] },
]
rollback = [{ run = ["git", "checkout", "--", "%origFile%"] }]
"#,
        )
        .expect("config should parse");

        assert!(config.store.serialize_writes);
        let schema = config.schema(None).expect("default schema resolves");
        assert_eq!(schema.name, "changelog");
        assert_eq!(
            schema.field("areas").map(|field| field.kind),
            Some(FieldKind::Checklist)
        );

        let insert = &config.pipelines.insert;
        assert_eq!(insert.steps.len(), 3);
        assert!(insert.steps[0].quiet);
        assert_eq!(insert.steps[1].name, "insert");
        assert_eq!(insert.rollback[0].name, "git");
        assert_eq!(config.pipelines.update.steps.len(), 1);
    }

    #[test]
    fn configured_schema_shadows_builtin() {
        let config = RelnoteConfig::from_toml(
            r#"
[[schemas]]
name = "subscriber"
fields = [{ name = "email", title = "Email", kind = "line" }]
"#,
        )
        .expect("config should parse");
        let schemas = config.all_schemas();
        assert_eq!(schemas.len(), 2);
        let subscriber = config
            .schema(Some(SUBSCRIBER_SCHEMA))
            .expect("subscriber resolves");
        assert_eq!(subscriber.fields.len(), 1);
    }

    #[test]
    fn rejects_unknown_keys_and_schemas() {
        assert!(RelnoteConfig::from_toml("[store]\nschemaa = \"x\"\n").is_err());
        assert!(
            RelnoteConfig::from_toml("[pipelines.insert]\nsteps = [{ name = \"x\" }]\n").is_err()
        );
        let config = RelnoteConfig::default();
        assert!(matches!(
            config.schema(Some("missing")),
            Err(ConfigError::UnknownSchema(name)) if name == "missing"
        ));
    }
}
