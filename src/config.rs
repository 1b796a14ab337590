use crate::enrich::{ColorTagMap, EnrichOptions};
use crate::error::ConfigError;
use crate::import::ImportOptions;
use crate::parser::SortMode;
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

const DEFAULT_SOURCE_PATH: &str = "./highlights";
const DEFAULT_TARGET_PATH: &str = "./vault/Highlights";

#[derive(Parser, Debug, Default)]
#[command(name = "koreader-import")]
#[command(about = "Import KOReader highlight exports into Markdown notes")]
pub struct CliArgs {
    /// Export file, or directory searched for *.json exports
    #[arg(short, long)]
    pub source: Option<String>,

    /// Directory the Markdown notes are written to
    #[arg(short, long)]
    pub target: Option<String>,

    /// Store notes in this SQLite database instead of a directory
    #[arg(short, long)]
    pub database_path: Option<String>,

    /// YAML settings file (color tags and defaults)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Highlight order inside a note: page or time
    #[arg(long)]
    pub sort: Option<String>,

    /// Write one note per export file instead of one per book
    #[arg(long)]
    pub combine: bool,

    /// Do not derive tags from highlight colors
    #[arg(long)]
    pub no_color_tags: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Contents of the optional YAML settings file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub source: Option<String>,
    pub target: Option<String>,
    pub database_path: Option<String>,
    pub sort: Option<String>,
    pub one_note_per_book: Option<bool>,
    pub apply_color_tags: Option<bool>,
    pub color_tags: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source_path: String,
    pub target_path: String,
    pub database_path: Option<String>,
    pub sort: SortMode,
    pub one_note_per_book: bool,
    pub apply_color_tags: bool,
    pub color_tags: ColorTagMap,
    pub dry_run: bool,
    pub today: NaiveDate,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let cli = CliArgs::parse();
        let env = |key: &str| std::env::var(key).ok();

        let settings = match cli.config.clone().or_else(|| env("KOREADER_SETTINGS")) {
            Some(path) => load_settings(&path)?,
            None => Settings::default(),
        };

        Self::from_args(cli, settings, env, Local::now().date_naive())
    }

    fn from_args<E>(
        cli: CliArgs,
        settings: Settings,
        env: E,
        today: NaiveDate,
    ) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let source_path = cli
            .source
            .or_else(|| env("KOREADER_SOURCE"))
            .or(settings.source)
            .unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string());

        let target_path = cli
            .target
            .or_else(|| env("KOREADER_TARGET"))
            .or(settings.target)
            .unwrap_or_else(|| DEFAULT_TARGET_PATH.to_string());

        let database_path = cli
            .database_path
            .or_else(|| env("KOREADER_DATABASE"))
            .or(settings.database_path);

        let sort = match cli.sort.or(settings.sort) {
            Some(s) => parse_sort_mode(&s)?,
            None => SortMode::default(),
        };

        let one_note_per_book = !cli.combine && settings.one_note_per_book.unwrap_or(true);
        let apply_color_tags = !cli.no_color_tags && settings.apply_color_tags.unwrap_or(true);

        Ok(Config {
            source_path,
            target_path,
            database_path,
            sort,
            one_note_per_book,
            apply_color_tags,
            color_tags: ColorTagMap::new(settings.color_tags),
            dry_run: cli.dry_run,
            today,
        })
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            enrich: EnrichOptions {
                color_tags: self.color_tags.clone(),
                apply_color_tags: self.apply_color_tags,
            },
            sort: self.sort,
            one_note_per_book: self.one_note_per_book,
            dry_run: self.dry_run,
            today: self.today,
        }
    }
}

pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::SettingsUnreadable {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    parse_settings(&content, path)
}

fn parse_settings(content: &str, path: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::SettingsInvalid {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn parse_sort_mode(s: &str) -> Result<SortMode, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "page" => Ok(SortMode::Page),
        "time" => Ok(SortMode::Time),
        _ => Err(ConfigError::InvalidSortMode(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_paths() {
        let config = Config::from_args(CliArgs::default(), Settings::default(), no_env, date(2026, 2, 1))
            .unwrap();

        assert_eq!(config.source_path, "./highlights");
        assert_eq!(config.target_path, "./vault/Highlights");
        assert_eq!(config.database_path, None);
        assert_eq!(config.sort, SortMode::Page);
        assert!(config.one_note_per_book);
        assert!(config.apply_color_tags);
        assert!(!config.dry_run);
        assert_eq!(config.today, date(2026, 2, 1));
    }

    #[test]
    fn test_cli_beats_env_beats_settings() {
        let cli = CliArgs {
            source: Some("/cli/source".into()),
            ..Default::default()
        };
        let settings = Settings {
            source: Some("/settings/source".into()),
            target: Some("/settings/target".into()),
            database_path: Some("/settings/db.sqlite".into()),
            ..Default::default()
        };
        let env = |key: &str| (key == "KOREADER_TARGET").then(|| "/env/target".to_string());

        let config = Config::from_args(cli, settings, env, date(2026, 2, 1)).unwrap();

        assert_eq!(config.source_path, "/cli/source");
        assert_eq!(config.target_path, "/env/target");
        assert_eq!(config.database_path.as_deref(), Some("/settings/db.sqlite"));
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = CliArgs {
            combine: true,
            no_color_tags: true,
            dry_run: true,
            sort: Some("TIME".into()),
            ..Default::default()
        };
        let settings = Settings {
            one_note_per_book: Some(true),
            apply_color_tags: Some(true),
            sort: Some("page".into()),
            ..Default::default()
        };

        let config = Config::from_args(cli, settings, no_env, date(2026, 2, 1)).unwrap();

        assert!(!config.one_note_per_book);
        assert!(!config.apply_color_tags);
        assert!(config.dry_run);
        assert_eq!(config.sort, SortMode::Time);
    }

    #[test]
    fn test_invalid_sort_mode() {
        let cli = CliArgs {
            sort: Some("alphabetical".into()),
            ..Default::default()
        };

        let result = Config::from_args(cli, Settings::default(), no_env, date(2026, 2, 1));

        assert_eq!(result, Err(ConfigError::InvalidSortMode("alphabetical".into())));
    }

    #[test]
    fn test_parse_settings_yaml() {
        let yaml = r#"
target: ./vault
sort: time
one_note_per_book: false
color_tags:
  Yellow: [hl/insight]
  red:
    - hl/important
    - review
"#;

        let settings = parse_settings(yaml, "settings.yaml").unwrap();
        let config = Config::from_args(CliArgs::default(), settings, no_env, date(2026, 2, 1)).unwrap();

        assert_eq!(config.target_path, "./vault");
        assert_eq!(config.sort, SortMode::Time);
        assert!(!config.one_note_per_book);
        assert_eq!(config.color_tags.tags_for("yellow"), vec!["hl/insight"]);
        assert_eq!(config.color_tags.tags_for("red"), vec!["hl/important", "review"]);

        let options = config.import_options();
        assert!(!options.one_note_per_book);
        assert_eq!(options.enrich.color_tags, config.color_tags);
    }

    #[test]
    fn test_empty_settings_file() {
        assert_eq!(parse_settings("  \n", "empty.yaml").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_settings_file() {
        let result = parse_settings("color_tags: [not, a, map]", "bad.yaml");

        assert!(matches!(result, Err(ConfigError::SettingsInvalid { .. })));
    }

    #[test]
    fn test_missing_settings_file() {
        let result = load_settings("/definitely/not/here.yaml");

        assert!(matches!(result, Err(ConfigError::SettingsUnreadable { .. })));
    }
}
