use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::styles::ElementDef;

pub const CONFIG_FILENAME: &str = "docx2tei.toml";
pub const CONFIG_ENV: &str = "DOCX2TEI_CONFIG";
pub const DEFAULT_DTD_PATH: &str = "http://texts.thlib.org/cocoon/texts/catalogs/";

const DEFAULT_CONFIG: &str = include_str!("../templates/docx2tei.toml");

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub convert: ConvertSection,
    /// Extra or replacement character styles, keyed by Word style name.
    #[serde(default)]
    pub styles: HashMap<String, ElementDef>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConvertSection {
    #[serde(default)]
    pub base_sigil: Option<String>,
    #[serde(default)]
    pub dtd_path: Option<String>,
    /// Template file; relative paths are taken from the config file's directory.
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub text_folders: Option<bool>,
}

impl AppConfig {
    pub fn base_sigil(&self) -> &str {
        self.convert.base_sigil.as_deref().unwrap_or("base")
    }

    pub fn dtd_path(&self) -> &str {
        self.convert.dtd_path.as_deref().unwrap_or(DEFAULT_DTD_PATH)
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Config search order: the environment variable, then upwards from the working directory,
/// from `workdir`, and from the executable's directory.
pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        if p.exists() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, CONFIG_FILENAME, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILENAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let mut cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parse config toml: {}", path.display()))?;
    if let Some(template) = cfg.convert.template.as_mut() {
        if template.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            *template = base.join(&*template);
        }
    }
    Ok(cfg)
}

/// Write the default config into `dir`. An existing file is kept unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        bail!(
            "config already exists: {} (use --force to replace it)",
            cfg_path.display()
        );
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg: AppConfig = toml::from_str(DEFAULT_CONFIG).expect("default config");
        assert_eq!(cfg.base_sigil(), "base");
        assert_eq!(cfg.dtd_path(), DEFAULT_DTD_PATH);
    }

    #[test]
    fn style_overrides_and_relative_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[convert]
base_sigil = "Dg"
template = "skeleton.xml"
overwrite = true

[styles."My Place"]
tag = "placeName"
attributes = { type = "region" }
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.base_sigil(), "Dg");
        assert_eq!(cfg.convert.overwrite, Some(true));
        assert_eq!(cfg.convert.template, Some(dir.path().join("skeleton.xml")));
        let def = &cfg.styles["My Place"];
        assert_eq!(def.tag, "placeName");
        assert_eq!(def.attributes.get("type").map(String::as_str), Some("region"));
    }

    #[test]
    fn init_refuses_to_clobber() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_default_config(dir.path(), false).expect("init");
        assert!(path.exists());
        assert!(init_default_config(dir.path(), false).is_err());
        assert!(init_default_config(dir.path(), true).is_ok());
    }

    #[test]
    fn finds_config_in_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").expect("write");
        assert_eq!(
            find_file_upwards(&nested, CONFIG_FILENAME, 8),
            Some(dir.path().join(CONFIG_FILENAME))
        );
    }
}
