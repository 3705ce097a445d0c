//! Site configuration.
//!
//! Values are layered, later layers win: defaults, the TOML file, a `.env`
//! file, then the process environment. The CLI applies its flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::DEFAULT_CONTEXT_FILE;
use crate::error::{SiteError, SiteResult};
use crate::resources::{validate_bucket_name, validate_domain_name, SiteProps, DEFAULT_SITE_CONTENTS};
use crate::scope::StackEnv;
use crate::template::validate_stack_name;

pub const DEFAULT_CONFIG_FILE: &str = "site.toml";
pub const DEFAULT_DOT_ENV_FILE: &str = ".env";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub domain_name: String,
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub site_contents: PathBuf,
    pub staging_bucket: Option<String>,
    pub auto_delete_objects: bool,
    pub context_file: PathBuf,
    /// where `synth` writes `<stack>.template.json`
    pub output_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain_name: String::new(),
            stack_name: "StaticSite".into(),
            account: None,
            region: None,
            site_contents: PathBuf::from(DEFAULT_SITE_CONTENTS),
            staging_bucket: None,
            auto_delete_objects: false,
            context_file: PathBuf::from(DEFAULT_CONTEXT_FILE),
            output_dir: PathBuf::from("out"),
        }
    }
}

/// `KEY=VALUE` per line. Empty lines and lines starting with `#` are skipped.
pub fn parse_dot_env(contents: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            map.insert(key.trim().into(), val.trim().into());
        }
    }
    map
}

/// A missing file is empty.
pub fn load_dot_env<P: AsRef<Path>>(path: P) -> SiteResult<BTreeMap<String, String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SiteError::config(format!("Failed to load .env file {:?}: {}", path, e)))?;
    Ok(parse_dot_env(&contents))
}

impl SiteConfig {
    pub fn from_toml_str(contents: &str) -> SiteResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads `path`, which must exist when given. Without a path the default
    /// `site.toml` is used if present.
    pub fn load_file(path: Option<&Path>) -> SiteResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No {DEFAULT_CONFIG_FILE}, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| SiteError::config(format!("Failed to read config file {:?}: {e}", path)))?;
        Self::from_toml_str(&contents)
    }

    /// File, then `.env`, then the process environment.
    pub fn load(path: Option<&Path>) -> SiteResult<Self> {
        let mut config = Self::load_file(path)?;
        let dot_env = load_dot_env(DEFAULT_DOT_ENV_FILE)?;
        config.apply_vars(|key| dot_env.get(key).cloned());
        config.apply_vars(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides fields from `SITE_*` variables. `AWS_REGION` is used when
    /// `SITE_REGION` is not set.
    pub fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("SITE_DOMAIN_NAME") {
            self.domain_name = v;
        }
        if let Some(v) = get("SITE_STACK_NAME") {
            self.stack_name = v;
        }
        if let Some(v) = get("SITE_ACCOUNT") {
            self.account = Some(v);
        }
        if let Some(v) = get("SITE_REGION").or_else(|| get("AWS_REGION")) {
            self.region = Some(v);
        }
        if let Some(v) = get("SITE_CONTENTS") {
            self.site_contents = PathBuf::from(v);
        }
        if let Some(v) = get("SITE_STAGING_BUCKET") {
            self.staging_bucket = Some(v);
        }
    }

    pub fn validate(&self) -> SiteResult<()> {
        validate_stack_name(&self.stack_name)?;
        if let Some(region) = &self.region {
            crate::regions::verify_region(region)?;
        }
        if self.domain_name.is_empty() {
            return Err(SiteError::config("Must provide a domain name (domain_name or SITE_DOMAIN_NAME)"));
        }
        validate_domain_name(&self.domain_name)?;
        if let Some(bucket) = &self.staging_bucket {
            validate_bucket_name(bucket)?;
        }
        if let Some(account) = &self.account {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(SiteError::config(format!("Invalid account id {account:?}, must be 12 digits")));
            }
        }
        Ok(())
    }

    pub fn stack_env(&self) -> StackEnv {
        StackEnv { account: self.account.clone(), region: self.region.clone() }
    }

    pub fn site_props(&self) -> SiteProps {
        SiteProps {
            domain_name: self.domain_name.clone(),
            site_contents: self.site_contents.clone(),
            staging_bucket: self.staging_bucket.clone(),
            auto_delete_objects: self.auto_delete_objects,
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.template.json", self.stack_name))
    }
}
