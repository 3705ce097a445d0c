//! Values looked up from the AWS account ahead of declaration.
//!
//! Declaration never calls AWS. Lookups are resolved beforehand (see
//! [`lookup_hosted_zone`]) and cached in a JSON context file so that
//! synthesizing the same config twice produces the same template.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{SiteError, SiteResult};

pub const DEFAULT_CONTEXT_FILE: &str = "site.context.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneAttributes {
    /// zone id without the `/hostedzone/` prefix
    #[serde(rename = "Id")]
    pub hosted_zone_id: String,
    /// fully qualified, always ends in `.`
    #[serde(rename = "Name")]
    pub zone_name: String,
}

pub fn hosted_zone_context_key(account: &str, region: &str, domain_name: &str) -> String {
    format!("hosted-zone:account={account}:domainName={domain_name}:region={region}")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file is an empty context.
    pub fn load<P: AsRef<Path>>(path: P) -> SiteResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No context file at {:?}", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> SiteResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set<S: Into<String>>(&mut self, key: S, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn hosted_zone(&self, key: &str) -> SiteResult<Option<HostedZoneAttributes>> {
        match self.values.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set_hosted_zone<S: Into<String>>(&mut self, key: S, zone: &HostedZoneAttributes) -> SiteResult<()> {
        self.values.insert(key.into(), serde_json::to_value(zone)?);
        Ok(())
    }
}

/// Finds the public hosted zone named exactly `domain_name`.
pub async fn lookup_hosted_zone(client: &aws_sdk_route53::Client, domain_name: &str) -> SiteResult<HostedZoneAttributes> {
    let fqdn = if domain_name.ends_with('.') {
        domain_name.to_string()
    } else {
        format!("{domain_name}.")
    };
    info!("Looking up hosted zone {fqdn}");
    let resp = client
        .list_hosted_zones_by_name()
        .dns_name(&fqdn)
        .send()
        .await
        .map_err(SiteError::provider)?;
    for zone in resp.hosted_zones().unwrap_or_default() {
        let is_private = zone.config().map(|c| c.private_zone()).unwrap_or(false);
        if is_private || zone.name() != Some(fqdn.as_str()) {
            continue;
        }
        if let Some(id) = zone.id() {
            let hosted_zone_id = id.trim_start_matches("/hostedzone/").to_string();
            debug!("Found hosted zone {hosted_zone_id} for {fqdn}");
            return Ok(HostedZoneAttributes { hosted_zone_id, zone_name: fqdn });
        }
    }
    Err(SiteError::ZoneNotFound(domain_name.to_string()))
}
