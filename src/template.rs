//! The CloudFormation template a stack synthesizes into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SiteError, SiteResult};

/// Anything that can be rendered as a CloudFormation resource.
pub trait CfnResource {
    fn type_string(&self) -> &'static str;
    /// Fails only if the resource's fields cannot be represented as JSON.
    fn properties(&self) -> SiteResult<Value>;
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// What happens to the physical resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// CloudFormation's own default: the resource is orphaned.
    Retain,
    Destroy,
    Snapshot,
}

impl RemovalPolicy {
    pub fn as_deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        RemovalPolicy::Retain
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl TemplateResource {
    pub fn from_cfn(resource: &dyn CfnResource) -> SiteResult<Self> {
        Ok(Self {
            ty: resource.type_string().to_string(),
            properties: resource.properties()?,
            ..Default::default()
        })
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        let p = policy.as_deletion_policy().to_string();
        self.deletion_policy = Some(p.clone());
        self.update_replace_policy = Some(p);
        self
    }

    pub fn depends_on<S: Into<String>>(mut self, logical_id: S) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: "2010-09-09".to_string(),
            description: None,
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl Template {
    /// Pretty printed so the template reads well in the CloudFormation console.
    pub fn to_json_pretty(&self) -> SiteResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = (&'a String, &'a TemplateResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }
}

/// Logical ids are 1 to 255 ASCII alphanumeric characters.
pub fn validate_logical_id(logical_id: &str) -> SiteResult<()> {
    if logical_id.len() > 255 {
        return Err(SiteError::config(format!("Invalid logical id {:?}\nmust be less than 255 characters", logical_id)));
    }
    if logical_id.is_empty() {
        return Err(SiteError::config(format!("Invalid logical id {:?}\nMust contain at least 1 character", logical_id)));
    }
    if !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SiteError::config(format!("Invalid logical id {:?}\nMust contain only alphanumeric characters [A-Za-z0-9]", logical_id)));
    }
    Ok(())
}

/// Strips everything CloudFormation does not accept in a logical id.
pub fn sanitize_logical_id(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn validate_stack_name(stack_name: &str) -> SiteResult<()> {
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || SiteError::config(format!("Invalid stack name {}\n{}", stack_name, restriction));
    match stack_name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    if !stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid());
    }
    if stack_name.len() > 128 {
        return Err(invalid());
    }
    Ok(())
}
