//! The declaration graph.
//!
//! A [`Stack`] is the parent scope every declaration registers into. It
//! holds the child constructs, the CloudFormation resources they own, the
//! outputs, and the lookup context. References are checked as resources are
//! added: a resource may only point at logical ids that already exist, so
//! the graph is acyclic by construction and insertion order is a valid
//! apply order.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::{SiteError, SiteResult};
use crate::intrinsics::referenced_logical_ids;
use crate::template::{validate_logical_id, validate_stack_name, CfnResource, Template, TemplateOutput, TemplateResource};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEnv {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl StackEnv {
    pub fn new<A: Into<String>, R: Into<String>>(account: A, region: R) -> Self {
        Self { account: Some(account.into()), region: Some(region.into()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    /// reads existing infrastructure, owns no resources
    Lookup,
    Bucket,
    Certificate,
    Distribution,
    AliasRecord,
    Deployment,
    Function,
    /// groups other constructs, e.g. a whole site
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    pub id: String,
    pub kind: ConstructKind,
    pub logical_ids: Vec<String>,
}

#[derive(Debug)]
pub struct Stack {
    name: String,
    env: StackEnv,
    description: Option<String>,
    context: Context,
    constructs: Vec<Construct>,
    resources: Vec<(String, TemplateResource)>,
    outputs: BTreeMap<String, TemplateOutput>,
}

impl Stack {
    pub fn new<S: Into<String>>(name: S, env: StackEnv) -> SiteResult<Self> {
        let name = name.into();
        validate_stack_name(&name)?;
        if let Some(region) = &env.region {
            crate::regions::verify_region(region)?;
        }
        Ok(Self {
            name,
            env,
            description: None,
            context: Context::default(),
            constructs: vec![],
            resources: vec![],
            outputs: BTreeMap::new(),
        })
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &StackEnv {
        &self.env
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Registers a child declaration. Ids are unique per stack.
    pub fn add_construct<S: Into<String>>(&mut self, id: S, kind: ConstructKind) -> SiteResult<()> {
        let id = id.into();
        if self.constructs.iter().any(|c| c.id == id) {
            return Err(SiteError::DuplicateConstruct(id));
        }
        debug!(stack = %self.name, "Declaring {:?} {}", kind, id);
        self.constructs.push(Construct { id, kind, logical_ids: vec![] });
        Ok(())
    }

    pub fn constructs(&self) -> &[Construct] {
        &self.constructs
    }

    pub fn construct(&self, id: &str) -> Option<&Construct> {
        self.constructs.iter().find(|c| c.id == id)
    }

    pub fn add_cfn_resource<S: Into<String>>(&mut self, owner: &str, logical_id: S, resource: &dyn CfnResource) -> SiteResult<()> {
        let logical_id = logical_id.into();
        if let Err(reason) = resource.validate() {
            return Err(SiteError::Validation { resource: logical_id, reason });
        }
        self.add_resource(owner, logical_id, TemplateResource::from_cfn(resource)?)
    }

    /// Adds a resource owned by the construct `owner`. Every logical id the
    /// resource references must already be declared.
    pub fn add_resource<S: Into<String>>(&mut self, owner: &str, logical_id: S, resource: TemplateResource) -> SiteResult<()> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        if self.has_resource(&logical_id) {
            return Err(SiteError::DuplicateResource(logical_id));
        }
        let mut refs = referenced_logical_ids(&resource.properties);
        refs.extend(resource.depends_on.iter().cloned());
        for to in refs {
            if to == logical_id || !self.has_resource(&to) {
                return Err(SiteError::DanglingReference { from: logical_id, to });
            }
        }
        let construct = self
            .constructs
            .iter_mut()
            .find(|c| c.id == owner)
            .ok_or_else(|| SiteError::config(format!("Resource {logical_id} added to undeclared construct {owner}")))?;
        construct.logical_ids.push(logical_id.clone());
        debug!(stack = %self.name, "Adding {} {}", resource.ty, logical_id);
        self.resources.push((logical_id, resource));
        Ok(())
    }

    pub fn has_resource(&self, logical_id: &str) -> bool {
        self.resources.iter().any(|(id, _)| id == logical_id)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.iter().find(|(id, _)| id == logical_id).map(|(_, r)| r)
    }

    pub fn add_output<S: Into<String>>(&mut self, id: S, description: Option<String>, value: Value) -> SiteResult<()> {
        let id = id.into();
        validate_logical_id(&id)?;
        if self.outputs.contains_key(&id) {
            return Err(SiteError::DuplicateOutput(id));
        }
        for to in referenced_logical_ids(&value) {
            if !self.has_resource(&to) {
                return Err(SiteError::DanglingReference { from: id, to });
            }
        }
        self.outputs.insert(id, TemplateOutput { description, value });
        Ok(())
    }

    /// `(dependent, dependency)` pairs, sorted.
    pub fn dependencies(&self) -> Vec<(String, String)> {
        let mut edges = vec![];
        for (id, resource) in self.resources.iter() {
            let mut refs = referenced_logical_ids(&resource.properties);
            refs.extend(resource.depends_on.iter().cloned());
            for to in refs {
                edges.push((id.clone(), to));
            }
        }
        edges.sort();
        edges
    }

    /// Logical ids in an order where every resource follows its dependencies.
    pub fn apply_order(&self) -> Vec<&str> {
        self.resources.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn synth(&self) -> Template {
        let mut template = Template::default();
        template.description = self.description.clone();
        for (id, resource) in self.resources.iter() {
            template.resources.insert(id.clone(), resource.clone());
        }
        template.outputs = self.outputs.clone();
        template
    }
}
