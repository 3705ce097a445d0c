pub use serde::Serialize;
pub use serde_json::{json, Value};

pub use crate::error::{SiteError, SiteResult};
pub use crate::intrinsics::*;
pub use crate::scope::{ConstructKind, Stack, StackEnv};
pub use crate::template::{sanitize_logical_id, CfnResource, RemovalPolicy, TemplateResource};

mod lambda;
pub use lambda::*;
mod hosted_zone;
pub use hosted_zone::*;
mod s3_bucket;
pub use s3_bucket::*;
mod certificate;
pub use certificate::*;
mod cloudfront;
pub use cloudfront::*;
mod route53;
pub use route53::*;
mod deployment;
pub use deployment::*;

// higher level resources:
mod static_site;
pub use static_site::*;
