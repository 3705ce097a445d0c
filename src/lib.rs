//! Declares the AWS topology of a static website: a looked-up Route 53
//! zone, a public S3 website bucket, a DNS validated certificate in
//! us-east-1, a CloudFront distribution, an alias record, and a deployment
//! of local site contents that invalidates `/*`.
//!
//! Declarations build a [`scope::Stack`], which synthesizes to a
//! CloudFormation [`template::Template`]. [`deploy`] submits it.

pub mod assets;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod intrinsics;
pub mod regions;
pub mod resources;
pub mod scope;
pub mod template;

pub use assets::Asset;
pub use config::SiteConfig;
pub use context::Context;
pub use error::{SiteError, SiteResult};
pub use resources::{declare, declare_with_asset, staging_bucket_for, SiteProps};
pub use scope::{Stack, StackEnv};
pub use template::Template;

/// Builds the stack for `config` and declares the site in it as
/// `StaticSite`. The returned asset is the scan of the site contents the
/// stack's deployment refers to.
pub fn build_site_stack(config: &SiteConfig, context: Context) -> SiteResult<(Stack, Asset)> {
    config.validate()?;
    let mut stack = Stack::new(&config.stack_name, config.stack_env())?
        .with_context(context)
        .with_description(format!("static site for {}", config.domain_name));
    let props = config.site_props();
    let asset = Asset::from_dir(&props.site_contents, staging_bucket_for(&stack, &props)?)?;
    declare_with_asset(&mut stack, SITE_CONSTRUCT_ID, &props, &asset)?;
    Ok((stack, asset))
}

pub const SITE_CONSTRUCT_ID: &str = "StaticSite";
