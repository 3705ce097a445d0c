use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use static_site::{
    build_site_stack,
    context::{hosted_zone_context_key, lookup_hosted_zone},
    deploy::{deploy_template, destroy_stack, load_sdk_config, template_source},
    Asset, Context, SiteConfig, Stack,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "static-site")]
#[command(about = "Declare, synthesize and deploy a static website on S3 and CloudFront")]
struct Args {
    /// Path to the site config. Defaults to the closest site.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Domain the site is served from, eg: example.com
    #[arg(long)]
    domain: Option<String>,

    #[arg(long)]
    stack_name: Option<String>,

    /// 12 digit AWS account id the hosted zone lives in
    #[arg(long)]
    account: Option<String>,

    #[arg(long)]
    region: Option<String>,

    /// Directory uploaded to the site bucket
    #[arg(long)]
    site_contents: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the CloudFormation template to the output directory
    Synth,
    /// Resolve the hosted zone and store it in the context file
    Lookup,
    /// Stage the site contents and create or update the stack
    Deploy,
    /// Delete the stack
    Destroy,
}

/// given a search dir, see if site.toml exists in this dir, and if so
/// return the path to it. If not found, back up 1 dir at a time
/// until one is found (limit 5 times)
fn find_closest_site_toml(mut search_dir: PathBuf) -> Option<PathBuf> {
    for _ in 0..5 {
        search_dir.push(static_site::config::DEFAULT_CONFIG_FILE);
        if search_dir.is_file() {
            return Some(search_dir);
        }
        search_dir.pop();
        if !search_dir.pop() {
            break;
        }
    }
    None
}

fn load_config(args: &Args) -> Result<SiteConfig> {
    let config_path = match &args.config {
        Some(p) => Some(p.clone()),
        None => find_closest_site_toml(std::env::current_dir()?),
    };
    if let Some(p) = &config_path {
        info!("Using config {:?}", p);
    }
    let mut config = SiteConfig::load(config_path.as_deref())?;
    if let Some(v) = &args.domain {
        config.domain_name = v.clone();
    }
    if let Some(v) = &args.stack_name {
        config.stack_name = v.clone();
    }
    if let Some(v) = &args.account {
        config.account = Some(v.clone());
    }
    if let Some(v) = &args.region {
        config.region = Some(v.clone());
    }
    if let Some(v) = &args.site_contents {
        config.site_contents = v.clone();
    }
    config.validate()?;
    Ok(config)
}

fn account_and_region(config: &SiteConfig) -> Result<(&str, &str)> {
    match (config.account.as_deref(), config.region.as_deref()) {
        (Some(a), Some(r)) => Ok((a, r)),
        _ => bail!("Both an account (SITE_ACCOUNT / --account) and a region (SITE_REGION / --region) are required"),
    }
}

async fn lookup(config: &SiteConfig, sdk_config: &aws_config::SdkConfig) -> Result<Context> {
    let (account, region) = account_and_region(config)?;
    let client = aws_sdk_route53::Client::new(sdk_config);
    let zone = lookup_hosted_zone(&client, &config.domain_name).await?;
    let mut context = Context::load(&config.context_file)?;
    let key = hosted_zone_context_key(account, region, &config.domain_name);
    context.set_hosted_zone(key, &zone)?;
    context.save(&config.context_file)
        .with_context(|| format!("Failed to write context file {:?}", config.context_file))?;
    info!("Hosted zone {} ({}) saved to {:?}", zone.zone_name, zone.hosted_zone_id, config.context_file);
    Ok(context)
}

/// Writes the template and returns it with the stack and asset it came from.
fn synth(config: &SiteConfig, context: Context) -> Result<(Stack, Asset, String)> {
    let (stack, asset) = build_site_stack(config, context)?;
    let template = stack.synth();
    // pretty so the template reads well in the CloudFormation console
    let body = template.to_json_pretty()?;
    let path = config.template_path();
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output dir {:?}", config.output_dir))?;
    std::fs::write(&path, &body)
        .with_context(|| format!("Failed to write template {:?}", path))?;
    info!("Wrote {} resources to {:?}", template.resources.len(), path);
    Ok((stack, asset, body))
}

async fn deploy(config: &SiteConfig, sdk_config: &aws_config::SdkConfig) -> Result<()> {
    let (account, region) = account_and_region(config)?;
    let mut context = Context::load(&config.context_file)?;
    let key = hosted_zone_context_key(account, region, &config.domain_name);
    if context.hosted_zone(&key)?.is_none() {
        warn!("No hosted zone for {} in {:?}, looking it up", config.domain_name, config.context_file);
        context = lookup(config, sdk_config).await?;
    }
    let (stack, asset, body) = synth(config, context)?;

    let s3 = aws_sdk_s3::Client::new(sdk_config);
    asset.ensure_staging_bucket(&s3, region).await?;
    asset.upload(&s3).await?;
    let source = template_source(&s3, &asset.staging_bucket, region, stack.name(), body).await?;

    let cfn = aws_sdk_cloudformation::Client::new(sdk_config);
    let outputs = deploy_template(&cfn, stack.name(), &source).await?;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    let config = load_config(&args).context("Invalid site configuration")?;
    match args.command {
        Command::Synth => {
            let context = Context::load(&config.context_file)?;
            synth(&config, context)?;
        }
        Command::Lookup => {
            let sdk_config = load_sdk_config(config.region.clone()).await;
            lookup(&config, &sdk_config).await?;
        }
        Command::Deploy => {
            let sdk_config = load_sdk_config(config.region.clone()).await;
            deploy(&config, &sdk_config).await.context("Deploy failed")?;
        }
        Command::Destroy => {
            let sdk_config = load_sdk_config(config.region.clone()).await;
            let cfn = aws_sdk_cloudformation::Client::new(&sdk_config);
            destroy_stack(&cfn, &config.stack_name).await.context("Destroy failed")?;
        }
    }
    Ok(())
}
