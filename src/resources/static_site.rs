use std::path::PathBuf;

use tracing::info;

use super::*;
use crate::assets::Asset;
use crate::regions::CLOUDFRONT_CERTIFICATE_REGION;

pub const DEFAULT_SITE_CONTENTS: &str = "./site-contents";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProps {
    /// bare domain, eg: example.com. A public hosted zone for it must
    /// already exist and be present in the stack's context.
    pub domain_name: String,
    /// local directory uploaded verbatim to the site bucket
    pub site_contents: PathBuf,
    /// bucket the site contents are staged in before the deployment copies
    /// them. Defaults to `<stack>-assets-<account>-<region>`.
    pub staging_bucket: Option<String>,
    /// empty the site bucket on teardown so the delete can succeed
    pub auto_delete_objects: bool,
}

impl SiteProps {
    pub fn new<S: Into<String>>(domain_name: S) -> Self {
        Self {
            domain_name: domain_name.into(),
            site_contents: PathBuf::from(DEFAULT_SITE_CONTENTS),
            staging_bucket: None,
            auto_delete_objects: false,
        }
    }
}

pub fn default_staging_bucket(stack: &Stack) -> SiteResult<String> {
    match (&stack.env().account, &stack.env().region) {
        (Some(account), Some(region)) => Ok(format!("{}-assets-{account}-{region}", stack.name().to_ascii_lowercase())),
        _ => Err(SiteError::config(format!(
            "Stack {} needs an account and region to name its staging bucket",
            stack.name()
        ))),
    }
}

/// Bucket the site contents of `props` are staged in.
pub fn staging_bucket_for(stack: &Stack, props: &SiteProps) -> SiteResult<String> {
    let staging_bucket = match &props.staging_bucket {
        Some(b) => b.clone(),
        None => default_staging_bucket(stack)?,
    };
    validate_bucket_name(&staging_bucket)?;
    Ok(staging_bucket)
}

/// Declares a static website for `props.domain_name` under `id`:
///
/// - `{id}/Zone`: lookup of the existing hosted zone
/// - `{id}/SiteBucket`: website bucket with index.html / error.html,
///   public read, destroyed with the stack
/// - `{id}/Certificate`: DNS validated certificate, always in us-east-1
/// - `{id}/SiteDistribution`: cloudfront in front of the bucket over http
/// - `{id}/SiteAliasRecord`: A alias record from the domain to cloudfront
/// - `{id}/DeployWithInvalidation`: copies the site contents to the bucket,
///   removes stale objects and invalidates `/*`
///
/// Also adds the outputs `{id}Bucket` and `{id}DistributionId`.
/// Any error leaves the stack partially declared and it should be dropped.
pub fn declare(stack: &mut Stack, id: &str, props: &SiteProps) -> SiteResult<()> {
    validate_domain_name(&props.domain_name)?;
    let asset = Asset::from_dir(&props.site_contents, staging_bucket_for(stack, props)?)?;
    declare_with_asset(stack, id, props, &asset)
}

/// Same as [`declare`], for site contents that were already scanned. The
/// deployment points at exactly this asset, so staging it is enough to
/// apply the template.
pub fn declare_with_asset(stack: &mut Stack, id: &str, props: &SiteProps, asset: &Asset) -> SiteResult<()> {
    validate_domain_name(&props.domain_name)?;
    validate_bucket_name(&asset.staging_bucket)?;

    info!(stack = %stack.name(), "Declaring static site {} as {id}", props.domain_name);
    stack.add_construct(id, ConstructKind::Composite)?;
    let output_prefix = sanitize_logical_id(id);

    let zone = HostedZone::from_lookup(stack, &format!("{id}/Zone"), &props.domain_name)?;
    let site_domain = props.domain_name.clone();
    info!("Site: https://{site_domain}");

    let bucket = Bucket::new(stack, &format!("{id}/SiteBucket"), BucketProps {
        bucket_name: None,
        website: Some(PublicWebsite::default()),
        public_read_access: true,
        // a non-empty bucket is only deleted with auto_delete_objects
        removal_policy: RemovalPolicy::Destroy,
        auto_delete_objects: props.auto_delete_objects,
    })?;
    stack.add_output(format!("{output_prefix}Bucket"), Some("site content bucket".into()), bucket.bucket_name())?;

    let certificate = DnsValidatedCertificate::new(stack, &format!("{id}/Certificate"), DnsValidatedCertificateProps {
        domain_name: site_domain.clone(),
        subject_alternative_names: vec![],
        hosted_zone: &zone,
        region: Some(CLOUDFRONT_CERTIFICATE_REGION.to_string()),
    })?;
    info!("Certificate: {} in {}", certificate.logical_id, certificate.region);

    let distribution = WebDistribution::new(stack, &format!("{id}/SiteDistribution"), WebDistributionProps {
        origin_domain_name: bucket.domain_name(),
        origin_protocol_policy: OriginProtocolPolicy::HttpOnly,
        alias_configuration: Some(AliasConfiguration {
            acm_certificate_arn: certificate.certificate_arn(),
            names: vec![site_domain.clone()],
            ssl_method: SslMethod::Sni,
            security_policy: SecurityPolicyProtocol::TlsV1_1_2016,
        }),
        comment: Some(format!("static site {site_domain}")),
        ..Default::default()
    })?;
    stack.add_output(format!("{output_prefix}DistributionId"), Some("cloudfront distribution id".into()), distribution.distribution_id())?;

    AliasRecord::new(stack, &format!("{id}/SiteAliasRecord"), AliasRecordProps {
        zone: &zone,
        record_name: Some(site_domain),
        target: AliasTarget::cloudfront(&distribution),
        record_type: RecordType::A,
    })?;

    BucketDeployment::new(stack, &format!("{id}/DeployWithInvalidation"), BucketDeploymentProps {
        asset,
        destination_bucket: &bucket,
        distribution: Some(&distribution),
        distribution_paths: vec!["/*".into()],
        prune: true,
    })?;
    info!("Deploying {} files from {:?}", asset.files.len(), asset.source_dir);
    Ok(())
}
