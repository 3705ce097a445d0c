use super::*;
use crate::assets::Asset;

pub struct CfnBucketDeployment {
    pub service_token: Value,
    pub source_bucket_name: String,
    pub source_prefix: String,
    /// staged JSON array of the keys under `source_prefix`
    pub source_manifest_key: String,
    pub destination_bucket_name: Value,
    /// delete destination objects that are not in the manifest
    pub prune: bool,
    pub distribution_id: Option<Value>,
    pub distribution_paths: Vec<String>,
}

impl CfnResource for CfnBucketDeployment {
    fn type_string(&self) -> &'static str {
        "Custom::BucketDeployment"
    }
    fn properties(&self) -> SiteResult<Value> {
        let mut map = serde_json::Map::new();
        map.insert("ServiceToken".to_string(), self.service_token.clone());
        map.insert("SourceBucketName".to_string(), Value::String(self.source_bucket_name.clone()));
        map.insert("SourcePrefix".to_string(), Value::String(self.source_prefix.clone()));
        map.insert("SourceManifestKey".to_string(), Value::String(self.source_manifest_key.clone()));
        map.insert("DestinationBucketName".to_string(), self.destination_bucket_name.clone());
        map.insert("Prune".to_string(), Value::Bool(self.prune));
        if let Some(id) = &self.distribution_id {
            map.insert("DistributionId".to_string(), id.clone());
            map.insert("DistributionPaths".to_string(), json!(self.distribution_paths));
        }
        Ok(Value::Object(map))
    }
    fn validate(&self) -> Result<(), String> {
        if self.source_manifest_key.is_empty() {
            return Err("Deployment has no source manifest".into());
        }
        if self.distribution_id.is_none() && !self.distribution_paths.is_empty() {
            return Err("Distribution paths were given without a distribution to invalidate".into());
        }
        for path in self.distribution_paths.iter() {
            if !path.starts_with('/') {
                return Err(format!("Invalidation path {path:?} must start with '/'"));
            }
        }
        Ok(())
    }
}

// custom resource properties arrive as strings, so Prune is 'true' or 'false'
const DEPLOYMENT_HANDLER: &str = r#"
const { S3Client, GetObjectCommand, CopyObjectCommand, ListObjectsV2Command, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const { CloudFrontClient, CreateInvalidationCommand, waitUntilInvalidationCompleted } = require('@aws-sdk/client-cloudfront');
const response = require('cfn-response');
const copySource = (bucket, key) => [bucket, ...key.split('/')].map(encodeURIComponent).join('/');
async function prune(s3, Bucket, keep) {
  let ContinuationToken;
  do {
    const list = await s3.send(new ListObjectsV2Command({ Bucket, ContinuationToken }));
    const stale = (list.Contents || []).map((o) => o.Key).filter((k) => !keep.has(k));
    if (stale.length) {
      await s3.send(new DeleteObjectsCommand({ Bucket, Delete: { Objects: stale.map((Key) => ({ Key })), Quiet: true } }));
    }
    ContinuationToken = list.NextContinuationToken;
  } while (ContinuationToken);
}
exports.handler = async function(event, context) {
  const p = event.ResourceProperties;
  const id = event.PhysicalResourceId || `${event.LogicalResourceId}-${event.RequestId}`;
  try {
    if (event.RequestType !== 'Delete') {
      const s3 = new S3Client({});
      const manifest = await s3.send(new GetObjectCommand({ Bucket: p.SourceBucketName, Key: p.SourceManifestKey }));
      const keys = JSON.parse(await manifest.Body.transformToString());
      for (let i = 0; i < keys.length; i += 16) {
        await Promise.all(keys.slice(i, i + 16).map((key) => s3.send(new CopyObjectCommand({
          Bucket: p.DestinationBucketName,
          Key: key,
          CopySource: copySource(p.SourceBucketName, p.SourcePrefix + key),
        }))));
      }
      if (String(p.Prune) === 'true') {
        await prune(s3, p.DestinationBucketName, new Set(keys));
      }
      const paths = p.DistributionPaths || [];
      if (p.DistributionId && paths.length) {
        const cf = new CloudFrontClient({});
        const { Invalidation } = await cf.send(new CreateInvalidationCommand({
          DistributionId: p.DistributionId,
          InvalidationBatch: { CallerReference: event.RequestId, Paths: { Quantity: paths.length, Items: paths } },
        }));
        const maxWaitTime = Math.max(30, Math.floor(context.getRemainingTimeInMillis() / 1000) - 30);
        await waitUntilInvalidationCompleted({ client: cf, maxWaitTime }, { DistributionId: p.DistributionId, Id: Invalidation.Id });
      }
    }
    await response.send(event, context, response.SUCCESS, {}, id);
  } catch (err) {
    console.log(err);
    await response.send(event, context, response.FAILED, {}, id);
  }
};
"#;

pub struct BucketDeploymentProps<'a> {
    pub asset: &'a Asset,
    pub destination_bucket: &'a Bucket,
    /// when set, the paths below are invalidated after every copy
    pub distribution: Option<&'a WebDistribution>,
    pub distribution_paths: Vec<String>,
    /// remove objects from the destination that are not part of the asset
    pub prune: bool,
}

/// Copies a staged asset into a bucket and invalidates the distribution
/// in front of it. The custom resource updates whenever the asset hash
/// changes, since the hash is part of its source prefix.
#[derive(Debug, Clone)]
pub struct BucketDeployment {
    pub logical_id: String,
}

impl BucketDeployment {
    pub fn new(stack: &mut Stack, id: &str, props: BucketDeploymentProps) -> SiteResult<Self> {
        let logical_id = sanitize_logical_id(id);
        let dest = &props.destination_bucket.logical_id;
        let staging = &props.asset.staging_bucket;
        if props.asset.files.is_empty() {
            return Err(SiteError::Validation { resource: logical_id, reason: "Deployment has no source objects".into() });
        }
        let mut deployment = CfnBucketDeployment {
            service_token: Value::Null,
            source_bucket_name: staging.clone(),
            source_prefix: props.asset.prefix(),
            source_manifest_key: props.asset.manifest_key(),
            destination_bucket_name: props.destination_bucket.bucket_name(),
            prune: props.prune,
            distribution_id: props.distribution.map(|d| d.distribution_id()),
            distribution_paths: props.distribution_paths,
        };
        if let Err(reason) = deployment.validate() {
            return Err(SiteError::Validation { resource: logical_id, reason });
        }

        let mut statements = vec![
            PolicyStatement::allow(&["s3:GetObject"], vec![json!(format!("arn:aws:s3:::{staging}/*"))]),
            PolicyStatement::allow(&["s3:PutObject"], vec![sub(format!("arn:aws:s3:::${{{dest}}}/*"))]),
        ];
        if props.prune {
            statements.push(PolicyStatement::allow(&["s3:ListBucket"], vec![props.destination_bucket.arn()]));
            statements.push(PolicyStatement::allow(&["s3:DeleteObject"], vec![sub(format!("arn:aws:s3:::${{{dest}}}/*"))]));
        }
        if let Some(distribution) = props.distribution {
            statements.push(PolicyStatement::allow(
                &["cloudfront:CreateInvalidation", "cloudfront:GetInvalidation"],
                vec![sub(format!("arn:aws:cloudfront::${{AWS::AccountId}}:distribution/${{{}}}", distribution.logical_id))],
            ));
        }
        stack.add_construct(id, ConstructKind::Deployment)?;
        let handler = InlineFunction::new(stack, id, &format!("{logical_id}Handler"), InlineFunctionProps {
            description: format!("copies site contents for {logical_id}"),
            code: DEPLOYMENT_HANDLER,
            timeout: 900,
            memory_size: 512,
            statements,
        })?;
        deployment.service_token = handler.service_token();
        stack.add_cfn_resource(id, &logical_id, &deployment)?;
        Ok(Self { logical_id })
    }
}
