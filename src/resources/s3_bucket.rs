use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicWebsite {
    pub index_document: String,
    pub error_document: String,
}

impl Default for PublicWebsite {
    fn default() -> Self {
        Self {
            index_document: "index.html".into(),
            error_document: "error.html".into()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    /// physical name of the bucket. Must be globally unique.
    /// Leave as None to have cloudformation generate a name
    /// from the logical id.
    pub bucket_name: Option<String>,
    /// turns on website hosting for the bucket.
    pub website: Option<PublicWebsite>,
    /// if set, every object in the bucket is readable by anyone.
    /// we create a bucket policy granting s3:GetObject to `*`
    /// and relax the public access block so that policy is allowed.
    pub public_read_access: bool,
    /// Retain by default, like cloudformation itself.
    pub removal_policy: RemovalPolicy,
    /// s3 buckets in cloudformation cannot be deleted if they contain objects.
    /// setting this adds a custom resource backed by a lambda function that
    /// empties the bucket when the stack deletes it.
    /// Only meaningful with RemovalPolicy::Destroy.
    pub auto_delete_objects: bool,
}

pub fn validate_bucket_name(bucket_name: &str) -> SiteResult<()> {
    let invalid = |reason: &str| SiteError::config(format!("Invalid bucket name {:?}\n{reason}", bucket_name));
    if bucket_name.len() > 63 || bucket_name.len() < 3 {
        return Err(invalid("Must be between 3 and 63 characters"));
    }
    let valid_char_check = |c: char| -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
    };
    if !bucket_name.chars().all(valid_char_check) {
        return Err(invalid("May only contain lowercase letters, numbers, dots, and dashes"));
    }
    let first_ok = bucket_name.chars().next().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
    let last_ok = bucket_name.chars().last().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
    if !first_ok || !last_ok {
        return Err(invalid("First and last character must be either lowercase letter, or number"));
    }
    if bucket_name.contains("..") {
        return Err(invalid("May not contain two consecutive dots"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    pub index_document: String,
    pub error_document: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    /// ACLs stay blocked, bucket policies may grant public access.
    pub fn block_acls_only() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: false,
            ignore_public_acls: true,
            restrict_public_buckets: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
    fn validate(&self) -> Result<(), String> {
        match &self.bucket_name {
            Some(name) => validate_bucket_name(name).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucketPolicy {
    pub bucket: Value,
    pub policy_document: Value,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

pub struct AutoDeleteObjects {
    pub lambda_logical_id: String,
    pub bucket_logical_id: String,
}

impl CfnResource for AutoDeleteObjects {
    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }
    fn properties(&self) -> SiteResult<Value> {
        let mut map = serde_json::Map::new();
        map.insert("ServiceToken".to_string(), get_att(&self.lambda_logical_id, "Arn"));
        map.insert("BucketName".to_string(), get_ref(&self.bucket_logical_id));
        Ok(Value::Object(map))
    }
}

const AUTO_DELETE_HANDLER: &str = r#"
const { S3Client, ListObjectsV2Command, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(Bucket) {
  let ContinuationToken;
  do {
    const page = await s3.send(new ListObjectsV2Command({ Bucket, ContinuationToken }));
    const Objects = (page.Contents || []).map((o) => ({ Key: o.Key }));
    if (Objects.length) {
      await s3.send(new DeleteObjectsCommand({ Bucket, Delete: { Objects } }));
    }
    ContinuationToken = page.NextContinuationToken;
  } while (ContinuationToken);
}
exports.handler = async function(event, context) {
  let status = response.SUCCESS;
  if (event.RequestType === 'Delete') {
    try {
      await emptyBucket(event.ResourceProperties.BucketName);
    } catch (err) {
      console.log(`Error emptying bucket: ${err}`);
      status = response.FAILED;
    }
  }
  await response.send(event, context, status, {}, event.PhysicalResourceId || event.LogicalResourceId);
};
"#;

#[derive(Debug, Clone)]
pub struct Bucket {
    pub logical_id: String,
    pub policy_logical_id: Option<String>,
    pub removal_policy: RemovalPolicy,
}

impl Bucket {
    pub fn new(stack: &mut Stack, id: &str, props: BucketProps) -> SiteResult<Self> {
        let logical_id = sanitize_logical_id(id);
        if props.auto_delete_objects && props.removal_policy != RemovalPolicy::Destroy {
            return Err(SiteError::config(format!(
                "Bucket {id}: auto_delete_objects requires RemovalPolicy::Destroy"
            )));
        }

        let bucket = CfnBucket {
            bucket_name: props.bucket_name.clone(),
            website_configuration: props.website.as_ref().map(|w| WebsiteConfiguration {
                index_document: w.index_document.clone(),
                error_document: w.error_document.clone(),
            }),
            public_access_block_configuration: if props.public_read_access {
                Some(PublicAccessBlockConfiguration::block_acls_only())
            } else {
                None
            },
        };
        if let Err(reason) = bucket.validate() {
            return Err(SiteError::Validation { resource: logical_id, reason });
        }
        stack.add_construct(id, ConstructKind::Bucket)?;
        let resource = TemplateResource::from_cfn(&bucket)?.with_removal_policy(props.removal_policy);
        stack.add_resource(id, &logical_id, resource)?;

        let mut policy_logical_id = None;
        if props.public_read_access {
            let bucket_policy = CfnBucketPolicy {
                bucket: get_ref(&logical_id),
                policy_document: create_policy_doc(&[
                    PolicyStatement::allow(&["s3:GetObject"], vec![sub(format!("arn:aws:s3:::${{{logical_id}}}/*"))])
                        .with_principal(json!("*")),
                ]),
            };
            let logical_policy_name = format!("{logical_id}Policy");
            stack.add_cfn_resource(id, &logical_policy_name, &bucket_policy)?;
            policy_logical_id = Some(logical_policy_name);
        }

        if props.auto_delete_objects {
            let handler = InlineFunction::new(stack, id, &format!("{logical_id}AutoDeleteObjects"), InlineFunctionProps {
                description: format!("empties bucket {logical_id} before it is deleted"),
                code: AUTO_DELETE_HANDLER,
                timeout: 900,
                memory_size: 128,
                statements: vec![PolicyStatement::allow(
                    &["s3:ListBucket", "s3:DeleteObject"],
                    vec![get_att(&logical_id, "Arn"), sub(format!("arn:aws:s3:::${{{logical_id}}}/*"))],
                )],
            })?;
            let cleanup = AutoDeleteObjects {
                lambda_logical_id: handler.function_logical_id.clone(),
                bucket_logical_id: logical_id.clone(),
            };
            let mut resource = TemplateResource::from_cfn(&cleanup)?;
            // the policy must outlive the cleanup so objects can still be
            // listed while the stack is being torn down
            if let Some(policy) = &policy_logical_id {
                resource = resource.depends_on(policy.clone());
            }
            stack.add_resource(id, format!("{logical_id}AutoDeleteObjectsResource"), resource)?;
        }

        Ok(Self { logical_id, policy_logical_id, removal_policy: props.removal_policy })
    }

    pub fn bucket_name(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    /// `<bucket>.s3.amazonaws.com`
    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_id, "DomainName")
    }

    pub fn website_url(&self) -> Value {
        get_att(&self.logical_id, "WebsiteURL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Stack {
        Stack::new("bucket-stack", StackEnv::default()).unwrap()
    }

    #[test]
    fn private_bucket_retains_by_default() {
        let mut s = stack();
        let b = Bucket::new(&mut s, "Plain", BucketProps::default()).unwrap();
        let res = s.resource(&b.logical_id).unwrap();
        assert_eq!(res.deletion_policy.as_deref(), Some("Retain"));
        assert!(res.properties.get("WebsiteConfiguration").is_none());
        assert!(b.policy_logical_id.is_none());
        assert_eq!(s.synth().resources.len(), 1);
    }

    #[test]
    fn public_website_bucket_gets_policy() {
        let mut s = stack();
        let b = Bucket::new(&mut s, "Site/Bucket", BucketProps {
            website: Some(PublicWebsite::default()),
            public_read_access: true,
            removal_policy: RemovalPolicy::Destroy,
            ..Default::default()
        }).unwrap();
        assert_eq!(b.logical_id, "SiteBucket");
        let res = s.resource("SiteBucket").unwrap();
        assert_eq!(res.properties["WebsiteConfiguration"]["ErrorDocument"], json!("error.html"));
        assert_eq!(res.properties["PublicAccessBlockConfiguration"]["BlockPublicPolicy"], json!(false));
        let policy = s.resource("SiteBucketPolicy").unwrap();
        assert_eq!(policy.properties["Bucket"], get_ref("SiteBucket"));
        assert_eq!(policy.properties["PolicyDocument"]["Statement"][0]["Resource"], sub("arn:aws:s3:::${SiteBucket}/*"));
    }

    #[test]
    fn auto_delete_adds_cleanup_resources() {
        let mut s = stack();
        Bucket::new(&mut s, "Content", BucketProps {
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            ..Default::default()
        }).unwrap();
        let t = s.synth();
        assert_eq!(t.resources_of_type("Custom::S3AutoDeleteObjects").count(), 1);
        assert_eq!(t.resources_of_type("AWS::Lambda::Function").count(), 1);
        assert_eq!(t.resources_of_type("AWS::IAM::Role").count(), 1);
    }

    #[test]
    fn auto_delete_requires_destroy() {
        let mut s = stack();
        let err = Bucket::new(&mut s, "Content", BucketProps { auto_delete_objects: true, ..Default::default() });
        assert!(err.is_err());
    }

    #[test]
    fn bucket_names() {
        assert!(validate_bucket_name("my-site-bucket").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Upper").is_err());
        assert!(validate_bucket_name("-dash").is_err());
        let err = validate_bucket_name("something..exact").unwrap_err();
        assert!(err.to_string().contains("May not contain two consecutive dots"));
    }
}
