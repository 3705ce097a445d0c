use serde_json::{json, Value};
use static_site::context::{hosted_zone_context_key, HostedZoneAttributes};
use static_site::deploy::{fits_inline, MAX_TEMPLATE_BODY_LEN};
use static_site::{build_site_stack, declare, Context, SiteConfig, SiteError, SiteProps, Stack, StackEnv};

const ACCOUNT: &str = "111122223333";

fn context_for(region: &str, domain: &str) -> Context {
    let mut ctx = Context::new();
    let key = hosted_zone_context_key(ACCOUNT, region, domain);
    ctx.set_hosted_zone(key, &HostedZoneAttributes {
        hosted_zone_id: "Z0EXAMPLE".into(),
        zone_name: format!("{domain}."),
    }).unwrap();
    ctx
}

fn site_contents() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
    std::fs::write(dir.path().join("error.html"), "<h1>error</h1>").unwrap();
    dir
}

fn synth_json(region: &str, contents: &tempfile::TempDir) -> Value {
    let mut stack = Stack::new("SiteStack", StackEnv::new(ACCOUNT, region))
        .unwrap()
        .with_context(context_for(region, "example.com"));
    let props = SiteProps { site_contents: contents.path().to_path_buf(), ..SiteProps::new("example.com") };
    declare(&mut stack, "StaticSite", &props).unwrap();
    serde_json::to_value(stack.synth()).unwrap()
}

fn resources_of_type<'a>(template: &'a Value, ty: &str) -> Vec<(&'a String, &'a Value)> {
    template["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == json!(ty))
        .collect()
}

#[test]
fn bucket_is_a_website_with_index_and_error_documents() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let bucket = t.pointer("/Resources/StaticSiteSiteBucket").unwrap();
    assert_eq!(bucket["Type"], json!("AWS::S3::Bucket"));
    assert_eq!(bucket.pointer("/Properties/WebsiteConfiguration/IndexDocument"), Some(&json!("index.html")));
    assert_eq!(bucket.pointer("/Properties/WebsiteConfiguration/ErrorDocument"), Some(&json!("error.html")));
}

#[test]
fn bucket_is_destroyed_with_the_stack() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let bucket = t.pointer("/Resources/StaticSiteSiteBucket").unwrap();
    assert_eq!(bucket["DeletionPolicy"], json!("Delete"));
    assert_eq!(bucket["UpdateReplacePolicy"], json!("Delete"));
}

#[test]
fn bucket_is_publicly_readable() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let statement = t.pointer("/Resources/StaticSiteSiteBucketPolicy/Properties/PolicyDocument/Statement/0").unwrap();
    assert_eq!(statement["Principal"], json!("*"));
    assert_eq!(statement["Action"], json!("s3:GetObject"));
}

#[test]
fn certificate_is_always_in_us_east_1() {
    for region in ["eu-west-1", "ap-southeast-2", "us-east-1"] {
        let contents = site_contents();
        let t = synth_json(region, &contents);
        let certs = resources_of_type(&t, "Custom::DNSValidatedCertificate");
        assert_eq!(certs.len(), 1);
        let (_, cert) = certs[0];
        assert_eq!(cert.pointer("/Properties/Region"), Some(&json!("us-east-1")));
        assert_eq!(cert.pointer("/Properties/DomainName"), Some(&json!("example.com")));
        assert_eq!(cert.pointer("/Properties/HostedZoneId"), Some(&json!("Z0EXAMPLE")));
    }
}

#[test]
fn distribution_uses_bucket_origin_and_certificate() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let config = t.pointer("/Resources/StaticSiteSiteDistribution/Properties/DistributionConfig").unwrap();
    assert_eq!(config["Aliases"], json!(["example.com"]));
    assert_eq!(config["Origins"].as_array().unwrap().len(), 1);
    assert_eq!(config.pointer("/Origins/0/DomainName"), Some(&json!({ "Fn::GetAtt": ["StaticSiteSiteBucket", "DomainName"] })));
    assert_eq!(config.pointer("/Origins/0/CustomOriginConfig/OriginProtocolPolicy"), Some(&json!("http-only")));
    assert_eq!(config.pointer("/ViewerCertificate/AcmCertificateArn"), Some(&json!({ "Fn::GetAtt": ["StaticSiteCertificate", "Arn"] })));
    assert_eq!(config.pointer("/ViewerCertificate/SslSupportMethod"), Some(&json!("sni-only")));
    assert_eq!(config.pointer("/ViewerCertificate/MinimumProtocolVersion"), Some(&json!("TLSv1.1_2016")));
    assert_eq!(config.pointer("/DefaultCacheBehavior/TargetOriginId"), Some(&json!("origin1")));
}

#[test]
fn alias_record_targets_the_distribution_not_the_bucket() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let records = resources_of_type(&t, "AWS::Route53::RecordSet");
    assert_eq!(records.len(), 1);
    let (_, record) = records[0];
    assert_eq!(record.pointer("/Properties/Name"), Some(&json!("example.com.")));
    assert_eq!(record.pointer("/Properties/Type"), Some(&json!("A")));
    assert_eq!(
        record.pointer("/Properties/AliasTarget/DNSName"),
        Some(&json!({ "Fn::GetAtt": ["StaticSiteSiteDistribution", "DomainName"] }))
    );
    assert_eq!(record.pointer("/Properties/AliasTarget/HostedZoneId"), Some(&json!("Z2FDTNDATAQYW2")));
}

#[test]
fn deployment_invalidates_everything() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    let deployments = resources_of_type(&t, "Custom::BucketDeployment");
    assert_eq!(deployments.len(), 1);
    let (_, deployment) = deployments[0];
    assert_eq!(deployment.pointer("/Properties/DistributionPaths"), Some(&json!(["/*"])));
    assert_eq!(deployment.pointer("/Properties/DistributionId"), Some(&json!({ "Ref": "StaticSiteSiteDistribution" })));
    assert_eq!(deployment.pointer("/Properties/DestinationBucketName"), Some(&json!({ "Ref": "StaticSiteSiteBucket" })));
    assert_eq!(deployment.pointer("/Properties/Prune"), Some(&json!(true)));
    assert!(deployment.pointer("/Properties/SourceObjectKeys").is_none());
}

#[test]
fn thousand_file_site_fits_an_inline_template() {
    let contents = site_contents();
    for n in 0..1000 {
        let dir = contents.path().join(format!("posts/2024/article-{n:04}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "x").unwrap();
    }
    let mut stack = Stack::new("SiteStack", StackEnv::new(ACCOUNT, "eu-west-1"))
        .unwrap()
        .with_context(context_for("eu-west-1", "example.com"));
    let props = SiteProps { site_contents: contents.path().to_path_buf(), ..SiteProps::new("example.com") };
    declare(&mut stack, "StaticSite", &props).unwrap();
    let body = stack.synth().to_json_pretty().unwrap();
    assert!(fits_inline(&body), "template is {} bytes", body.len());
    assert!(body.len() <= MAX_TEMPLATE_BODY_LEN);
}

#[test]
fn outputs_expose_bucket_and_distribution() {
    let contents = site_contents();
    let t = synth_json("eu-west-1", &contents);
    assert_eq!(t.pointer("/Outputs/StaticSiteBucket/Value"), Some(&json!({ "Ref": "StaticSiteSiteBucket" })));
    assert_eq!(t.pointer("/Outputs/StaticSiteDistributionId/Value"), Some(&json!({ "Ref": "StaticSiteSiteDistribution" })));
}

#[test]
fn declaring_twice_is_identical() {
    let contents = site_contents();
    let a = synth_json("eu-west-1", &contents);
    let b = synth_json("eu-west-1", &contents);
    assert_eq!(a, b);
    assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
}

#[test]
fn same_id_twice_in_one_stack_is_rejected() {
    let contents = site_contents();
    let mut stack = Stack::new("SiteStack", StackEnv::new(ACCOUNT, "eu-west-1"))
        .unwrap()
        .with_context(context_for("eu-west-1", "example.com"));
    let props = SiteProps { site_contents: contents.path().to_path_buf(), ..SiteProps::new("example.com") };
    declare(&mut stack, "StaticSite", &props).unwrap();
    let err = declare(&mut stack, "StaticSite", &props).unwrap_err();
    assert!(matches!(err, SiteError::DuplicateConstruct(_)));
}

#[test]
fn every_reference_points_backwards() {
    let contents = site_contents();
    let mut stack = Stack::new("SiteStack", StackEnv::new(ACCOUNT, "eu-west-1"))
        .unwrap()
        .with_context(context_for("eu-west-1", "example.com"));
    let props = SiteProps { site_contents: contents.path().to_path_buf(), ..SiteProps::new("example.com") };
    declare(&mut stack, "StaticSite", &props).unwrap();
    let order = stack.apply_order();
    let position = |id: &str| order.iter().position(|o| *o == id).unwrap();
    for (from, to) in stack.dependencies() {
        assert!(position(to.as_str()) < position(from.as_str()), "{from} depends on {to}, declared after it");
    }
    assert!(position("StaticSiteCertificate") < position("StaticSiteSiteDistribution"));
    assert!(position("StaticSiteSiteDistribution") < position("StaticSiteSiteAliasRecord"));
    assert!(position("StaticSiteSiteDistribution") < position("StaticSiteDeployWithInvalidation"));
}

#[test]
fn content_change_changes_the_deployment_only() {
    let contents = site_contents();
    let before = synth_json("eu-west-1", &contents);
    std::fs::write(contents.path().join("index.html"), "<h1>new</h1>").unwrap();
    let after = synth_json("eu-west-1", &contents);
    let path = "/Resources/StaticSiteDeployWithInvalidation/Properties/SourcePrefix";
    assert_ne!(before.pointer(path), after.pointer(path));
    assert_eq!(before["Resources"]["StaticSiteSiteDistribution"], after["Resources"]["StaticSiteSiteDistribution"]);
}

#[test]
fn config_builds_the_same_stack() {
    let contents = site_contents();
    let config = SiteConfig {
        domain_name: "example.com".into(),
        stack_name: "SiteStack".into(),
        account: Some(ACCOUNT.into()),
        region: Some("eu-west-1".into()),
        site_contents: contents.path().to_path_buf(),
        ..Default::default()
    };
    let (stack, asset) = build_site_stack(&config, context_for("eu-west-1", "example.com")).unwrap();
    assert_eq!(asset.object_keys(), vec!["error.html", "index.html"]);
    let mut from_config = serde_json::to_value(stack.synth()).unwrap();
    from_config.as_object_mut().unwrap().remove("Description");
    assert_eq!(from_config, synth_json("eu-west-1", &contents));
}

#[test]
fn unknown_zone_is_a_configuration_error() {
    let contents = site_contents();
    let mut stack = Stack::new("SiteStack", StackEnv::new(ACCOUNT, "eu-west-1"))
        .unwrap()
        .with_context(context_for("eu-west-1", "example.com"));
    let props = SiteProps { site_contents: contents.path().to_path_buf(), ..SiteProps::new("example.org") };
    assert!(matches!(declare(&mut stack, "StaticSite", &props), Err(SiteError::MissingContext { .. })));
}
