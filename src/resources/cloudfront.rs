use super::*;

/// hosted zone id used by every alias record that targets a cloudfront distribution.
/// see: https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/aws-properties-route53-aliastarget.html#cfn-route53-aliastarget-hostedzoneid
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OriginProtocolPolicy {
    #[serde(rename = "http-only")]
    HttpOnly,
    #[serde(rename = "match-viewer")]
    MatchViewer,
    #[serde(rename = "https-only")]
    HttpsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewerProtocolPolicy {
    #[serde(rename = "allow-all")]
    AllowAll,
    #[serde(rename = "redirect-to-https")]
    RedirectToHttps,
    #[serde(rename = "https-only")]
    HttpsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SslMethod {
    #[serde(rename = "sni-only")]
    Sni,
    #[serde(rename = "vip")]
    Vip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityPolicyProtocol {
    #[serde(rename = "SSLv3")]
    SslV3,
    #[serde(rename = "TLSv1")]
    TlsV1,
    #[serde(rename = "TLSv1_2016")]
    TlsV1_2016,
    #[serde(rename = "TLSv1.1_2016")]
    TlsV1_1_2016,
    #[serde(rename = "TLSv1.2_2018")]
    TlsV1_2_2018,
    #[serde(rename = "TLSv1.2_2019")]
    TlsV1_2_2019,
    #[serde(rename = "TLSv1.2_2021")]
    TlsV1_2_2021,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceClass {
    #[serde(rename = "PriceClass_100")]
    PriceClass100,
    #[serde(rename = "PriceClass_200")]
    PriceClass200,
    #[serde(rename = "PriceClass_All")]
    PriceClassAll,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomOriginConfig {
    #[serde(rename = "HTTPPort")]
    pub http_port: u16,
    #[serde(rename = "HTTPSPort")]
    pub https_port: u16,
    #[serde(rename = "OriginProtocolPolicy")]
    pub origin_protocol_policy: OriginProtocolPolicy,
    #[serde(rename = "OriginSSLProtocols")]
    pub origin_ssl_protocols: Vec<String>,
    #[serde(rename = "OriginReadTimeout")]
    pub origin_read_timeout: u32,
    #[serde(rename = "OriginKeepaliveTimeout")]
    pub origin_keepalive_timeout: u32,
}

impl Default for CustomOriginConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            https_port: 443,
            origin_protocol_policy: OriginProtocolPolicy::HttpOnly,
            origin_ssl_protocols: vec!["TLSv1.2".to_string()],
            origin_read_timeout: 30,
            origin_keepalive_timeout: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub domain_name: Value,
    pub id: String,
    pub custom_origin_config: CustomOriginConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cookies {
    pub forward: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForwardedValues {
    pub query_string: bool,
    pub cookies: Cookies,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub compress: bool,
    pub forwarded_values: ForwardedValues,
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

impl DefaultCacheBehavior {
    /// GET/HEAD only, compressed, nothing forwarded to the origin.
    pub fn static_content(target_origin_id: &str, viewer_protocol_policy: ViewerProtocolPolicy) -> Self {
        Self {
            allowed_methods: vec!["GET".into(), "HEAD".into()],
            cached_methods: vec!["GET".into(), "HEAD".into()],
            compress: true,
            forwarded_values: ForwardedValues { query_string: false, cookies: Cookies { forward: "none".into() } },
            target_origin_id: target_origin_id.to_string(),
            viewer_protocol_policy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: Value,
    pub ssl_support_method: SslMethod,
    pub minimum_protocol_version: SecurityPolicyProtocol,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    pub enabled: bool,
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    pub origins: Vec<Origin>,
    pub price_class: PriceClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDistribution {
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("Must provide at least one origin to cloudfront distribution".into());
        }
        if config.origins.iter().any(|o| o.domain_name.is_null()) {
            return Err("cloudfront distribution origin domain_name is required".into());
        }
        if !config.origins.iter().any(|o| o.id == config.default_cache_behavior.target_origin_id) {
            return Err(format!("default behavior targets unknown origin {}", config.default_cache_behavior.target_origin_id));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err("A certificate is required when aliases are set".into());
        }
        for alias in config.aliases.iter() {
            validate_certificate_domain(alias).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// the certificate the distribution terminates TLS with for its aliases
#[derive(Debug, Clone)]
pub struct AliasConfiguration {
    pub acm_certificate_arn: Value,
    /// bare hostnames, eg: www.example.com. No scheme.
    pub names: Vec<String>,
    pub ssl_method: SslMethod,
    pub security_policy: SecurityPolicyProtocol,
}

#[derive(Debug, Clone)]
pub struct WebDistributionProps {
    /// domain name of the single origin. For a bucket this is its DomainName
    /// attribute, or its website domain for website endpoints.
    pub origin_domain_name: Value,
    /// http-only by default since s3 website endpoints do not speak https.
    pub origin_protocol_policy: OriginProtocolPolicy,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub alias_configuration: Option<AliasConfiguration>,
    pub default_root_object: Option<String>,
    pub price_class: PriceClass,
    pub comment: Option<String>,
}

impl Default for WebDistributionProps {
    fn default() -> Self {
        Self {
            origin_domain_name: Value::Null,
            origin_protocol_policy: OriginProtocolPolicy::HttpOnly,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            alias_configuration: None,
            default_root_object: Some("index.html".into()),
            price_class: PriceClass::PriceClass100,
            comment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebDistribution {
    pub logical_id: String,
}

impl WebDistribution {
    pub const DEFAULT_ORIGIN_ID: &'static str = "origin1";

    pub fn new(stack: &mut Stack, id: &str, props: WebDistributionProps) -> SiteResult<Self> {
        let logical_id = sanitize_logical_id(id);
        let origin = Origin {
            domain_name: props.origin_domain_name,
            id: Self::DEFAULT_ORIGIN_ID.into(),
            custom_origin_config: CustomOriginConfig {
                origin_protocol_policy: props.origin_protocol_policy,
                ..Default::default()
            },
        };
        let (aliases, viewer_certificate) = match props.alias_configuration {
            Some(alias) => (
                alias.names,
                Some(ViewerCertificate {
                    acm_certificate_arn: alias.acm_certificate_arn,
                    ssl_support_method: alias.ssl_method,
                    minimum_protocol_version: alias.security_policy,
                }),
            ),
            None => (vec![], None),
        };
        let distribution = CfnDistribution {
            distribution_config: DistributionConfig {
                aliases,
                comment: props.comment,
                default_cache_behavior: DefaultCacheBehavior::static_content(Self::DEFAULT_ORIGIN_ID, props.viewer_protocol_policy),
                default_root_object: props.default_root_object,
                enabled: true,
                http_version: "http2".into(),
                ipv6_enabled: true,
                origins: vec![origin],
                price_class: props.price_class,
                viewer_certificate,
            },
        };
        if let Err(reason) = distribution.validate() {
            return Err(SiteError::Validation { resource: logical_id, reason });
        }
        stack.add_construct(id, ConstructKind::Distribution)?;
        stack.add_cfn_resource(id, &logical_id, &distribution)?;
        Ok(Self { logical_id })
    }

    pub fn distribution_id(&self) -> Value {
        get_ref(&self.logical_id)
    }

    /// the `*.cloudfront.net` edge hostname
    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_id, "DomainName")
    }
}
