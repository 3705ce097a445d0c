use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Value,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
    #[serde(rename = "EvaluateTargetHealth")]
    pub evaluate_target_health: bool,
}

impl AliasTarget {
    /// points at the distribution's edge hostname
    pub fn cloudfront(distribution: &WebDistribution) -> Self {
        Self {
            dns_name: distribution.domain_name(),
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            evaluate_target_health: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRecordSet {
    pub alias_target: AliasTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub hosted_zone_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: RecordType,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

pub struct AliasRecordProps<'a> {
    pub zone: &'a HostedZone,
    /// fully qualified record name, eg: www.example.com.
    /// Defaults to the zone apex.
    pub record_name: Option<String>,
    pub target: AliasTarget,
    pub record_type: RecordType,
}

#[derive(Debug, Clone)]
pub struct AliasRecord {
    pub logical_id: String,
    /// always ends in `.`
    pub record_name: String,
}

impl AliasRecord {
    pub fn new(stack: &mut Stack, id: &str, props: AliasRecordProps) -> SiteResult<Self> {
        let logical_id = sanitize_logical_id(id);
        let mut record_name = match props.record_name {
            Some(name) => name,
            None => props.zone.zone_name.clone(),
        };
        validate_domain_name(record_name.trim_end_matches('.'))?;
        if !props.zone.contains(&record_name) {
            return Err(SiteError::invalid_domain(
                record_name.as_str(),
                format!("Record is not part of hosted zone {}", props.zone.zone_name),
            ));
        }
        if !record_name.ends_with('.') {
            record_name.push('.'); // record names must end in .
        }
        let record = CfnRecordSet {
            alias_target: props.target,
            comment: Some(format!("alias for {record_name}")),
            hosted_zone_id: props.zone.hosted_zone_id.clone(),
            name: record_name.clone(),
            record_type: props.record_type,
        };
        stack.add_construct(id, ConstructKind::AliasRecord)?;
        stack.add_cfn_resource(id, &logical_id, &record)?;
        Ok(Self { logical_id, record_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> HostedZone {
        HostedZone { construct_id: "Zone".into(), hosted_zone_id: "Z1".into(), zone_name: "example.com.".into() }
    }

    fn stack_with_cdn() -> (Stack, WebDistribution) {
        let mut s = Stack::new("dns", StackEnv::default()).unwrap();
        s.add_construct("Origin", ConstructKind::Bucket).unwrap();
        s.add_resource("Origin", "Origin", TemplateResource { ty: "AWS::S3::Bucket".into(), properties: json!({}), ..Default::default() }).unwrap();
        let d = WebDistribution::new(&mut s, "Cdn", WebDistributionProps {
            origin_domain_name: get_att("Origin", "DomainName"),
            ..Default::default()
        }).unwrap();
        (s, d)
    }

    #[test]
    fn apex_alias_targets_distribution() {
        let (mut s, d) = stack_with_cdn();
        let zone = zone();
        let r = AliasRecord::new(&mut s, "Alias", AliasRecordProps {
            zone: &zone,
            record_name: Some("example.com".into()),
            target: AliasTarget::cloudfront(&d),
            record_type: RecordType::A,
        }).unwrap();
        assert_eq!(r.record_name, "example.com.");
        let props = &s.resource("Alias").unwrap().properties;
        assert_eq!(props["Type"], json!("A"));
        assert_eq!(props["HostedZoneId"], json!("Z1"));
        assert_eq!(props["AliasTarget"]["DNSName"], get_att("Cdn", "DomainName"));
        assert_eq!(props["AliasTarget"]["HostedZoneId"], json!("Z2FDTNDATAQYW2"));
        assert!(s.dependencies().contains(&("Alias".to_string(), "Cdn".to_string())));
    }

    #[test]
    fn record_outside_zone_is_rejected() {
        let (mut s, d) = stack_with_cdn();
        let zone = zone();
        let err = AliasRecord::new(&mut s, "Alias", AliasRecordProps {
            zone: &zone,
            record_name: Some("example.org".into()),
            target: AliasTarget::cloudfront(&d),
            record_type: RecordType::A,
        });
        assert!(err.is_err());
    }
}
