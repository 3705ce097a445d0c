use super::*;
use crate::regions::{verify_region, CLOUDFRONT_CERTIFICATE_REGION};

/// Checks a certificate domain: fully qualified, at most one wildcard, and
/// if present the wildcard is the first label, eg: `*.example.com`.
pub fn validate_certificate_domain(domain_name: &str) -> SiteResult<()> {
    if domain_name.contains('*') {
        if domain_name.matches('*').count() > 1 {
            return Err(SiteError::invalid_domain(domain_name, "Must only provide 1 wildcard"));
        }
        return match domain_name.strip_prefix("*.") {
            Some(rest) => validate_domain_name(rest),
            None => Err(SiteError::invalid_domain(
                domain_name,
                "If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\"",
            )),
        };
    }
    validate_domain_name(domain_name)
}

pub struct DnsValidatedCertificateProps<'a> {
    /// the domain you're requesting a certificate for.
    /// Examples of valid values:
    /// - www.mysite.com
    /// - mysite.com
    /// - *.mysite.com
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    /// validation records are written into this zone, so every name on the
    /// certificate must belong to it.
    pub hosted_zone: &'a HostedZone,
    /// region the certificate is issued in. Defaults to us-east-1,
    /// the only region cloudfront reads certificates from.
    pub region: Option<String>,
}

pub struct CfnDnsValidatedCertificate {
    pub service_token: Value,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub hosted_zone_id: String,
    pub region: String,
}

impl CfnResource for CfnDnsValidatedCertificate {
    fn type_string(&self) -> &'static str {
        "Custom::DNSValidatedCertificate"
    }
    fn properties(&self) -> SiteResult<Value> {
        let mut map = serde_json::Map::new();
        map.insert("ServiceToken".to_string(), self.service_token.clone());
        map.insert("DomainName".to_string(), Value::String(self.domain_name.clone()));
        if !self.subject_alternative_names.is_empty() {
            map.insert("SubjectAlternativeNames".to_string(), json!(self.subject_alternative_names));
        }
        map.insert("HostedZoneId".to_string(), Value::String(self.hosted_zone_id.clone()));
        map.insert("Region".to_string(), Value::String(self.region.clone()));
        Ok(Value::Object(map))
    }
}

const CERTIFICATE_HANDLER: &str = r#"
const { ACMClient, RequestCertificateCommand, DescribeCertificateCommand, DeleteCertificateCommand, waitUntilCertificateValidated } = require('@aws-sdk/client-acm');
const { Route53Client, ChangeResourceRecordSetsCommand } = require('@aws-sdk/client-route-53');
const response = require('cfn-response');
const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
async function validationRecords(acm, arn, count) {
  for (let i = 0; i < 24; i++) {
    const { Certificate } = await acm.send(new DescribeCertificateCommand({ CertificateArn: arn }));
    const opts = Certificate.DomainValidationOptions || [];
    const records = opts.map((o) => o.ResourceRecord).filter(Boolean);
    if (opts.length >= count && records.length === opts.length) return records;
    await sleep(5000);
  }
  throw new Error(`No validation records for ${arn}`);
}
async function upsert(zone, records) {
  const seen = new Set();
  const Changes = records.filter((r) => !seen.has(r.Name) && seen.add(r.Name)).map((r) => ({
    Action: 'UPSERT',
    ResourceRecordSet: { Name: r.Name, Type: r.Type, TTL: 60, ResourceRecords: [{ Value: r.Value }] },
  }));
  await new Route53Client({}).send(new ChangeResourceRecordSetsCommand({ HostedZoneId: zone, ChangeBatch: { Changes } }));
}
exports.handler = async function(event, context) {
  const p = event.ResourceProperties;
  const acm = new ACMClient({ region: p.Region });
  try {
    if (event.RequestType === 'Delete') {
      const arn = event.PhysicalResourceId;
      if (arn.startsWith('arn:')) {
        await acm.send(new DeleteCertificateCommand({ CertificateArn: arn }));
      }
      return await response.send(event, context, response.SUCCESS, {}, arn);
    }
    const names = p.SubjectAlternativeNames || [];
    const req = await acm.send(new RequestCertificateCommand({
      DomainName: p.DomainName,
      SubjectAlternativeNames: names.length ? names : undefined,
      ValidationMethod: 'DNS',
      IdempotencyToken: event.RequestId.replace(/-/g, '').slice(0, 32),
    }));
    const arn = req.CertificateArn;
    await upsert(p.HostedZoneId, await validationRecords(acm, arn, 1 + names.length));
    const maxWaitTime = Math.max(30, Math.floor(context.getRemainingTimeInMillis() / 1000) - 30);
    await waitUntilCertificateValidated({ client: acm, maxWaitTime }, { CertificateArn: arn });
    await response.send(event, context, response.SUCCESS, { Arn: arn }, arn);
  } catch (err) {
    console.log(err);
    await response.send(event, context, response.FAILED, {}, event.PhysicalResourceId || 'failed');
  }
};
"#;

/// An ACM certificate requested and DNS-validated by a custom resource.
/// A custom resource is used instead of AWS::CertificateManager::Certificate
/// so that the certificate can live in a different region than the stack.
#[derive(Debug, Clone)]
pub struct DnsValidatedCertificate {
    pub logical_id: String,
    pub region: String,
}

impl DnsValidatedCertificate {
    pub fn new(stack: &mut Stack, id: &str, props: DnsValidatedCertificateProps) -> SiteResult<Self> {
        let logical_id = sanitize_logical_id(id);
        validate_certificate_domain(&props.domain_name)?;
        for san in props.subject_alternative_names.iter() {
            validate_certificate_domain(san)?;
        }
        for name in std::iter::once(&props.domain_name).chain(props.subject_alternative_names.iter()) {
            if !props.hosted_zone.contains(name) {
                return Err(SiteError::invalid_domain(name.as_str(), format!("Not part of hosted zone {}", props.hosted_zone.zone_name)));
            }
        }
        let region = props.region.unwrap_or_else(|| CLOUDFRONT_CERTIFICATE_REGION.to_string());
        verify_region(&region)?;

        stack.add_construct(id, ConstructKind::Certificate)?;
        let handler = InlineFunction::new(stack, id, &format!("{logical_id}Handler"), InlineFunctionProps {
            description: format!("requests and validates certificate {logical_id}"),
            code: CERTIFICATE_HANDLER,
            timeout: 900,
            memory_size: 128,
            statements: vec![
                PolicyStatement::allow(
                    &["acm:RequestCertificate", "acm:DescribeCertificate", "acm:DeleteCertificate"],
                    vec![json!("*")],
                ),
                PolicyStatement::allow(&["route53:ChangeResourceRecordSets"], vec![json!(props.hosted_zone.zone_arn())]),
                PolicyStatement::allow(&["route53:GetChange"], vec![json!("*")]),
            ],
        })?;
        let cert = CfnDnsValidatedCertificate {
            service_token: handler.service_token(),
            domain_name: props.domain_name,
            subject_alternative_names: props.subject_alternative_names,
            hosted_zone_id: props.hosted_zone.hosted_zone_id.clone(),
            region: region.clone(),
        };
        stack.add_cfn_resource(id, &logical_id, &cert)?;
        Ok(Self { logical_id, region })
    }

    pub fn certificate_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> HostedZone {
        HostedZone { construct_id: "Zone".into(), hosted_zone_id: "Z1".into(), zone_name: "example.com.".into() }
    }

    fn stack() -> Stack {
        Stack::new("cert", StackEnv::new("1", "eu-central-1")).unwrap()
    }

    #[test]
    fn region_defaults_to_us_east_1() {
        let mut s = stack();
        let zone = zone();
        let cert = DnsValidatedCertificate::new(&mut s, "Certificate", DnsValidatedCertificateProps {
            domain_name: "example.com".into(),
            subject_alternative_names: vec![],
            hosted_zone: &zone,
            region: None,
        }).unwrap();
        assert_eq!(cert.region, "us-east-1");
        let res = s.resource("Certificate").unwrap();
        assert_eq!(res.ty, "Custom::DNSValidatedCertificate");
        assert_eq!(res.properties["Region"], json!("us-east-1"));
        assert_eq!(res.properties["HostedZoneId"], json!("Z1"));
        assert_eq!(res.properties["ServiceToken"], get_att("CertificateHandlerFunction", "Arn"));
        assert!(res.properties.get("SubjectAlternativeNames").is_none());
    }

    #[test]
    fn wildcards() {
        assert!(validate_certificate_domain("*.example.com").is_ok());
        assert!(validate_certificate_domain("*.*.example.com").is_err());
        assert!(validate_certificate_domain("www.*.example.com").is_err());
    }

    #[test]
    fn names_must_belong_to_the_zone() {
        let mut s = stack();
        let zone = zone();
        let err = DnsValidatedCertificate::new(&mut s, "Certificate", DnsValidatedCertificateProps {
            domain_name: "example.org".into(),
            subject_alternative_names: vec![],
            hosted_zone: &zone,
            region: None,
        });
        assert!(matches!(err, Err(SiteError::InvalidDomain { .. })));
    }

    #[test]
    fn handler_fits_inline() {
        assert!(CERTIFICATE_HANDLER.len() <= MAX_INLINE_CODE_LEN);
    }

    #[test]
    fn handler_waits_within_the_function_timeout() {
        // record polling is bounded to 24 x 5s, validation gets what is left
        assert!(CERTIFICATE_HANDLER.contains("i < 24; i++"));
        assert!(CERTIFICATE_HANDLER.contains("await sleep(5000)"));
        assert!(CERTIFICATE_HANDLER.contains("context.getRemainingTimeInMillis() / 1000) - 30"));
        assert!(!CERTIFICATE_HANDLER.contains("maxWaitTime: 840"));
    }
}
