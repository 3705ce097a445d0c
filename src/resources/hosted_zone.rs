use super::*;
use crate::context::hosted_zone_context_key;

/// Checks that `domain` is a fully qualified hostname: at least two labels,
/// each 1-63 characters of letters, digits and hyphens, no leading or
/// trailing hyphen, no trailing dot, 253 characters max.
pub fn validate_domain_name(domain: &str) -> SiteResult<()> {
    if domain.is_empty() {
        return Err(SiteError::invalid_domain(domain, "Must provide a domain name"));
    }
    if domain.len() > 253 {
        return Err(SiteError::invalid_domain(domain, "Must be at most 253 characters"));
    }
    if domain.ends_with('.') {
        return Err(SiteError::invalid_domain(domain, "Must not end with a dot"));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(SiteError::invalid_domain(domain, "Must contain at least two labels, eg: example.com"));
    }
    for label in labels {
        if label.is_empty() || label.len() > 63 {
            return Err(SiteError::invalid_domain(domain, "Each label must be between 1 and 63 characters"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SiteError::invalid_domain(domain, "May only contain letters, numbers, dashes and dots"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(SiteError::invalid_domain(domain, "Labels may not start or end with a dash"));
        }
    }
    Ok(())
}

/// A Route 53 hosted zone that already exists in the account.
/// Looking it up declares nothing in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub construct_id: String,
    pub hosted_zone_id: String,
    pub zone_name: String,
}

impl HostedZone {
    /// Resolves the zone for `domain_name` from the stack's context.
    /// Fails when the stack has no account/region or the context has no
    /// entry for the zone.
    pub fn from_lookup(stack: &mut Stack, id: &str, domain_name: &str) -> SiteResult<Self> {
        validate_domain_name(domain_name)?;
        let (account, region) = match (&stack.env().account, &stack.env().region) {
            (Some(a), Some(r)) => (a.clone(), r.clone()),
            _ => {
                return Err(SiteError::config(format!(
                    "Cannot look up hosted zone {domain_name}: account and region must be set on stack {}",
                    stack.name()
                )));
            }
        };
        let key = hosted_zone_context_key(&account, &region, domain_name);
        let attrs = match stack.context().hosted_zone(&key)? {
            Some(a) => a,
            None => return Err(SiteError::MissingContext { domain: domain_name.to_string(), key }),
        };
        stack.add_construct(id, ConstructKind::Lookup)?;
        Ok(Self {
            construct_id: id.to_string(),
            hosted_zone_id: attrs.hosted_zone_id,
            zone_name: attrs.zone_name,
        })
    }

    /// true for the apex and any name below it, wildcards included
    pub fn contains(&self, domain_name: &str) -> bool {
        let zone = self.zone_name.trim_end_matches('.');
        let domain = domain_name.trim_start_matches("*.").trim_end_matches('.');
        domain == zone || domain.ends_with(&format!(".{zone}"))
    }

    pub fn zone_arn(&self) -> String {
        format!("arn:aws:route53:::hostedzone/{}", self.hosted_zone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, HostedZoneAttributes};

    #[test]
    fn domain_names() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("www.my-site.example.com").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("localhost").is_err());
        assert!(validate_domain_name("https://example.com").is_err());
        assert!(validate_domain_name("example.com.").is_err());
        assert!(validate_domain_name("-bad.com").is_err());
        assert!(validate_domain_name("a..com").is_err());
        assert!(validate_domain_name(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn lookup_reads_context() {
        let mut ctx = Context::new();
        let key = hosted_zone_context_key("111122223333", "eu-west-1", "example.com");
        ctx.set_hosted_zone(key, &HostedZoneAttributes { hosted_zone_id: "ZABC".into(), zone_name: "example.com.".into() }).unwrap();
        let mut stack = Stack::new("zone", StackEnv::new("111122223333", "eu-west-1")).unwrap().with_context(ctx);
        let zone = HostedZone::from_lookup(&mut stack, "Zone", "example.com").unwrap();
        assert_eq!(zone.hosted_zone_id, "ZABC");
        assert_eq!(zone.zone_arn(), "arn:aws:route53:::hostedzone/ZABC");
        assert!(zone.contains("example.com"));
        assert!(zone.contains("*.www.example.com"));
        assert!(!zone.contains("notexample.com"));
        assert!(stack.synth().resources.is_empty());
        assert_eq!(stack.construct("Zone").unwrap().kind, ConstructKind::Lookup);
    }

    #[test]
    fn lookup_without_context_fails_fast() {
        let mut stack = Stack::new("zone", StackEnv::new("111122223333", "eu-west-1")).unwrap();
        let err = HostedZone::from_lookup(&mut stack, "Zone", "example.com").unwrap_err();
        assert!(matches!(err, SiteError::MissingContext { .. }));
        assert!(stack.constructs().is_empty());
    }

    #[test]
    fn lookup_requires_account_and_region() {
        let mut stack = Stack::new("zone", StackEnv::default()).unwrap();
        let err = HostedZone::from_lookup(&mut stack, "Zone", "example.com").unwrap_err();
        assert!(matches!(err, SiteError::Configuration(_)));
    }
}
