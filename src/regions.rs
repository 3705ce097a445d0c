use crate::error::{SiteError, SiteResult};

/// CloudFront only accepts ACM certificates issued in this region.
pub const CLOUDFRONT_CERTIFICATE_REGION: &str = "us-east-1";

/// The only partition the generated templates work in: they use `arn:aws:`
/// ARNs and CloudFront's alias zone, which do not exist elsewhere.
pub const SUPPORTED_PARTITION: &str = "aws";

/// Partition a region code belongs to, eg: `aws-cn` for `cn-north-1`.
pub fn partition_of(r: &str) -> &'static str {
    if r.starts_with("cn-") {
        "aws-cn"
    } else if r.starts_with("us-gov-") {
        "aws-us-gov"
    } else if r.starts_with("us-isob-") {
        "aws-iso-b"
    } else if r.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

/// Checks the shape of a region code rather than a fixed list, so regions
/// launched later are accepted: a two letter area, one or more lowercase
/// words, and a number. eg: `eu-central-2`, `us-gov-west-1`
pub fn is_valid_region(r: &str) -> bool {
    let parts: Vec<&str> = r.split('-').collect();
    if parts.len() < 3 {
        return false;
    }
    let area = parts[0];
    let number = parts[parts.len() - 1];
    let words = &parts[1..parts.len() - 1];
    area.len() == 2
        && area.chars().all(|c| c.is_ascii_lowercase())
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
        && words.iter().all(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_lowercase()))
}

pub fn verify_region(r: &str) -> SiteResult<()> {
    if !is_valid_region(r) {
        return Err(SiteError::config(format!(
            "Invalid region code {:?}\nMust look like <area>-<location>-<number>, eg: eu-west-1",
            r
        )));
    }
    let partition = partition_of(r);
    if partition != SUPPORTED_PARTITION {
        return Err(SiteError::config(format!(
            "Region {r} is in the {partition} partition. Only regions of the {SUPPORTED_PARTITION} partition are supported"
        )));
    }
    Ok(())
}
