//! Submits a synthesized template to CloudFormation and waits for it to settle.

use std::collections::BTreeMap;

use aws_sdk_cloudformation::types::{Capability, OnFailure, Stack as CfnStack, StackStatus};
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{SiteError, SiteResult};

const POLL_INTERVAL_MS: u64 = 700;

/// Largest template CloudFormation accepts as an inline body.
pub const MAX_TEMPLATE_BODY_LEN: usize = 51_200;

pub type StackOutputs = BTreeMap<String, String>;

/// Shared AWS config from the usual environment/profile chain, optionally
/// pinned to `region`.
pub async fn load_sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::from_env();
    if let Some(region) = region {
        loader = loader.region(aws_sdk_cloudformation::config::Region::new(region));
    }
    loader.load().await
}

pub async fn does_stack_exist(client: &aws_sdk_cloudformation::Client, name: &str) -> SiteResult<bool> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let e_str = format!("{:#?}", e);
            if e_str.contains("does not exist") {
                return Ok(false);
            }
            Err(SiteError::Provider(e_str))
        }
    }
}

/// Which kind of change a stack is settling from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    CreateOrUpdate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackProgress {
    Done,
    InProgress,
    Failed,
}

/// Maps a stack status to where `operation` stands. A create or update that
/// rolled back is a failure even though the stack itself is stable again.
pub fn classify_status(status: &StackStatus, operation: StackOperation) -> StackProgress {
    match operation {
        StackOperation::CreateOrUpdate => match status {
            StackStatus::CreateComplete |
            StackStatus::UpdateComplete |
            StackStatus::ImportComplete => StackProgress::Done,

            StackStatus::CreateInProgress |
            StackStatus::ImportInProgress |
            StackStatus::ImportRollbackInProgress |
            StackStatus::ReviewInProgress |
            StackStatus::RollbackInProgress |
            StackStatus::UpdateCompleteCleanupInProgress |
            StackStatus::UpdateInProgress |
            StackStatus::UpdateRollbackCompleteCleanupInProgress |
            StackStatus::UpdateRollbackInProgress |
            // OnFailure::Delete removes a stack whose creation failed
            StackStatus::DeleteInProgress => StackProgress::InProgress,

            _ => StackProgress::Failed,
        },
        StackOperation::Delete => match status {
            StackStatus::DeleteComplete => StackProgress::Done,
            StackStatus::DeleteFailed => StackProgress::Failed,
            _ => StackProgress::InProgress,
        },
    }
}

/// `Ok(Some)` once `operation` finished, `Ok(None)` while it is still in
/// progress, and an error with the status reason if it failed.
pub async fn describe_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    operation: StackOperation,
) -> SiteResult<Option<CfnStack>> {
    let resp = client.describe_stacks().stack_name(name).send().await.map_err(SiteError::provider)?;
    let first = match resp.stacks().and_then(|s| s.first()) {
        Some(first) => first,
        None => return Err(SiteError::Provider(format!("Stack {name} not found"))),
    };
    let status = match first.stack_status() {
        Some(status) => status,
        None => return Err(SiteError::Provider(format!("Stack {name} has no status"))),
    };
    match classify_status(status, operation) {
        StackProgress::Done => Ok(Some(first.clone())),
        StackProgress::InProgress => Ok(None),
        StackProgress::Failed => Err(SiteError::Provider(format!(
            "Stack {name} is {}: {}",
            status.as_str(),
            first.stack_status_reason().unwrap_or("Failed to get stack failure reason")
        ))),
    }
}

fn collect_outputs(stack: &CfnStack) -> StackOutputs {
    let mut out = StackOutputs::new();
    for output in stack.outputs().unwrap_or_default() {
        if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
            out.insert(key.to_string(), val.to_string());
        }
    }
    out
}

/// Polls until a create or update finished and returns the outputs.
pub async fn wait_for_output(client: &aws_sdk_cloudformation::Client, name: &str) -> SiteResult<StackOutputs> {
    loop {
        tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        match describe_stack(client, name, StackOperation::CreateOrUpdate).await? {
            Some(stack) => return Ok(collect_outputs(&stack)),
            None => debug!("Waiting on stack {name}"),
        }
    }
}

/// Outputs of the stack as it is now, whatever its status.
pub async fn current_outputs(client: &aws_sdk_cloudformation::Client, name: &str) -> SiteResult<StackOutputs> {
    let resp = client.describe_stacks().stack_name(name).send().await.map_err(SiteError::provider)?;
    match resp.stacks().and_then(|s| s.first()) {
        Some(stack) => Ok(collect_outputs(stack)),
        None => Err(SiteError::Provider(format!("Stack {name} not found"))),
    }
}

/// Where CloudFormation reads the template from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Body(String),
    Url(String),
}

pub fn fits_inline(body: &str) -> bool {
    body.len() <= MAX_TEMPLATE_BODY_LEN
}

/// `templates/<stack>-<adler32 of body>.json`
pub fn template_key(stack_name: &str, body: &str) -> String {
    format!("templates/{stack_name}-{:08x}.json", adler::adler32_slice(body.as_bytes()))
}

pub fn template_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

/// Inline body when it is small enough, otherwise the body is put in
/// `bucket` and referenced by url.
pub async fn template_source(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    region: &str,
    stack_name: &str,
    body: String,
) -> SiteResult<TemplateSource> {
    if fits_inline(&body) {
        return Ok(TemplateSource::Body(body));
    }
    let key = template_key(stack_name, &body);
    info!("Template is {} bytes, staging it as s3://{bucket}/{key}", body.len());
    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .content_type("application/json")
        .body(ByteStream::from(body.into_bytes()))
        .send()
        .await
        .map_err(SiteError::provider)?;
    Ok(TemplateSource::Url(template_url(bucket, region, &key)))
}

/// Returns false when the stack already matches the template.
pub async fn create_or_update_stack(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    template: &TemplateSource,
) -> SiteResult<bool> {
    let (body, url) = match template {
        TemplateSource::Body(b) => (Some(b.clone()), None),
        TemplateSource::Url(u) => (None, Some(u.clone())),
    };
    if does_stack_exist(client, name).await? {
        info!("Updating {name} ...");
        let res = client
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .set_template_body(body)
            .set_template_url(url)
            .send()
            .await;
        if let Err(e) = res {
            let e_str = format!("{:#?}", e);
            if e_str.contains("No updates are to be performed") {
                info!("Stack {name} is already up to date");
                return Ok(false);
            }
            return Err(SiteError::Provider(e_str));
        }
    } else {
        info!("Creating {name} ...");
        client
            .create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .set_template_body(body)
            .set_template_url(url)
            .send()
            .await
            .map_err(SiteError::provider)?;
    }
    Ok(true)
}

/// Creates or updates `name` from `template` and waits for the outputs.
pub async fn deploy_template(
    client: &aws_sdk_cloudformation::Client,
    name: &str,
    template: &TemplateSource,
) -> SiteResult<StackOutputs> {
    if !create_or_update_stack(client, name, template).await? {
        return current_outputs(client, name).await;
    }
    let outputs = wait_for_output(client, name).await?;
    info!("Stack {name} is ready");
    Ok(outputs)
}

/// Deletes the stack and waits until it is gone. Deleting a stack that does
/// not exist succeeds.
pub async fn destroy_stack(client: &aws_sdk_cloudformation::Client, name: &str) -> SiteResult<()> {
    if !does_stack_exist(client, name).await? {
        info!("Stack {name} does not exist");
        return Ok(());
    }
    info!("Deleting {name} ...");
    client.delete_stack().stack_name(name).send().await.map_err(SiteError::provider)?;
    loop {
        tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        match describe_stack(client, name, StackOperation::Delete).await {
            Ok(Some(_)) => break,
            Ok(None) => debug!("Waiting on stack {name} to delete"),
            Err(e) => {
                if !does_stack_exist(client, name).await? {
                    break;
                }
                return Err(e);
            }
        }
    }
    info!("Deleted {name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolled_back_changes_are_failures() {
        for status in [
            StackStatus::UpdateRollbackComplete,
            StackStatus::RollbackComplete,
            StackStatus::CreateFailed,
            StackStatus::UpdateRollbackFailed,
            StackStatus::ImportRollbackComplete,
            StackStatus::DeleteComplete,
        ] {
            assert_eq!(classify_status(&status, StackOperation::CreateOrUpdate), StackProgress::Failed, "{status:?}");
        }
    }

    #[test]
    fn completed_changes_are_done() {
        for status in [StackStatus::CreateComplete, StackStatus::UpdateComplete, StackStatus::ImportComplete] {
            assert_eq!(classify_status(&status, StackOperation::CreateOrUpdate), StackProgress::Done, "{status:?}");
        }
        for status in [
            StackStatus::CreateInProgress,
            StackStatus::UpdateInProgress,
            StackStatus::UpdateRollbackInProgress,
            StackStatus::UpdateCompleteCleanupInProgress,
            StackStatus::RollbackInProgress,
        ] {
            assert_eq!(classify_status(&status, StackOperation::CreateOrUpdate), StackProgress::InProgress, "{status:?}");
        }
    }

    #[test]
    fn delete_waits_for_delete_complete() {
        assert_eq!(classify_status(&StackStatus::DeleteComplete, StackOperation::Delete), StackProgress::Done);
        assert_eq!(classify_status(&StackStatus::DeleteInProgress, StackOperation::Delete), StackProgress::InProgress);
        assert_eq!(classify_status(&StackStatus::UpdateRollbackComplete, StackOperation::Delete), StackProgress::InProgress);
        assert_eq!(classify_status(&StackStatus::DeleteFailed, StackOperation::Delete), StackProgress::Failed);
    }

    #[test]
    fn large_templates_go_by_url() {
        assert!(fits_inline(&"x".repeat(MAX_TEMPLATE_BODY_LEN)));
        assert!(!fits_inline(&"x".repeat(MAX_TEMPLATE_BODY_LEN + 1)));
        let key = template_key("SiteStack", "{}");
        assert!(key.starts_with("templates/SiteStack-") && key.ends_with(".json"));
        assert_ne!(key, template_key("SiteStack", "{ }"));
        assert_eq!(
            template_url("site-assets", "eu-west-1", &key),
            format!("https://site-assets.s3.eu-west-1.amazonaws.com/{key}")
        );
    }
}
