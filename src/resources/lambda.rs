use super::*;

pub const BASIC_EXECUTION_POLICY_ARN: &str = "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assume_role_policy_document: Value,
    pub managed_policy_arns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<InlinePolicy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionCode {
    pub zip_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub runtime: String,
    pub handler: String,
    pub role: Value,
    pub code: FunctionCode,
    pub timeout: u32,
    pub memory_size: u32,
}

/// Inline code is capped by CloudFormation.
pub const MAX_INLINE_CODE_LEN: usize = 4096;

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> SiteResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
    fn validate(&self) -> Result<(), String> {
        if self.code.zip_file.len() > MAX_INLINE_CODE_LEN {
            return Err(format!("Inline function code is {} bytes, must be at most {MAX_INLINE_CODE_LEN}", self.code.zip_file.len()));
        }
        if self.timeout < 1 || self.timeout > 900 {
            return Err(format!("Invalid timeout {:?}\nMust be between 1 and 900", self.timeout));
        }
        if self.memory_size < 128 || self.memory_size > 10240 {
            return Err(format!("Invalid memory size {:?}\nMust be between 128 and 10240", self.memory_size));
        }
        Ok(())
    }
}

/// A Node.js function whose source lives in the template, plus its role.
/// Custom resources use these as their service token.
pub struct InlineFunctionProps {
    pub description: String,
    pub code: &'static str,
    pub timeout: u32,
    pub memory_size: u32,
    pub statements: Vec<PolicyStatement>,
}

pub struct InlineFunction {
    pub function_logical_id: String,
    pub role_logical_id: String,
}

impl InlineFunction {
    pub const RUNTIME: &'static str = "nodejs20.x";

    /// `owner` must already be declared on the stack; the role and the
    /// function are recorded under it as `{prefix}Role` / `{prefix}Function`.
    pub fn new(stack: &mut Stack, owner: &str, prefix: &str, props: InlineFunctionProps) -> SiteResult<Self> {
        let role_logical_id = format!("{prefix}Role");
        let function_logical_id = format!("{prefix}Function");

        let mut policies = vec![];
        if !props.statements.is_empty() {
            policies.push(InlinePolicy {
                policy_name: format!("{prefix}Policy"),
                policy_document: create_policy_doc(&props.statements),
            });
        }
        let role = CfnRole {
            description: Some(format!("execution role for {}", props.description)),
            assume_role_policy_document: create_assume_role_policy_doc(),
            managed_policy_arns: vec![BASIC_EXECUTION_POLICY_ARN.to_string()],
            policies,
        };
        stack.add_cfn_resource(owner, &role_logical_id, &role)?;

        let function = CfnFunction {
            description: Some(props.description),
            runtime: Self::RUNTIME.to_string(),
            handler: "index.handler".to_string(),
            role: get_att(&role_logical_id, "Arn"),
            code: FunctionCode { zip_file: props.code.to_string() },
            timeout: props.timeout,
            memory_size: props.memory_size,
        };
        stack.add_cfn_resource(owner, &function_logical_id, &function)?;
        Ok(Self { function_logical_id, role_logical_id })
    }

    pub fn service_token(&self) -> Value {
        get_att(&self.function_logical_id, "Arn")
    }
}
