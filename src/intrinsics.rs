//! Builders for CloudFormation intrinsic functions and IAM policy documents.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Sub": template }`
pub fn sub<S: AsRef<str>>(template: S) -> Value {
    json!({ "Fn::Sub": template.as_ref() })
}

/// One IAM policy statement.
pub struct PolicyStatement {
    pub effect: &'static str,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    /// `None` for identity policies, `Some("*")` for public resource policies.
    pub principal: Option<Value>,
}

impl PolicyStatement {
    pub fn allow<S: AsRef<str>>(actions: &[S], resources: Vec<Value>) -> Self {
        Self {
            effect: "Allow",
            actions: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            resources,
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }

    fn to_value(&self) -> Value {
        let mut statement = Map::new();
        statement.insert("Effect".to_string(), Value::String(self.effect.to_string()));
        if let Some(principal) = &self.principal {
            statement.insert("Principal".to_string(), principal.clone());
        }
        statement.insert("Action".to_string(), single_or_list(self.actions.iter().map(|a| Value::String(a.clone())).collect()));
        statement.insert("Resource".to_string(), single_or_list(self.resources.clone()));
        Value::Object(statement)
    }
}

fn single_or_list(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

pub fn create_policy_doc(statements: &[PolicyStatement]) -> Value {
    let statements: Vec<Value> = statements.iter().map(PolicyStatement::to_value).collect();
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

/// Trust policy letting the Lambda service assume a role.
pub fn create_assume_role_policy_doc() -> Value {
    let mut map = Map::default();
    map.insert("Version".to_string(), Value::String("2012-10-17".to_string()));

    let mut principal = Map::default();
    principal.insert("Service".to_string(), Value::String("lambda.amazonaws.com".to_string()));

    let mut statement_obj = Map::default();
    statement_obj.insert("Effect".to_string(), Value::String("Allow".to_string()));
    statement_obj.insert("Principal".to_string(), Value::Object(principal));
    statement_obj.insert("Action".to_string(), Value::String("sts:AssumeRole".to_string()));
    map.insert("Statement".to_string(), Value::Array(vec![Value::Object(statement_obj)]));
    Value::Object(map)
}

/// Collects the logical ids a property tree points at through `Ref`,
/// `Fn::GetAtt` and `${...}` placeholders of `Fn::Sub`.
/// Pseudo parameters (`AWS::Region` etc.) are not logical ids and are skipped.
pub fn referenced_logical_ids(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_refs(value, &mut out);
    out
}

fn collect_refs(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    push_id(id, out);
                    return;
                }
                if let Some(att) = map.get("Fn::GetAtt") {
                    match att {
                        Value::Array(parts) => {
                            if let Some(Value::String(id)) = parts.first() {
                                push_id(id, out);
                            }
                        }
                        Value::String(s) => {
                            if let Some((id, _)) = s.split_once('.') {
                                push_id(id, out);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                if let Some(sub_value) = map.get("Fn::Sub") {
                    match sub_value {
                        Value::String(s) => collect_sub_refs(s, &[], out),
                        Value::Array(parts) => {
                            let vars: Vec<String> = match parts.get(1) {
                                Some(Value::Object(vars)) => {
                                    for v in vars.values() {
                                        collect_refs(v, out);
                                    }
                                    vars.keys().cloned().collect()
                                }
                                _ => vec![],
                            };
                            if let Some(Value::String(s)) = parts.first() {
                                collect_sub_refs(s, &vars, out);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

fn collect_sub_refs(template: &str, local_vars: &[String], out: &mut BTreeSet<String>) {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = match after.find('}') {
            Some(e) => e,
            None => return,
        };
        let name = &after[..end];
        // ${!Literal} is an escaped placeholder
        if !name.starts_with('!') {
            let id = name.split('.').next().unwrap_or(name);
            if !local_vars.iter().any(|v| v == id) {
                push_id(id, out);
            }
        }
        rest = &after[end + 1..];
    }
}

fn push_id(id: &str, out: &mut BTreeSet<String>) {
    if !id.starts_with("AWS::") && !id.is_empty() {
        out.insert(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_refs_getatts_and_subs() {
        let props = json!({
            "Bucket": get_ref("SiteBucket"),
            "Target": get_att("SiteDistribution", "DomainName"),
            "Nested": [{ "Arn": sub("arn:aws:s3:::${SiteBucket}/*") }],
            "Region": get_ref("AWS::Region"),
            "Escaped": sub("${!NotAnId} in ${AWS::AccountId}"),
        });
        let ids: Vec<String> = referenced_logical_ids(&props).into_iter().collect();
        assert_eq!(ids, vec!["SiteBucket".to_string(), "SiteDistribution".to_string()]);
    }

    #[test]
    fn sub_local_variables_are_not_logical_ids() {
        let props = json!({ "Fn::Sub": ["${Name}-${Role.Arn}", { "Name": get_ref("Zone") }] });
        let ids: Vec<String> = referenced_logical_ids(&props).into_iter().collect();
        assert_eq!(ids, vec!["Role".to_string(), "Zone".to_string()]);
    }

    #[test]
    fn public_read_statement_has_principal() {
        let doc = create_policy_doc(&[
            PolicyStatement::allow(&["s3:GetObject"], vec![sub("arn:aws:s3:::${B}/*")]).with_principal(json!("*")),
        ]);
        assert_eq!(doc["Statement"][0]["Principal"], json!("*"));
        assert_eq!(doc["Statement"][0]["Action"], json!("s3:GetObject"));
        assert_eq!(doc["Version"], json!("2012-10-17"));
    }
}
