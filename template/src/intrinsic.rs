//! CloudFormation intrinsic functions used as references inside property bags
//!
//! Properties are plain JSON. A reference to another node is a `Ref` or
//! `Fn::GetAtt` object, a cross-graph placeholder is an `Fn::ImportValue`
//! object. Edges of the graph are derived from these.

use serde_json::{json, Value};

pub fn reference(node: &str) -> Value {
    json!({ "Ref": node })
}

pub fn get_att(node: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [node, attribute] })
}

/// Placeholder for a value published by another graph
pub fn import(export: &str) -> Value {
    json!({ "Fn::ImportValue": export })
}

/// Concatenate strings and intrinsics
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// A reference found in a property bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intrinsic<'a> {
    Ref(&'a str),
    GetAtt(&'a str, &'a str),
    Import(&'a str),
}

impl<'a> Intrinsic<'a> {
    /// Recognize a single-key intrinsic object
    ///
    /// Pseudo parameters such as `AWS::Region` are not nodes and are skipped.
    pub fn parse(value: &'a Value) -> Option<Self> {
        let object = value.as_object()?;

        if object.len() != 1 {
            return None;
        }

        let (key, argument) = object.iter().next()?;

        match key.as_str() {
            "Ref" => argument
                .as_str()
                .filter(|name| !name.contains("::"))
                .map(Intrinsic::Ref),

            "Fn::GetAtt" => match argument {
                Value::Array(pair) if pair.len() == 2 => {
                    Some(Intrinsic::GetAtt(pair[0].as_str()?, pair[1].as_str()?))
                }
                Value::String(dotted) => dotted
                    .split_once('.')
                    .map(|(node, attribute)| Intrinsic::GetAtt(node, attribute)),
                _ => None,
            },

            "Fn::ImportValue" => argument.as_str().map(Intrinsic::Import),
            _ => None,
        }
    }

    /// Target node, if the intrinsic points inside the graph
    pub fn node(&self) -> Option<&'a str> {
        match self {
            Intrinsic::Ref(node) | Intrinsic::GetAtt(node, _) => Some(node),
            Intrinsic::Import(_) => None,
        }
    }
}

/// Append a key or an index to a property path
pub(crate) fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub(crate) fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// All intrinsics in a value, with the property path each was found at
pub fn references(value: &Value) -> Vec<(String, Intrinsic<'_>)> {
    let mut result = vec![];
    collect(value, String::new(), &mut result);
    result
}

fn collect<'a>(value: &'a Value, path: String, result: &mut Vec<(String, Intrinsic<'a>)>) {
    if let Some(intrinsic) = Intrinsic::parse(value) {
        result.push((path, intrinsic));
        return;
    }

    match value {
        Value::Object(object) => {
            for (key, child) in object {
                collect(child, child_path(&path, key), result);
            }
        }

        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect(child, index_path(&path, index), result);
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!(
            Intrinsic::parse(&reference("GPSThing")),
            Some(Intrinsic::Ref("GPSThing"))
        );

        assert_eq!(
            Intrinsic::parse(&get_att("ENVTaskRole", "Arn")),
            Some(Intrinsic::GetAtt("ENVTaskRole", "Arn"))
        );

        assert_eq!(
            Intrinsic::parse(&json!({"Fn::GetAtt": "ENVTaskRole.Arn"})),
            Some(Intrinsic::GetAtt("ENVTaskRole", "Arn"))
        );

        assert_eq!(
            Intrinsic::parse(&import("EcsClusterName")),
            Some(Intrinsic::Import("EcsClusterName"))
        );

        assert_eq!(Intrinsic::parse(&json!({"Ref": "AWS::Region"})), None);
        assert_eq!(Intrinsic::parse(&json!({"Ref": "A", "Other": 1})), None);
        assert_eq!(Intrinsic::parse(&json!("Ref")), None);
    }

    #[test]
    fn references_with_paths() {
        let value = json!({
            "Cluster": import("EcsClusterName"),
            "TaskDefinition": reference("IoTENVTaskDefinition"),
            "Policies": [
                {"Resource": get_att("ENVDataTable", "Arn")},
                {"Resource": "*"}
            ],
            "Name": "ENV"
        });

        let mut found = references(&value);
        found.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            found,
            vec![
                ("Cluster".to_string(), Intrinsic::Import("EcsClusterName")),
                ("Policies[0].Resource".to_string(), Intrinsic::GetAtt("ENVDataTable", "Arn")),
                ("TaskDefinition".to_string(), Intrinsic::Ref("IoTENVTaskDefinition")),
            ]
        );
    }

    #[test]
    fn references_inside_join() {
        let value = join(vec![json!("s3://"), reference("Bucket"), json!("/tmp/")]);
        let found = references(&value);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Fn::Join[1][1]");
        assert_eq!(found[0].1.node(), Some("Bucket"));
    }
}
