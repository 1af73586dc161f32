//! Template parameters and their validation rules

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PREFIX: &str = "prefix";
pub const ACCOUNT: &str = "account";
pub const REGION: &str = "region";
pub const CLUSTER: &str = "cluster";
pub const VPC: &str = "vpc";
pub const INTERVAL: &str = "interval";
pub const BUCKET: &str = "bucket";

static PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("Failed to init regexp"));

static ACCOUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{12}$").expect("Failed to init regexp"));

static REGION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-[0-9]$").expect("Failed to init regexp")
});

static REFERENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9:/._\-]+$").expect("Failed to init regexp"));

static BUCKET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("Failed to init regexp"));

static INTERVAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{0,5}$").expect("Failed to init regexp"));

/// What a parameter value must look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Alphanumeric, starting with a letter; it is glued into logical ids
    Prefix,

    /// 12-digit AWS account id
    Account,

    /// AWS region code, e.g. us-east-1
    Region,

    /// Name or ARN of an existing resource (cluster, VPC)
    Reference,

    /// Positive number of seconds
    Interval,

    /// S3 bucket name
    Bucket,
}

impl Rule {
    pub fn validate(&self, value: &str) -> bool {
        match self {
            Rule::Prefix => PREFIX_REGEX.is_match(value),
            Rule::Account => ACCOUNT_REGEX.is_match(value),
            Rule::Region => REGION_REGEX.is_match(value),
            Rule::Reference => REFERENCE_REGEX.is_match(value),
            Rule::Interval => INTERVAL_REGEX.is_match(value),
            Rule::Bucket => BUCKET_REGEX.is_match(value),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rule::Prefix => "must start with a letter and contain only letters (a-z, A-Z) and digits",
            Rule::Account => "must be a 12-digit AWS account id",
            Rule::Region => "must be an AWS region code like us-east-1",
            Rule::Reference => "must be a resource name or ARN without whitespace",
            Rule::Interval => "must be a positive number of seconds",
            Rule::Bucket => "must be a valid S3 bucket name (3-63 chars, a-z, 0-9, dots and hyphens)",
        }
    }
}

/// A parameter declared by a template
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    pub rule: Rule,
    pub description: &'static str,
}

impl ParameterSpec {
    pub const fn required(name: &'static str, rule: Rule, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            rule,
            description,
        }
    }

    pub const fn optional(name: &'static str, rule: Rule, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            rule,
            description,
        }
    }
}

/// Parameter values supplied for one instantiation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateParameters(BTreeMap<String, String>);

impl TemplateParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check the values against what the template declares
    ///
    /// Unknown names are rejected as well, a typo in a manifest should not be silently ignored.
    pub(crate) fn validate(&self, template: &str, specs: &[ParameterSpec]) -> Result<Parameters> {
        for (name, _) in self.iter() {
            if !specs.iter().any(|spec| spec.name == name) {
                return Err(Error::parameter(
                    template,
                    name,
                    "not declared by the template",
                ));
            }
        }

        for spec in specs {
            match self.get(spec.name) {
                None if spec.required => {
                    return Err(Error::parameter(template, spec.name, "required but missing"))
                }
                Some("") if spec.required => {
                    return Err(Error::parameter(template, spec.name, "required but empty"))
                }
                Some(value) if !value.is_empty() && !spec.rule.validate(value) => {
                    return Err(Error::parameter(
                        template,
                        spec.name,
                        format!("\"{value}\" {}", spec.rule.message()),
                    ))
                }
                _ => {}
            }
        }

        let values = self
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Parameters {
            template: template.to_string(),
            values,
        })
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TemplateParameters {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Parameters that passed validation, as seen by a blueprint
#[derive(Debug, Clone)]
pub struct Parameters {
    template: String,
    values: BTreeMap<String, String>,
}

impl Parameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A parameter the template declared as required
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::parameter(&self.template, name, "required but missing"))
    }

    /// Prefix or an empty string for templates where it is optional
    pub fn prefix(&self) -> &str {
        self.get(PREFIX).unwrap_or_default()
    }

    /// Check a name derived from parameters against a service limit
    ///
    /// The error blames `field`, the parameter whose value was concatenated into the name.
    pub fn checked(&self, field: &str, name: String, max_len: usize) -> Result<String> {
        if name.len() > max_len {
            return Err(Error::parameter(
                &self.template,
                field,
                format!("derived name \"{name}\" is longer than {max_len} chars"),
            ));
        }

        Ok(name)
    }
}
