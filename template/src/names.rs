//! Name derivation for resources, roles and exports
//!
//! Cloud resource names are ASCII, so every case transform here only touches
//! ASCII letters. Anything else passes through unchanged, which keeps the
//! functions total and the round-trip properties exact.

use heck::ToUpperCamelCase;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Lower-case all ASCII letters
pub fn to_lower(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Upper-case all ASCII letters
pub fn to_upper(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Capitalize the first character and lower-case the rest, e.g. GPS -> Gps
pub fn to_camel(name: &str) -> String {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &to_lower(chars.as_str()),
        None => String::new(),
    }
}

/// Convert a kebab-case role into its name fragment, task-role -> TaskRole
pub fn role_name(role: &str) -> String {
    role.to_upper_camel_case()
}

/// Logical name of a role within a prefixed template, ("env", "task-role") -> envTaskRole
///
/// The prefix is kept verbatim, so prefixes differing only by case give different names.
pub fn logical_name(prefix: &str, role: &str) -> String {
    format!("{prefix}{}", role_name(role))
}

/// How names are compared when looking for collisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    /// GPSTaskRole and gpsTaskRole are different names
    #[default]
    Sensitive,

    /// Names equal ignoring ASCII case collide
    Insensitive,
}

impl CasePolicy {
    /// The form of a name used as the uniqueness key
    pub fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::Sensitive => Cow::Borrowed(name),
            CasePolicy::Insensitive => Cow::Owned(to_lower(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every string up to three chars long over a mixed alphabet
    fn corpus() -> Vec<String> {
        let alphabet = ['a', 'Z', 'q', '0', '-', '_', ' ', 'é', 'ß', 'İ'];
        let mut result = vec![String::new()];
        let mut last = vec![String::new()];

        for _ in 0..3 {
            last = last
                .iter()
                .flat_map(|s| alphabet.iter().map(move |c| format!("{s}{c}")))
                .collect();

            result.extend(last.iter().cloned());
        }

        result.extend(
            ["GPS", "gps", "ENV", "HeA", "Test", "iot-GPS_thing", "123abc"]
                .iter()
                .map(|s| s.to_string()),
        );

        result
    }

    #[test]
    fn upper_of_lower_is_upper() {
        for name in corpus() {
            assert_eq!(to_upper(&to_lower(&name)), to_upper(&name), "{name:?}");
        }
    }

    #[test]
    fn camel_capitalizes_first_and_lowers_rest() {
        for name in corpus() {
            let camel = to_camel(&name);
            let mut chars = camel.chars();

            let Some(first) = chars.next() else {
                assert!(name.is_empty());
                continue;
            };

            assert_eq!(first, first.to_ascii_uppercase(), "{name:?}");
            let skip = name.chars().next().map_or(0, char::len_utf8);
            assert_eq!(chars.as_str(), &to_lower(&name)[skip..], "{name:?}");
        }
    }

    #[test]
    fn transforms_are_total_on_empty_input() {
        assert_eq!(to_lower(""), "");
        assert_eq!(to_upper(""), "");
        assert_eq!(to_camel(""), "");
    }

    #[test]
    fn non_ascii_passes_through() {
        assert_eq!(to_upper("ßé"), "ßé");
        assert_eq!(to_camel("éGPS"), "égps");
    }

    #[test]
    fn camel_of_prefix() {
        assert_eq!(to_camel("GPS"), "Gps");
        assert_eq!(to_camel("hEA"), "Hea");
    }

    #[test]
    fn logical_names_keep_prefix_case() {
        assert_eq!(logical_name("env", "task-role"), "envTaskRole");
        assert_eq!(logical_name("ENV", "task-role"), "ENVTaskRole");
        assert_eq!(logical_name("GPS", "data-table"), "GPSDataTable");
        assert_ne!(logical_name("GPS", "thing"), logical_name("gps", "thing"));
    }

    #[test]
    fn case_policy_keys() {
        assert_eq!(CasePolicy::Sensitive.key("GPSThing"), "GPSThing");
        assert_eq!(CasePolicy::Insensitive.key("GPSThing"), "gpsthing");
        assert_eq!(
            CasePolicy::Insensitive.key("GPSThing"),
            CasePolicy::Insensitive.key("gpsThing")
        );
    }
}
