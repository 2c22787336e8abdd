//! Names of provider operations.
//!
//! A provider connection exposes its calls as `<verb>_<kind>`, with the kind in lower case and
//! words separated by underscores, so `get` on a `ReplicationController` is called
//! `get_replication_controller`. Listing uses the plural: `get_services`. These names are only
//! used at the provider boundary, in logs, and in errors; dispatch itself is typed.
use lazy_static::lazy_static;
use regex::Regex;

use std::fmt::{self, Display};

lazy_static! {
    static ref ACRONYM_BOUNDARY: Regex = Regex::new("([A-Z\\d]+)([A-Z][a-z])").unwrap();
    static ref WORD_BOUNDARY: Regex = Regex::new("([a-z\\d])([A-Z])").unwrap();
    static ref PLURAL_RULES: Vec<(Regex, &'static str)> = vec![
        (Regex::new("(?i)(quiz)$").unwrap(), "${1}zes"),
        (Regex::new("(?i)(matr|vert|ind)(?:ix|ex)$").unwrap(), "${1}ices"),
        (Regex::new("(?i)(x|ch|ss|sh)$").unwrap(), "${1}es"),
        (Regex::new("(?i)([^aeiouy]|qu)y$").unwrap(), "${1}ies"),
        (Regex::new("(?i)(?:([^f])fe|([lr])f)$").unwrap(), "${1}${2}ves"),
        (Regex::new("(?i)sis$").unwrap(), "ses"),
        (Regex::new("(?i)([ti])um$").unwrap(), "${1}a"),
        (Regex::new("(?i)(alias|status)$").unwrap(), "${1}es"),
        (Regex::new("(?i)(bu)s$").unwrap(), "${1}ses"),
        (Regex::new("(?i)s$").unwrap(), "s"),
        (Regex::new("$").unwrap(), "s"),
    ];
}

const UNCOUNTABLE: &[&str] = &["equipment", "information", "metadata", "series", "species"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Patch,
    Update,
    Delete,
}

impl Verb {
    /// The verb as it appears in operation names. Listing is a `get` of the plural kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Verb::Get | Verb::List => "get",
            Verb::Create => "create",
            Verb::Patch => "patch",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

/// A verb applied to a provider kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub verb: Verb,
    pub kind: String,
}

impl Operation {
    pub fn new(verb: Verb, kind: impl Into<String>) -> Operation {
        Operation {
            verb,
            kind: kind.into(),
        }
    }

    /// The name the provider connection knows this operation by
    pub fn method_name(&self) -> String {
        let kind = underscore(&self.kind);
        match self.verb {
            Verb::List => format!("{}_{}", self.verb.prefix(), pluralize(&kind)),
            _ => format!("{}_{}", self.verb.prefix(), kind),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.method_name())
    }
}

/// Converts a CamelCase kind into lower case words separated by underscores.
/// Runs of capitals are kept together, so `APIService` becomes `api_service`.
pub fn underscore(word: &str) -> String {
    let word = ACRONYM_BOUNDARY.replace_all(word, "${1}_${2}");
    let word = WORD_BOUNDARY.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_lowercase()
}

/// Returns the plural form of an english noun. Words that are already plural are left alone.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if UNCOUNTABLE.iter().any(|u| lower.ends_with(u)) {
        return word.to_owned();
    }
    for (rule, replacement) in PLURAL_RULES.iter() {
        if rule.is_match(word) {
            return rule.replace(word, *replacement).into_owned();
        }
    }
    word.to_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn underscores_kinds() {
        assert_eq!("replication_controller", underscore("ReplicationController"));
        assert_eq!("service", underscore("Service"));
        assert_eq!("build_config", underscore("BuildConfig"));
        assert_eq!("persistent_volume_claim", underscore("PersistentVolumeClaim"));
        assert_eq!("api_service", underscore("APIService"));
        assert_eq!("already_lower", underscore("already_lower"));
    }

    #[test]
    fn pluralizes_kinds() {
        assert_eq!("services", pluralize("service"));
        assert_eq!("build_configs", pluralize("build_config"));
        assert_eq!("policies", pluralize("policy"));
        assert_eq!("ingresses", pluralize("ingress"));
        assert_eq!("statuses", pluralize("status"));
        assert_eq!("endpoints", pluralize("endpoints"));
        assert_eq!("services", pluralize("services"));
        assert_eq!("gateways", pluralize("gateway"));
        assert_eq!("metadata", pluralize("metadata"));
    }

    #[test]
    fn builds_method_names() {
        assert_eq!("get_replication_controller", Operation::new(Verb::Get, "ReplicationController").method_name());
        assert_eq!("get_services", Operation::new(Verb::List, "Service").method_name());
        assert_eq!("get_build_configs", Operation::new(Verb::List, "BuildConfig").method_name());
        assert_eq!("get_services", Operation::new(Verb::List, "Services").method_name());
        assert_eq!("create_route", Operation::new(Verb::Create, "Route").method_name());
        assert_eq!("patch_service", Operation::new(Verb::Patch, "Service").method_name());
        assert_eq!("update_resource_quota", Operation::new(Verb::Update, "ResourceQuota").method_name());
        assert_eq!("delete_limit_range", Operation::new(Verb::Delete, "LimitRange").method_name());
    }
}
