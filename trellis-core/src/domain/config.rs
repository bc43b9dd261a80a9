//! Configuration document types
//!
//! The structured result of parsing a project's configuration file. The
//! document is transient input for one pipeline construction and is never
//! persisted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stage sequence used when a configuration declares none
pub const DEFAULT_STAGES: [&str; 3] = ["build", "test", "deploy"];

/// Stage a job lands in when it does not name one
pub const DEFAULT_STAGE: &str = "test";

/// Parsed configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Declared stage names, in execution order
    pub stages: Vec<String>,

    /// Job specifications, in declaration order
    pub jobs: Vec<JobSpec>,

    /// "Do not run CI" directive
    pub skip: bool,
}

impl ConfigDocument {
    /// Position of a stage in the declared stage sequence
    pub fn stage_index(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    /// Job specifications whose ref filters accept the given ref
    ///
    /// Declaration order is preserved.
    pub fn jobs_for_ref(&self, ref_name: &str, tag: bool, triggered: bool) -> Vec<&JobSpec> {
        self.jobs
            .iter()
            .filter(|job| job.applies_to(ref_name, tag, triggered))
            .collect()
    }
}

/// One raw job specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub stage: String,

    /// Position of `stage` in the document's stage sequence
    pub stage_idx: usize,

    /// Shell commands, newline separated
    pub commands: String,

    /// Runner tags required to pick up the job
    pub tag_list: Vec<String>,

    pub variables: HashMap<String, String>,
    pub image: Option<String>,
    pub allow_failure: bool,
    pub when: When,

    #[serde(default)]
    pub only: Vec<RefFilter>,
    #[serde(default)]
    pub except: Vec<RefFilter>,
}

impl JobSpec {
    /// Whether this job runs for the given ref
    ///
    /// A job with no `only` filters runs everywhere it is not excluded.
    pub fn applies_to(&self, ref_name: &str, tag: bool, triggered: bool) -> bool {
        let included = self.only.is_empty()
            || self
                .only
                .iter()
                .any(|f| f.matches(ref_name, tag, triggered));
        let excluded = self
            .except
            .iter()
            .any(|f| f.matches(ref_name, tag, triggered));

        included && !excluded
    }
}

/// When a build should run relative to earlier stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
}

impl When {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on_success" => Some(When::OnSuccess),
            "on_failure" => Some(When::OnFailure),
            "always" => Some(When::Always),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            When::OnSuccess => "on_success",
            When::OnFailure => "on_failure",
            When::Always => "always",
        }
    }
}

/// Entry of a job's `only` / `except` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RefFilter {
    /// Any branch
    Branches,
    /// Any tag
    Tags,
    /// Pipelines created through a trigger request
    Triggers,
    /// Exact ref name
    Name(String),
    /// `/regex/` pattern matched against the ref name
    Pattern(RefPattern),
}

impl RefFilter {
    /// Interpret one raw filter entry
    ///
    /// Keywords win over ref names; `/.../` denotes a pattern, which must
    /// compile.
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        let filter = match raw {
            "branches" => RefFilter::Branches,
            "tags" => RefFilter::Tags,
            "triggers" => RefFilter::Triggers,
            _ if raw.len() > 2 && raw.starts_with('/') && raw.ends_with('/') => {
                RefFilter::Pattern(RefPattern::new(&raw[1..raw.len() - 1])?)
            }
            _ => RefFilter::Name(raw.to_string()),
        };
        Ok(filter)
    }

    pub fn matches(&self, ref_name: &str, tag: bool, triggered: bool) -> bool {
        match self {
            RefFilter::Branches => !tag,
            RefFilter::Tags => tag,
            RefFilter::Triggers => triggered,
            RefFilter::Name(name) => name == ref_name,
            RefFilter::Pattern(pattern) => pattern.is_match(ref_name),
        }
    }
}

/// Compiled ref pattern, serialized as its source text
#[derive(Debug, Clone)]
pub struct RefPattern(Regex);

impl RefPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, ref_name: &str) -> bool {
        self.0.is_match(ref_name)
    }
}

impl PartialEq for RefPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RefPattern {}

impl Serialize for RefPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RefPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        RefPattern::new(&pattern).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(only: &[&str], except: &[&str]) -> JobSpec {
        JobSpec {
            name: "job".to_string(),
            stage: "test".to_string(),
            stage_idx: 1,
            commands: "true".to_string(),
            tag_list: vec![],
            variables: HashMap::new(),
            image: None,
            allow_failure: false,
            when: When::OnSuccess,
            only: only.iter().map(|s| RefFilter::parse(s).unwrap()).collect(),
            except: except.iter().map(|s| RefFilter::parse(s).unwrap()).collect(),
        }
    }

    #[test]
    fn test_parse_filter_keywords() {
        let parse = |raw| RefFilter::parse(raw).unwrap();
        assert_eq!(parse("branches"), RefFilter::Branches);
        assert_eq!(parse("tags"), RefFilter::Tags);
        assert_eq!(parse("triggers"), RefFilter::Triggers);
        assert_eq!(parse("main"), RefFilter::Name("main".to_string()));
        assert_eq!(
            parse("/^release-.*$/"),
            RefFilter::Pattern(RefPattern::new("^release-.*$").unwrap())
        );
        assert_eq!(parse("/"), RefFilter::Name("/".to_string()));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(RefFilter::parse("/[/").is_err());
        assert!(RefFilter::parse("[").is_ok());
    }

    #[test]
    fn test_pattern_deserialized_compiled() {
        let filter: RefFilter =
            serde_json::from_str(r#"{"kind":"pattern","value":"^v[0-9]"}"#).unwrap();
        assert!(filter.matches("v1.0", true, false));
        assert!(!filter.matches("main", false, false));
        assert_eq!(
            serde_json::to_string(&filter).unwrap(),
            r#"{"kind":"pattern","value":"^v[0-9]"}"#
        );

        let invalid = serde_json::from_str::<RefFilter>(r#"{"kind":"pattern","value":"["}"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_job_without_filters_runs_everywhere() {
        let job = job(&[], &[]);
        assert!(job.applies_to("main", false, false));
        assert!(job.applies_to("v1.0", true, false));
    }

    #[test]
    fn test_only_tags() {
        let job = job(&["tags"], &[]);
        assert!(job.applies_to("v1.0", true, false));
        assert!(!job.applies_to("main", false, false));
    }

    #[test]
    fn test_except_wins_over_only() {
        let job = job(&["branches"], &["main"]);
        assert!(job.applies_to("feature", false, false));
        assert!(!job.applies_to("main", false, false));
    }

    #[test]
    fn test_pattern_and_trigger_filters() {
        let job = job(&["/^release-/", "triggers"], &[]);
        assert!(job.applies_to("release-1.2", false, false));
        assert!(job.applies_to("main", false, true));
        assert!(!job.applies_to("main", false, false));
    }

    #[test]
    fn test_jobs_for_ref_keeps_declaration_order() {
        let doc = ConfigDocument {
            stages: vec!["build".to_string(), "test".to_string()],
            jobs: vec![
                JobSpec { name: "a".to_string(), ..job(&[], &[]) },
                JobSpec { name: "b".to_string(), ..job(&["tags"], &[]) },
                JobSpec { name: "c".to_string(), ..job(&[], &[]) },
            ],
            skip: false,
        };

        let names: Vec<_> = doc
            .jobs_for_ref("main", false, false)
            .into_iter()
            .map(|j| j.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(doc.stage_index("test"), Some(1));
        assert_eq!(doc.stage_index("deploy"), None);
    }
}
