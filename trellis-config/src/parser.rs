//! Configuration parser
//!
//! Evaluates a configuration file in the sandbox and validates the returned
//! table. Stage and job shapes are checked here so that a [`ConfigDocument`]
//! handed to the pipeline assembler is always internally consistent: every
//! job names a declared stage and every ref pattern compiles.

use mlua::{Table, Value};
use std::collections::{HashMap, HashSet};

use trellis_core::domain::config::{
    ConfigDocument, DEFAULT_STAGE, DEFAULT_STAGES, JobSpec, RefFilter, When,
};
use trellis_core::error::ParseError;
use trellis_core::ports::ConfigParser;

use crate::sandbox::{SandboxLimits, create_sandbox};

const ROOT_KEYS: [&str; 6] = [
    "stages",
    "skip",
    "image",
    "before_script",
    "variables",
    "jobs",
];

const JOB_KEYS: [&str; 11] = [
    "name",
    "stage",
    "script",
    "before_script",
    "tags",
    "only",
    "except",
    "variables",
    "image",
    "when",
    "allow_failure",
];

/// [`ConfigParser`] for Lua configuration files
///
/// Each call evaluates the file in a fresh sandbox; nothing is shared between
/// calls. A file that exceeds the sandbox limits is rejected as invalid.
///
/// # Example
/// ```no_run
/// use trellis_config::LuaConfigParser;
/// use trellis_core::ports::ConfigParser;
///
/// let source = r#"
///     return trellis.define {
///         stages = { "build", "test" },
///         jobs = {
///             { name = "compile", stage = "build", script = { "cargo build" } },
///             { name = "unit", script = "cargo test" },
///         },
///     }
/// "#;
///
/// let document = LuaConfigParser::new().parse(source, "acme/widgets")?;
/// assert_eq!(document.jobs.len(), 2);
/// assert_eq!(document.jobs[1].stage, "test");
/// # Ok::<(), trellis_core::ParseError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LuaConfigParser {
    limits: SandboxLimits,
}

impl LuaConfigParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn with_memory_limit(mut self, memory: usize) -> Self {
        self.limits.memory = memory;
        self
    }

    pub fn with_instruction_limit(mut self, instructions: u64) -> Self {
        self.limits.instructions = instructions;
        self
    }
}

impl ConfigParser for LuaConfigParser {
    fn parse(&self, raw: &str, namespace: &str) -> Result<ConfigDocument, ParseError> {
        let lua = create_sandbox(self.limits)
            .map_err(|e| ParseError::Internal(format!("Failed to create sandbox: {}", e)))?;

        let value: Value = lua
            .load(raw)
            .set_name(format!("={}", namespace))
            .eval()
            .map_err(|e| invalid(format!("Invalid configuration: {}", e)))?;

        let document = parse_document(value)?;

        tracing::debug!(
            "Parsed configuration of {}: {} stage(s), {} job(s)",
            namespace,
            document.stages.len(),
            document.jobs.len()
        );

        Ok(document)
    }
}

/// Defaults inherited by every job
struct Globals {
    image: Option<String>,
    before_script: Vec<String>,
    variables: HashMap<String, String>,
}

fn parse_document(value: Value) -> Result<ConfigDocument, ParseError> {
    let root = match value {
        Value::Table(table) => table,
        other => {
            return Err(invalid(format!(
                "Configuration should return a table, got {}",
                other.type_name()
            )));
        }
    };
    ensure_known_keys(&root, &ROOT_KEYS, "root config")?;

    let stages = parse_stages(field(&root, "stages")?)?;
    let skip = optional_bool(field(&root, "skip")?, "skip")?.unwrap_or(false);

    let globals = Globals {
        image: optional_string(field(&root, "image")?, "image")?,
        before_script: string_array(field(&root, "before_script")?, "before_script")?
            .unwrap_or_default(),
        variables: string_map(field(&root, "variables")?, "variables")?.unwrap_or_default(),
    };

    let job_values = match field(&root, "jobs")? {
        Value::Nil => return Err(invalid("jobs config should be defined".to_string())),
        value => array(value, "jobs")?,
    };

    let mut names = HashSet::new();
    let mut jobs = Vec::with_capacity(job_values.len());

    for (i, value) in job_values.into_iter().enumerate() {
        let job = parse_job(value, i + 1, &stages, &globals)?;
        if !names.insert(job.name.clone()) {
            return Err(invalid(format!(
                "jobs:{} is defined more than once",
                job.name
            )));
        }
        jobs.push(job);
    }

    Ok(ConfigDocument { stages, jobs, skip })
}

fn parse_stages(value: Value) -> Result<Vec<String>, ParseError> {
    let stages = match string_array(value, "stages")? {
        None => return Ok(DEFAULT_STAGES.iter().map(|s| s.to_string()).collect()),
        Some(stages) => stages,
    };

    if stages.is_empty() {
        return Err(invalid(
            "stages should contain at least one stage".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stage in &stages {
        if stage.is_empty() {
            return Err(invalid("stages should not contain empty names".to_string()));
        }
        if !seen.insert(stage.as_str()) {
            return Err(invalid(format!("stage {} is declared more than once", stage)));
        }
    }

    Ok(stages)
}

fn parse_job(
    value: Value,
    position: usize,
    stages: &[String],
    globals: &Globals,
) -> Result<JobSpec, ParseError> {
    let table = match value {
        Value::Table(table) => table,
        _ => {
            return Err(invalid(format!(
                "jobs[{}] config should be a table",
                position
            )));
        }
    };

    let name = match optional_string(field(&table, "name")?, &format!("jobs[{}] name", position))? {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Err(invalid(format!(
                "jobs[{}] should have a non-empty name",
                position
            )));
        }
    };
    let ctx = format!("jobs:{}", name);
    ensure_known_keys(&table, &JOB_KEYS, &format!("{} config", ctx))?;

    let stage = optional_string(field(&table, "stage")?, &format!("{} stage", ctx))?
        .unwrap_or_else(|| DEFAULT_STAGE.to_string());
    let stage_idx = stages.iter().position(|s| *s == stage).ok_or_else(|| {
        invalid(format!(
            "{} stage parameter should be {}",
            ctx,
            stages.join(", ")
        ))
    })?;

    let script = parse_script(field(&table, "script")?, &ctx)?;
    let before_script = string_array(
        field(&table, "before_script")?,
        &format!("{} before_script", ctx),
    )?
    .unwrap_or_else(|| globals.before_script.clone());

    let commands = before_script
        .into_iter()
        .chain(script)
        .collect::<Vec<_>>()
        .join("\n");

    let tag_list =
        string_array(field(&table, "tags")?, &format!("{} tags", ctx))?.unwrap_or_default();

    let only = parse_filters(field(&table, "only")?, &format!("{} only", ctx))?;
    let except = parse_filters(field(&table, "except")?, &format!("{} except", ctx))?;

    let mut variables = globals.variables.clone();
    if let Some(own) = string_map(field(&table, "variables")?, &format!("{} variables", ctx))? {
        variables.extend(own);
    }

    let image = optional_string(field(&table, "image")?, &format!("{} image", ctx))?
        .or_else(|| globals.image.clone());

    let when = match optional_string(field(&table, "when")?, &format!("{} when", ctx))? {
        None => When::default(),
        Some(raw) => When::parse(&raw).ok_or_else(|| {
            invalid(format!(
                "{} when parameter should be on_success, on_failure or always",
                ctx
            ))
        })?,
    };

    let allow_failure =
        optional_bool(field(&table, "allow_failure")?, &format!("{} allow_failure", ctx))?
            .unwrap_or(false);

    Ok(JobSpec {
        name,
        stage,
        stage_idx,
        commands,
        tag_list,
        variables,
        image,
        allow_failure,
        when,
        only,
        except,
    })
}

/// `script` is a string or a non-empty array of strings
fn parse_script(value: Value, ctx: &str) -> Result<Vec<String>, ParseError> {
    let what = format!("{} script", ctx);
    match value {
        Value::Nil => Err(invalid(format!("{} should be defined", what))),
        Value::String(s) => Ok(vec![lua_string(&s, &what)?]),
        other => {
            let lines = string_array(other, &what)?.unwrap_or_default();
            if lines.is_empty() {
                return Err(invalid(format!("{} should not be empty", what)));
            }
            Ok(lines)
        }
    }
}

fn parse_filters(value: Value, what: &str) -> Result<Vec<RefFilter>, ParseError> {
    let entries = string_array(value, what)?.unwrap_or_default();

    entries
        .iter()
        .map(|raw| {
            RefFilter::parse(raw)
                .map_err(|e| invalid(format!("{} has an invalid pattern {}: {}", what, raw, e)))
        })
        .collect()
}

// =============================================================================
// Value helpers
// =============================================================================

fn invalid(message: String) -> ParseError {
    ParseError::Validation(message)
}

fn internal(e: mlua::Error) -> ParseError {
    ParseError::Internal(e.to_string())
}

// Raw access keeps metamethods of the returned table from running
fn field(table: &Table, key: &str) -> Result<Value, ParseError> {
    table.raw_get::<Value>(key).map_err(internal)
}

fn ensure_known_keys(table: &Table, known: &[&str], what: &str) -> Result<(), ParseError> {
    let mut unknown = Vec::new();

    for pair in table.pairs::<Value, Value>() {
        let (key, _) = pair.map_err(internal)?;
        match key {
            Value::String(s) => {
                let key = lua_string(&s, what)?;
                if !known.contains(&key.as_str()) {
                    unknown.push(key);
                }
            }
            other => unknown.push(format!("[{}]", other.type_name())),
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        unknown.sort();
        Err(invalid(format!(
            "{} contains unknown keys: {}",
            what,
            unknown.join(", ")
        )))
    }
}

fn lua_string(s: &mlua::String, what: &str) -> Result<String, ParseError> {
    s.to_str()
        .map(|s| s.to_string())
        .map_err(|_| invalid(format!("{} should be valid UTF-8", what)))
}

fn optional_string(value: Value, what: &str) -> Result<Option<String>, ParseError> {
    match value {
        Value::Nil => Ok(None),
        Value::String(s) => lua_string(&s, what).map(Some),
        _ => Err(invalid(format!("{} should be a string", what))),
    }
}

fn optional_bool(value: Value, what: &str) -> Result<Option<bool>, ParseError> {
    match value {
        Value::Nil => Ok(None),
        Value::Boolean(b) => Ok(Some(b)),
        _ => Err(invalid(format!("{} should be a boolean", what))),
    }
}

/// Values of a sequence table with no holes and no extra keys
fn array(value: Value, what: &str) -> Result<Vec<Value>, ParseError> {
    let table = match value {
        Value::Table(table) => table,
        _ => return Err(invalid(format!("{} should be an array", what))),
    };

    let len = table.raw_len();
    let mut count = 0;
    for pair in table.pairs::<Value, Value>() {
        let (key, _) = pair.map_err(internal)?;
        match key {
            Value::Integer(i) if i >= 1 && (i as usize) <= len => count += 1,
            _ => return Err(invalid(format!("{} should be an array", what))),
        }
    }
    if count != len {
        return Err(invalid(format!("{} should be an array", what)));
    }

    (1..=len)
        .map(|i| table.raw_get::<Value>(i).map_err(internal))
        .collect()
}

fn string_array(value: Value, what: &str) -> Result<Option<Vec<String>>, ParseError> {
    if value.is_nil() {
        return Ok(None);
    }

    let values = array(value, what).map_err(|_| {
        invalid(format!("{} should be an array of strings", what))
    })?;

    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => lua_string(&s, what),
            _ => Err(invalid(format!("{} should be an array of strings", what))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn string_map(value: Value, what: &str) -> Result<Option<HashMap<String, String>>, ParseError> {
    let table = match value {
        Value::Nil => return Ok(None),
        Value::Table(table) => table,
        _ => return Err(invalid(format!("{} should be a table of strings", what))),
    };

    let mut map = HashMap::new();
    for pair in table.pairs::<Value, Value>() {
        let (key, value) = pair.map_err(internal)?;
        match (key, value) {
            (Value::String(k), Value::String(v)) => {
                map.insert(lua_string(&k, what)?, lua_string(&v, what)?);
            }
            _ => {
                return Err(invalid(format!(
                    "{} should map string keys to string values",
                    what
                )));
            }
        }
    }

    Ok(Some(map))
}
