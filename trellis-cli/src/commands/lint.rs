//! Local configuration linting
//!
//! Parses a configuration file with the same parser the orchestrator uses
//! and prints the builds a pipeline for the given ref would get.

use anyhow::{Context, Result};
use colored::*;
use trellis_config::LuaConfigParser;
use trellis_core::ParseError;
use trellis_core::domain::config::{ConfigDocument, JobSpec};
use trellis_core::ports::ConfigParser;
use trellis_core::service::stage;

/// Lint `path` and print the planned builds for `ref_name`
pub fn lint_file(path: &str, ref_name: &str, tag: bool) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;

    let document = match LuaConfigParser::new().parse(&source, path) {
        Ok(document) => document,
        Err(ParseError::Validation(message)) => {
            println!("{}", "✗ Invalid configuration".red().bold());
            println!("  {}", message);
            anyhow::bail!("{} is invalid", path);
        }
        Err(ParseError::Internal(message)) => {
            anyhow::bail!("Failed to evaluate {}: {}", path, message);
        }
    };

    println!("{}", "✓ Configuration is valid".green().bold());
    println!("  Stages: {}", document.stages.join(", ").dimmed());
    if document.skip {
        println!(
            "  {}",
            "Skip directive set: pipelines are skipped unless forced".yellow()
        );
    }
    println!();

    let jobs = plan(&document, ref_name, tag);
    if jobs.is_empty() {
        println!(
            "{}",
            format!("No builds for {}.", ref_name).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!("Builds for {} ({}):", ref_name, jobs.len()).bold()
    );
    let mut current_stage: Option<&str> = None;
    for job in jobs {
        if current_stage != Some(job.stage.as_str()) {
            println!("  {} {}", "▸".cyan(), job.stage.bold());
            current_stage = Some(job.stage.as_str());
        }
        println!("    - {} {}", job.name, job.when.as_str().dimmed());
    }

    Ok(())
}

/// Jobs a pipeline for the ref would get, in build order
fn plan<'d>(document: &'d ConfigDocument, ref_name: &str, tag: bool) -> Vec<&'d JobSpec> {
    stage::ordered_jobs(document, ref_name, tag, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        return trellis.define {
            jobs = {
                { name = "release", stage = "deploy", script = "make release", only = { "tags" } },
                { name = "unit", script = "cargo test" },
                { name = "compile", stage = "build", script = "cargo build" },
            },
        }
    "#;

    fn names(jobs: &[&JobSpec]) -> Vec<String> {
        jobs.iter().map(|j| j.name.clone()).collect()
    }

    #[test]
    fn test_plan_for_branch() {
        let document = LuaConfigParser::new().parse(SOURCE, "lint").unwrap();
        assert_eq!(names(&plan(&document, "main", false)), vec!["compile", "unit"]);
    }

    #[test]
    fn test_plan_for_tag() {
        let document = LuaConfigParser::new().parse(SOURCE, "lint").unwrap();
        assert_eq!(
            names(&plan(&document, "v1.0", true)),
            vec!["compile", "unit", "release"]
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(lint_file("/nonexistent/.trellis.lua", "main", false).is_err());
    }
}
