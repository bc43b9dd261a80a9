//! Configuration Loader
//!
//! Fetches the configuration file of a commit and parses it. Every failure is
//! folded into a [`LoadedConfig`] variant; nothing is propagated as a fault.

use std::sync::Arc;

use crate::domain::commit::Commit;
use crate::domain::config::ConfigDocument;
use crate::domain::project::Project;
use crate::error::{ParseError, PipelineError};
use crate::ports::{ConfigParser, ConfigStore};

/// Result of loading the configuration for one commit
///
/// Computed once per pipeline construction and passed to every gate that
/// needs it.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedConfig {
    /// The commit carries no configuration file
    Missing,
    /// The parser rejected the document
    Invalid(String),
    /// The parser or the store failed internally
    Failed,
    Loaded(ConfigDocument),
}

impl LoadedConfig {
    /// Skip directive; `false` unless a document was loaded
    pub fn skip(&self) -> bool {
        matches!(self, LoadedConfig::Loaded(doc) if doc.skip)
    }

    pub fn document(&self) -> Option<&ConfigDocument> {
        match self {
            LoadedConfig::Loaded(doc) => Some(doc),
            _ => None,
        }
    }

    /// Rejection for every variant but `Loaded`
    pub fn error(&self) -> Option<PipelineError> {
        match self {
            LoadedConfig::Missing => Some(PipelineError::ConfigurationMissing),
            LoadedConfig::Invalid(message) => {
                Some(PipelineError::ConfigurationInvalid(message.clone()))
            }
            LoadedConfig::Failed => Some(PipelineError::ConfigurationInternalError),
            LoadedConfig::Loaded(_) => None,
        }
    }
}

pub struct ConfigLoader<'a> {
    store: &'a dyn ConfigStore,
    parser: Arc<dyn ConfigParser>,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(store: &'a dyn ConfigStore, parser: Arc<dyn ConfigParser>) -> Self {
        Self { store, parser }
    }

    /// Fetch and parse the configuration of `commit`
    ///
    /// Parsing runs on the blocking pool. If the returned future is dropped
    /// the parse still runs to completion, bounded by the parser's own limits.

    pub async fn load(&self, project: &Project, commit: &Commit) -> LoadedConfig {
        let raw = match self.store.fetch_document(project, commit).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No configuration file at {}", commit.id);
                return LoadedConfig::Missing;
            }
            Err(e) => {
                tracing::error!("Failed to fetch configuration at {}: {}", commit.id, e);
                return LoadedConfig::Failed;
            }
        };

        let parser = Arc::clone(&self.parser);
        let namespace = project.path_with_namespace.clone();
        let parsed = tokio::task::spawn_blocking(move || parser.parse(&raw, &namespace)).await;

        match parsed {
            Ok(Ok(document)) => LoadedConfig::Loaded(document),
            Ok(Err(ParseError::Validation(message))) => {
                tracing::debug!("Invalid configuration at {}: {}", commit.id, message);
                LoadedConfig::Invalid(message)
            }
            Ok(Err(ParseError::Internal(detail))) => {
                tracing::error!("Configuration parser failed at {}: {}", commit.id, detail);
                LoadedConfig::Failed
            }
            Err(e) if e.is_panic() => {
                tracing::error!("Configuration parser panicked at {}", commit.id);
                LoadedConfig::Failed
            }
            Err(e) => {
                tracing::error!("Configuration parser task failed at {}: {}", commit.id, e);
                LoadedConfig::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeRepository, ParserBehavior, StaticParser, document, project};
    use std::time::Duration;

    const SHA: &str = "deadbeef";

    #[tokio::test]
    async fn test_missing_document() {
        let repo = FakeRepository::new().with_branch("main", SHA);
        let parser = Arc::new(StaticParser::new(ParserBehavior::Document(document(&[], &[]))));

        let loaded = ConfigLoader::new(&repo, parser.clone())
            .load(&project(), &Commit::new(SHA))
            .await;

        assert_eq!(loaded, LoadedConfig::Missing);
        assert_eq!(loaded.error(), Some(PipelineError::ConfigurationMissing));
        assert_eq!(parser.calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_error_keeps_message() {
        let repo = FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, "return 42");
        let parser = Arc::new(StaticParser::new(ParserBehavior::Fail(ParseError::Validation(
            "configuration must return a table".to_string(),
        ))));

        let loaded = ConfigLoader::new(&repo, parser.clone())
            .load(&project(), &Commit::new(SHA))
            .await;

        assert_eq!(
            loaded.error().map(|e| e.to_string()),
            Some("configuration must return a table".to_string())
        );
        assert!(!loaded.skip());
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let repo = FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, "return {}");
        let parser = Arc::new(StaticParser::new(ParserBehavior::Fail(ParseError::Internal(
            "sandbox exploded at 0x7f".to_string(),
        ))));

        let loaded = ConfigLoader::new(&repo, parser.clone())
            .load(&project(), &Commit::new(SHA))
            .await;

        assert_eq!(loaded, LoadedConfig::Failed);
        assert_eq!(loaded.error().unwrap().to_string(), "Undefined error");
    }

    #[tokio::test]
    async fn test_parser_panic_is_contained() {
        let repo = FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, "return {}");
        let parser = Arc::new(StaticParser::new(ParserBehavior::Panic));

        let loaded = ConfigLoader::new(&repo, parser.clone())
            .load(&project(), &Commit::new(SHA))
            .await;

        assert_eq!(loaded, LoadedConfig::Failed);
        assert_eq!(parser.calls(), 1);
    }

    #[tokio::test]
    async fn test_skip_directive() {
        let repo = FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, "return {}");
        let mut doc = document(&["build"], &[("compile", "build")]);
        doc.skip = true;
        let parser = Arc::new(StaticParser::new(ParserBehavior::Document(doc)));

        let loaded = ConfigLoader::new(&repo, parser.clone())
            .load(&project(), &Commit::new(SHA))
            .await;

        assert!(loaded.skip());
        assert!(loaded.error().is_none());
        assert_eq!(loaded.document().unwrap().jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_parser_does_not_block_runtime() {
        let repo = FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, "return {}");
        let parser = Arc::new(StaticParser::new(ParserBehavior::Sleep(
            Duration::from_millis(500),
        )));
        let project = project();
        let commit = Commit::new(SHA);
        let loader = ConfigLoader::new(&repo, parser.clone());

        let timer_won = tokio::select! {
            _ = loader.load(&project, &commit) => false,
            _ = tokio::time::sleep(Duration::from_millis(50)) => true,
        };

        assert!(timer_won);
        assert_eq!(parser.calls(), 1);
    }
}
