//! Pipeline assembly with a configuration file that never terminates.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trellis_config::LuaConfigParser;
use trellis_core::CreatePipelineService;
use trellis_core::PipelineError;
use trellis_core::dto::pipeline::CreatePipeline;
use trellis_core::fakes::{FakeRepository, InMemoryStore, StaticAuthz, project, user};
use trellis_core::service::create_pipeline::Collaborators;

const SHA: &str = "deadbeef";
const LOOPING_CONFIG: &str = "while true do end";

fn service(parser: LuaConfigParser, store: Arc<InMemoryStore>) -> CreatePipelineService {
    let repo = Arc::new(
        FakeRepository::new()
            .with_branch("main", SHA)
            .with_document(SHA, LOOPING_CONFIG),
    );

    CreatePipelineService::new(Collaborators {
        refs: repo.clone(),
        commits: repo.clone(),
        configs: repo,
        parser: Arc::new(parser),
        authz: Arc::new(StaticAuthz::allow()),
        pipelines: store.clone(),
        builds: store,
    })
}

#[tokio::test]
async fn test_looping_config_is_rejected_as_invalid() {
    let store = Arc::new(InMemoryStore::new());
    let service = service(LuaConfigParser::new(), store.clone());

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        service.execute(&project(), &user(), &CreatePipeline::new("main")),
    )
    .await
    .expect("instruction limit should stop the configuration");

    match outcome.errors() {
        [PipelineError::ConfigurationInvalid(message)] => {
            assert!(message.contains("instruction limit"), "{}", message);
        }
        other => panic!("expected an invalid configuration, got {:?}", other),
    }

    let pipelines = store.pipelines();
    assert_eq!(pipelines.len(), 1);
    assert!(pipelines[0].yaml_errors.is_some());
    assert!(store.builds().is_empty());
}

#[tokio::test]
async fn test_cancellation_interrupts_long_running_config() {
    let store = Arc::new(InMemoryStore::new());
    let parser = LuaConfigParser::new().with_instruction_limit(200_000_000);
    let service = service(parser, store.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        service.execute_with_cancellation(
            &project(),
            &user(),
            &CreatePipeline::new("main"),
            &cancel,
        ),
    )
    .await
    .expect("cancellation should be observed while the configuration runs");

    assert_eq!(outcome.errors(), &[PipelineError::Cancelled]);
    assert!(store.pipelines().is_empty());
}
