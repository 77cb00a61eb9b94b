//! 工作流集成测试：完整组装的引擎 + 桩视觉模型 / 桩工具 / 离线或脚本化 Agent

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{json, Value};

use nutrilens::config::{AppConfig, Secrets};
use nutrilens::llm::{ImageInput, MockLlmClient, MockVisionClassifier, VisionClassifier, VisionError};
use nutrilens::react::{ReactAgent, TallyAgent};
use nutrilens::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use nutrilens::tools::{LocalToolSource, RemoteToolGateway, Tool, ToolRegistry};
use nutrilens::workflow::{NodeName, Route, TurnInput, WorkflowEngine, WorkflowError};
use nutrilens::EngineBuilder;

/// 桩 Nutritionix：已知食物返回 foods[]，其它返回上游错误
struct StubNutrition;

#[async_trait]
impl Tool for StubNutrition {
    fn name(&self) -> &str {
        "nutrition_fetch"
    }

    fn description(&self) -> &str {
        "Fetch nutrition facts for a natural-language food query"
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = args["query"].as_str().unwrap_or_default();
        Ok(match query {
            "1 large apple" => json!({"foods": [{"food_name": "apple", "nf_calories": 116.0, "nf_protein": 0.6}]}),
            "2 medium banana" => json!({"foods": [{"food_name": "banana", "nf_calories": 210.0, "nf_protein": 2.6}]}),
            "1 slice bread" => json!({"foods": [{"food_name": "bread", "nf_calories": 77.0, "nf_protein": 2.6}]}),
            _ => json!({"error": "We couldn't match any of your foods"}),
        })
    }
}

fn tools() -> Arc<LocalToolSource> {
    let mut registry = ToolRegistry::new();
    registry.register(StubNutrition);
    Arc::new(LocalToolSource::new(registry))
}

fn offline_engine(vision: Arc<dyn VisionClassifier>, store: Arc<dyn SessionStore>) -> WorkflowEngine {
    EngineBuilder::new(AppConfig::default(), Secrets::default())
        .with_store(store)
        .with_vision(vision)
        .with_agent(Arc::new(TallyAgent::new()))
        .with_tool_source(tools())
        .build()
}

const LISTING: &str = "Food Items:\n- apple (1, large)\n- banana (2, medium)";

fn jpeg() -> TurnInput {
    TurnInput::image(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg")
}

#[tokio::test]
async fn test_image_turn_identifies_then_aggregates() {
    let engine = offline_engine(
        Arc::new(MockVisionClassifier::returning(LISTING)),
        Arc::new(MemorySessionStore::new()),
    );
    let out = engine.invoke("thread-a", jpeg()).await.unwrap();

    assert_eq!(out.route, Route::Identify);
    assert_eq!(out.visited, vec![NodeName::Identify, NodeName::FetchAggregate]);
    assert!(!out.visited.contains(&NodeName::FollowUp));
    assert_eq!(out.food_items.as_deref(), Some(LISTING));
    assert_eq!(
        out.result.as_deref(),
        Some(
            "- 1 large apple: 116 kcal, 0.6 g protein\n\
             - 2 medium banana: 210 kcal, 2.6 g protein\n\
             - Total: 326 kcal, 3.2 g protein"
        )
    );
    assert!(out.user_result.is_none());
}

#[tokio::test]
async fn test_image_with_query_and_carried_result_goes_to_follow_up() {
    let vision = Arc::new(MockVisionClassifier::returning(LISTING));
    let engine = offline_engine(vision.clone(), Arc::new(MemorySessionStore::new()));
    engine.invoke("t", jpeg()).await.unwrap();

    let mut input = jpeg();
    input.user_query = Some("and the protein?".into());
    let out = engine.invoke("t", input).await.unwrap();
    assert_eq!(out.route, Route::FollowUp);
    assert_eq!(vision.call_count(), 1);
}

#[tokio::test]
async fn test_follow_up_uses_prior_result_as_context() {
    let llm = Arc::new(MockLlmClient::scripted([
        r#"{"tool": "nutrition_fetch", "args": {"query": "1 slice bread"}}"#,
        "- Bread: 77 kcal, 2.6 g protein\n- Total: 403 kcal, 5.8 g protein",
    ]));
    let engine = EngineBuilder::new(AppConfig::default(), Secrets::default())
        .with_store(Arc::new(MemorySessionStore::new()))
        .with_vision(Arc::new(MockVisionClassifier::returning("unused")))
        .with_agent(Arc::new(ReactAgent::new(llm.clone())))
        .with_tool_source(tools())
        .build();

    let out = engine
        .invoke(
            "t",
            TurnInput::question("You missed a slice of bread").with_result("- Total: 326 kcal, 3.2 g protein"),
        )
        .await
        .unwrap();
    assert_eq!(out.route, Route::FollowUp);
    assert_eq!(out.visited, vec![NodeName::FollowUp]);
    assert_eq!(
        out.user_result.as_deref(),
        Some("- Bread: 77 kcal, 2.6 g protein\n- Total: 403 kcal, 5.8 g protein")
    );

    let calls = llm.calls();
    let first_user = &calls[0][1].content;
    assert!(first_user.starts_with("Previous nutrition analysis: - Total: 326 kcal"));
    assert!(first_user.contains("User question: You missed a slice of bread"));
    assert!(calls[1].last().unwrap().content.contains("\"nf_calories\":77.0"));
}

#[tokio::test]
async fn test_hello_without_result_returns_placeholder() {
    let engine = offline_engine(
        Arc::new(MockVisionClassifier::returning("unused")),
        Arc::new(MemorySessionStore::new()),
    );
    let out = engine.invoke("t", TurnInput::question("hello")).await.unwrap();
    assert_eq!(out.route, Route::FollowUp);
    assert_eq!(out.user_result.as_deref(), Some("No result yet."));
    assert!(out.result.is_none());
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let engine = offline_engine(
        Arc::new(MockVisionClassifier::returning(LISTING)),
        Arc::new(MemorySessionStore::new()),
    );
    let first = engine.invoke("t1", jpeg()).await.unwrap();
    let second = engine.invoke("t2", jpeg()).await.unwrap();
    let again = engine.invoke("t1", jpeg()).await.unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.result, again.result);
    assert_eq!(again.turn, 2);
}

#[tokio::test]
async fn test_mixed_tool_results_still_total() {
    let listing = "Food Items:\n- apple (1, large)\n- dragonfruit smoothie (1, cup)\n- slice (1, bread)";
    let engine = offline_engine(
        Arc::new(MockVisionClassifier::returning(listing)),
        Arc::new(MemorySessionStore::new()),
    );
    let out = engine.invoke("t", jpeg()).await.unwrap();
    let result = out.result.unwrap();
    assert!(result.contains("- 1 large apple: 116 kcal"));
    assert!(result.contains("- 1 cup dragonfruit smoothie: unavailable (We couldn't match any of your foods)"));
    assert!(result.ends_with("- Total: 116 kcal, 0.6 g protein (excluding 2 unavailable items)"));
}

#[tokio::test]
async fn test_agent_failure_degrades_to_fixed_message() {
    let engine = EngineBuilder::new(AppConfig::default(), Secrets::default())
        .with_store(Arc::new(MemorySessionStore::new()))
        .with_vision(Arc::new(MockVisionClassifier::returning(LISTING)))
        .with_agent(Arc::new(ReactAgent::new(Arc::new(MockLlmClient::failing("upstream 500")))))
        .with_tool_source(tools())
        .build();

    let out = engine.invoke("t", jpeg()).await.unwrap();
    assert_eq!(out.result.as_deref(), Some("Unable to fetch calories."));

    let out = engine.invoke("t", TurnInput::question("why?")).await.unwrap();
    assert_eq!(
        out.user_result.as_deref(),
        Some("Unable to answer that right now. Please try again.")
    );
}

#[tokio::test]
async fn test_classifier_failure_writes_no_checkpoint() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let good = offline_engine(Arc::new(MockVisionClassifier::returning(LISTING)), store.clone());
    good.invoke("t", jpeg()).await.unwrap();
    let before = store.get("t").await.unwrap().unwrap();

    let broken = offline_engine(Arc::new(MockVisionClassifier::failing(VisionError::EmptyResponse)), store.clone());
    let err = broken.invoke("t", jpeg()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Classifier(VisionError::EmptyResponse)));
    assert_eq!(store.get("t").await.unwrap().unwrap(), before);

    let err = broken.invoke("fresh", jpeg()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Classifier(_)));
    assert!(store.get("fresh").await.unwrap().is_none());
}

/// 每个线程的图片字节不同，视觉模型按字节给出不同清单
struct ByteVision;

#[async_trait]
impl VisionClassifier for ByteVision {
    async fn classify(&self, image: &ImageInput, _instruction: &str) -> Result<String, VisionError> {
        tokio::task::yield_now().await;
        let item = match image.len() % 3 {
            0 => "apple (1, large)",
            1 => "banana (2, medium)",
            _ => "bread (1, slice)",
        };
        Ok(format!("Food Items:\n- {item}"))
    }
}

#[tokio::test]
async fn test_interleaved_threads_stay_isolated() {
    let engine = Arc::new(offline_engine(Arc::new(ByteVision), Arc::new(MemorySessionStore::new())));
    let expected = ["1 large apple", "2 medium banana", "1 slice bread"];

    let uploads = (0..9).map(|i| {
        let engine = engine.clone();
        async move {
            let bytes = vec![0u8; 3 + i % 3];
            engine
                .invoke(&format!("user-{i}"), TurnInput::image(bytes, "image/png"))
                .await
                .unwrap()
        }
    });
    let outputs = join_all(uploads).await;
    for (i, out) in outputs.iter().enumerate() {
        assert_eq!(out.thread_id, format!("user-{i}"));
        assert!(out.result.as_deref().unwrap().starts_with(&format!("- {}", expected[i % 3])));
    }

    let questions = (0..9).map(|i| {
        let engine = engine.clone();
        async move { engine.invoke(&format!("user-{i}"), TurnInput::question("totals?")).await.unwrap() }
    });
    for (i, out) in join_all(questions).await.into_iter().enumerate() {
        assert_eq!(out.turn, 2);
        assert!(out.user_result.as_deref().unwrap().contains(expected[i % 3]));
        for (j, other) in expected.iter().enumerate() {
            if j != i % 3 {
                assert!(!out.user_result.as_deref().unwrap().contains(other));
            }
        }
    }
    assert_eq!(engine.store().thread_count().await.unwrap(), 9);
}

#[tokio::test]
async fn test_sqlite_checkpoints_survive_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    {
        let store = Arc::new(SqliteSessionStore::open(&path).unwrap());
        let engine = offline_engine(Arc::new(MockVisionClassifier::returning(LISTING)), store);
        engine.invoke("t", jpeg()).await.unwrap();
    }

    let store = Arc::new(SqliteSessionStore::open(&path).unwrap());
    let engine = offline_engine(Arc::new(MockVisionClassifier::returning("unused")), store);
    let out = engine.invoke("t", TurnInput::question("what did I eat?")).await.unwrap();
    assert_eq!(out.route, Route::FollowUp);
    assert_eq!(out.turn, 2);
    assert!(out.user_result.unwrap().ends_with("- Total: 326 kcal, 3.2 g protein"));
}

#[tokio::test]
async fn test_unreachable_tool_gateway_runs_with_no_tools() {
    let engine = EngineBuilder::new(AppConfig::default(), Secrets::default())
        .with_store(Arc::new(MemorySessionStore::new()))
        .with_vision(Arc::new(MockVisionClassifier::returning(LISTING)))
        .with_agent(Arc::new(TallyAgent::new()))
        .with_tool_source(Arc::new(RemoteToolGateway::new("http://127.0.0.1:9/mcp", 1)))
        .build();
    let out = engine.invoke("t", jpeg()).await.unwrap();
    let result = out.result.unwrap();
    assert!(result.contains("1 large apple: unavailable (nutrition tool unavailable)"));
    assert!(result.ends_with("(excluding 2 unavailable items)"));
}
