//! Agents wired with the real adapters against in-process tool servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;
use docent::adapters::{remote_tools, RemoteTools, DETAILS_TOOL_NAME, LIST_TOOL_NAME};
use docent::agent::{AgentFactory, SYSTEM_INSTRUCTION};
use docent::channel::RemoteOperation;
use docent::retrieval::{RetrievalTool, RETRIEVAL_TOOL_NAME};
use docent::session::{EvictionPolicy, SessionCache};
use docent::tools::SharedTool;
use docent::types::Role;

fn factory(provider: Arc<MockProvider>) -> AgentFactory {
    AgentFactory::new(Arc::new(MockFactory(provider)), test_config().model)
}

fn policy() -> EvictionPolicy {
    EvictionPolicy {
        idle_ttl: Duration::from_secs(600),
        check_delay: Duration::from_secs(300),
    }
}

fn details_payload() -> serde_json::Value {
    json!({
        "Button": {
            "props": [{"name": "variant", "type": "'primary' | 'ghost'", "default": "'primary'"}]
        },
        "Ghost": null
    })
}

#[tokio::test]
async fn component_tools_answer_spec_questions() {
    let server = FakeToolServer::new(json!(["Button", "Card"]), details_payload());
    let index = StaticIndex::new(button_passages());
    let provider = MockProvider::with_turns([
        MockTurn::tool_call("c1", LIST_TOOL_NAME, json!({})),
        MockTurn::tool_call("c2", DETAILS_TOOL_NAME, json!({"componentNames": ["Button", "Ghost"]})),
        MockTurn::text("Button takes a variant prop defaulting to 'primary'. There is no Ghost component."),
    ]);

    let mut tools: Vec<SharedTool> = remote_tools(server.clone());
    tools.push(Arc::new(RetrievalTool::new(index.clone(), 5)));
    let agent = factory(provider.clone()).build_for_session("alice", tools).unwrap();

    let result = agent
        .execute_detailed("What props does Button take, and what about Ghost?")
        .await
        .unwrap();

    let called: Vec<&str> = result.invocations.iter().map(|i| i.call.name.as_str()).collect();
    assert_eq!(called, vec![LIST_TOOL_NAME, DETAILS_TOOL_NAME]);
    assert_eq!(
        server.operations(),
        vec![RemoteOperation::ListComponents, RemoteOperation::ComponentDetails]
    );
    assert!(index.queries().is_empty());

    let details = &result.invocations[1].result.result;
    assert_eq!(details["success"], true);
    assert_eq!(details["data"]["notFound"], json!(["Ghost"]));
    assert_eq!(details["data"]["found"][0]["name"], "Button");
    assert!(details["message"].as_str().unwrap().contains("no record for: Ghost"));

    let first = &provider.requests()[0];
    assert_eq!(first.messages[0].role, Role::System);
    assert_eq!(first.messages[0].text(), SYSTEM_INSTRUCTION);
    let advertised: Vec<String> = first
        .tools
        .as_ref()
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(advertised, vec![LIST_TOOL_NAME, DETAILS_TOOL_NAME, RETRIEVAL_TOOL_NAME]);
}

#[tokio::test]
async fn comprehensive_answers_combine_both_sources() {
    let server = FakeToolServer::new(json!(["Button"]), details_payload());
    let index = StaticIndex::new(button_passages());
    let provider = MockProvider::with_turns([
        MockTurn::tool_call("c1", DETAILS_TOOL_NAME, json!({"componentNames": ["button"]})),
        MockTurn::tool_call("c2", RETRIEVAL_TOOL_NAME, json!({"query": "Button usage"})),
        MockTurn::text("Use <Button variant=\"primary\">Save</Button>."),
    ]);

    let mut tools: Vec<SharedTool> = remote_tools(server.clone());
    tools.push(Arc::new(RetrievalTool::new(index.clone(), 5)));
    let agent = factory(provider).build(tools).unwrap();

    let result = agent.execute_detailed("How do I use Button?").await.unwrap();

    assert_eq!(result.invocations.len(), 2);
    assert_eq!(result.invocations[0].result.result["data"]["notFound"], json!([]));
    assert_eq!(index.queries(), vec!["Button usage"]);
    assert_eq!(result.invocations[1].result.result["count"], 2);
    assert_eq!(result.text, "Use <Button variant=\"primary\">Save</Button>.");
}

#[tokio::test]
async fn unreachable_tool_server_leaves_retrieval_only_agents() {
    let provider = MockProvider::with_turns([
        MockTurn::tool_call("c1", RETRIEVAL_TOOL_NAME, json!({"query": "Button"})),
        MockTurn::text("Button renders a clickable control."),
    ]);
    let remote: Arc<dyn RemoteTools> = unreachable_channel();
    let cache = SessionCache::new(factory(provider.clone()), ready_index(), remote, policy());

    let agent = cache.get_or_create("alice").await.unwrap();
    assert_eq!(agent.tool_names(), vec![RETRIEVAL_TOOL_NAME]);

    let answer = agent.execute("What is Button?").await.unwrap();
    assert_eq!(answer, "Button renders a clickable control.");
}

#[tokio::test]
async fn adapters_report_an_unreachable_server_as_data() {
    let provider = MockProvider::with_turns([
        MockTurn::tool_call("c1", LIST_TOOL_NAME, json!({})),
        MockTurn::text("The component list is unavailable right now."),
    ]);
    let mut tools: Vec<SharedTool> = remote_tools(unreachable_channel());
    tools.push(Arc::new(RetrievalTool::new(StaticIndex::new(Vec::new()), 5)));
    let agent = factory(provider).build(tools).unwrap();

    let result = agent.execute_detailed("List every component").await.unwrap();

    let envelope = &result.invocations[0].result;
    assert!(!envelope.is_error);
    assert_eq!(envelope.result["success"], false);
    assert!(envelope.result["error"].as_str().is_some());
    assert_eq!(result.text, "The component list is unavailable right now.");
}

#[tokio::test]
async fn history_carries_tool_results_into_the_next_turn() {
    let server = FakeToolServer::new(json!(["Button", "Card"]), details_payload());
    let provider = MockProvider::with_turns([
        MockTurn::tool_call("c1", LIST_TOOL_NAME, json!({})),
        MockTurn::text("There are two components."),
        MockTurn::text("Button and Card."),
    ]);
    let agent = factory(provider.clone())
        .build(remote_tools(server))
        .unwrap();

    agent.execute("How many components are there?").await.unwrap();
    agent.execute("Which ones?").await.unwrap();

    let last = provider.requests().pop().unwrap();
    let roles: Vec<Role> = last.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::User,
        ]
    );
}
