#![forbid(unsafe_code)]

use std::sync::Arc;

use kmeta_core::Provider;
use kmeta_generate::*;
use kmeta_store::MemoryStore;
use kmeta_validate::Validator;

#[tokio::test]
async fn generated_manifests_have_no_validation_errors() {
    let store = MemoryStore::new();
    let mc = model_config(
        &ModelConfigParams {
            name: "default-model-config".into(),
            provider: Provider::OpenAI,
            model: "gpt-4o".into(),
            api_key_secret: "openai".into(),
            api_key_secret_key: None,
            base_url: None,
        },
        "kagent",
    )
    .unwrap();
    store.seed(mc.clone()).unwrap();
    let validator = Validator::new(Arc::new(store), "kagent");

    let agent = agent(
        &AgentParams {
            name: "k8s-helper".into(),
            description: "Helps operate the cluster".into(),
            system_message: "You are a careful Kubernetes operator. Inspect resources before changing them, explain each step you take, and never delete anything without confirmation.".into(),
            model_config: "default-model-config".into(),
            tools: vec![ToolRef { mcp_server: "kagent-tools".into(), kind: String::new(), tools: vec!["k8s_get_resources".into()] }],
            skills: vec![],
        },
        "kagent",
    )
    .unwrap();
    let stdio = mcp_server(&McpServerParams { name: "fs".into(), image: "mcp/fs:1".into(), ..Default::default() }, "kagent").unwrap();
    let remote = remote_mcp_server(
        &RemoteMcpServerParams { name: "docs".into(), url: "https://mcp.example.com/mcp".into(), ..Default::default() },
        "kagent",
    )
    .unwrap();

    for m in [mc, agent, stdio, remote] {
        let issues = validator.validate(&m, true).await;
        assert!(issues.is_empty(), "{:?}: {issues:?}", m.kind());
    }
}

#[tokio::test]
async fn yaml_output_parses_back_to_the_same_tree() {
    let m = remote_mcp_server(
        &RemoteMcpServerParams { name: "docs".into(), url: "http://docs:8080/sse".into(), protocol: Some("SSE".into()), ..Default::default() },
        "team-a",
    )
    .unwrap();
    let text = m.to_yaml().unwrap();
    assert_eq!(kmeta_core::Manifest::from_yaml(&text).unwrap(), m);
}
