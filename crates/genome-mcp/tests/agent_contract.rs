//! Service-level scenarios: the agent contract, impact analysis, and
//! query projection over a real scratch repository.

use genome_engine::ScanConfig;
use genome_mcp::GenomeService;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::CallToolResult;
use serde_json::Value;
use std::path::Path;

mod support {
    use super::*;

    pub fn payload(result: &CallToolResult) -> Value {
        let text = result.content.as_ref().expect("content")[0]
            .as_text()
            .expect("text content")
            .text
            .clone();
        serde_json::from_str(&text).expect("json payload")
    }

    pub fn is_error(result: &CallToolResult) -> bool {
        result.is_error == Some(true)
    }

    pub fn service(root: &Path) -> GenomeService {
        GenomeService::new(root.to_path_buf(), ScanConfig::default())
    }

    /// Repo where `auth.login_user` has twelve statically visible callers.
    pub fn hub_repo(root: &Path) {
        std::fs::write(root.join("auth.py"), "def login_user():\n    pass\n").unwrap();
        for i in 0..12 {
            let body = if i == 0 {
                // One caller is an entry point so flows traverse the hub.
                "from auth import login_user\n\n\nif __name__ == \"__main__\":\n    login_user()\n"
                    .to_string()
            } else {
                "from auth import login_user\n\nlogin_user()\n".to_string()
            };
            std::fs::write(root.join(format!("caller_{i:02}.py")), body).unwrap();
        }
    }
}

use support::*;

#[tokio::test]
async fn update_without_load_is_a_contract_violation() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "def hello():\n    pass\n").unwrap();
    let service = service(dir.path());

    let result = service
        .update(Parameters(genome_mcp::schemas::UpdateRequest {
            reason: "edit".into(),
            added: None,
            removed: None,
            updated: None,
        }))
        .await
        .unwrap();

    assert!(is_error(&result));
    let envelope = payload(&result);
    assert_eq!(envelope["code"], "contract-violation");
    assert_eq!(envelope["details"]["code"], "missing-load");
}

#[tokio::test]
async fn impact_on_a_hub_requires_approval() {
    let dir = tempfile::TempDir::new().unwrap();
    hub_repo(dir.path());
    let service = service(dir.path());

    let scan = service
        .scan(Parameters(genome_mcp::schemas::ScanRequest {
            scope: None,
            incremental: Some(false),
        }))
        .await
        .unwrap();
    assert!(!is_error(&scan), "scan failed: {:?}", payload(&scan));

    // Satisfy the load rule via the summary resource.
    service.read_resource_value("genome://summary").unwrap();

    let result = service
        .impact(Parameters(genome_mcp::schemas::ImpactRequest {
            affected_nodes: vec!["auth.login_user".into()],
            operation: Some("delete".into()),
        }))
        .await
        .unwrap();
    assert!(!is_error(&result));
    let report = payload(&result);

    assert!(report["risk"].as_f64().unwrap() >= 0.7, "risk {report}");
    assert!(!report["affected_flows"].as_array().unwrap().is_empty());
    assert_eq!(report["requires_approval"], true);
}

#[tokio::test]
async fn queries_block_between_impact_and_update() {
    let dir = tempfile::TempDir::new().unwrap();
    hub_repo(dir.path());
    let service = service(dir.path());

    service
        .scan(Parameters(genome_mcp::schemas::ScanRequest {
            scope: None,
            incremental: Some(false),
        }))
        .await
        .unwrap();
    service.read_resource_value("genome://current").unwrap();

    service
        .impact(Parameters(genome_mcp::schemas::ImpactRequest {
            affected_nodes: vec!["auth.login_user".into()],
            operation: Some("modify".into()),
        }))
        .await
        .unwrap();

    // Reader tools are blocked until the session updates.
    let blocked = service
        .query(Parameters(genome_mcp::schemas::QueryRequest {
            predicate: None,
            page: None,
            page_size: None,
            fields: None,
            ids_only: None,
            max_summary_length: None,
        }))
        .await
        .unwrap();
    assert!(is_error(&blocked));
    assert_eq!(payload(&blocked)["details"]["code"], "pending-update");

    let update = service
        .update(Parameters(genome_mcp::schemas::UpdateRequest {
            reason: "renamed login_user callers".into(),
            added: None,
            removed: None,
            updated: Some(vec!["auth.login_user".into()]),
        }))
        .await
        .unwrap();
    assert!(!is_error(&update), "update failed: {:?}", payload(&update));

    let unblocked = service
        .query(Parameters(genome_mcp::schemas::QueryRequest {
            predicate: None,
            page: None,
            page_size: None,
            fields: None,
            ids_only: None,
            max_summary_length: None,
        }))
        .await
        .unwrap();
    assert!(!is_error(&unblocked));
}

#[tokio::test]
async fn query_projection_returns_exactly_the_requested_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("lib.py"),
        "def alpha():\n    pass\n\n\ndef beta():\n    pass\n\n\ndef gamma():\n    pass\n\n\ndef delta():\n    pass\n",
    )
    .unwrap();
    let service = service(dir.path());

    service
        .scan(Parameters(genome_mcp::schemas::ScanRequest {
            scope: None,
            incremental: Some(false),
        }))
        .await
        .unwrap();
    service.read_resource_value("genome://current").unwrap();

    let result = service
        .query(Parameters(genome_mcp::schemas::QueryRequest {
            predicate: Some(serde_json::json!({"type": "function", "language": "Python"})),
            page: Some(1),
            page_size: Some(3),
            fields: Some(vec!["id".into(), "f".into()]),
            ids_only: Some(false),
            max_summary_length: None,
        }))
        .await
        .unwrap();
    assert!(!is_error(&result));
    let page = payload(&result);

    assert_eq!(page["total_count"], 4);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        let object = item.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("id"));
        assert!(object.contains_key("f"));
    }
}

#[tokio::test]
async fn context_round_trip_with_explain_and_feedback() {
    let dir = tempfile::TempDir::new().unwrap();
    hub_repo(dir.path());
    let service = service(dir.path());

    service
        .scan(Parameters(genome_mcp::schemas::ScanRequest {
            scope: None,
            incremental: Some(false),
        }))
        .await
        .unwrap();
    service.read_resource_value("genome://current").unwrap();

    let built = service
        .build_context(Parameters(genome_mcp::schemas::BuildContextRequest {
            goal: "understand auth login".into(),
            budget_tokens: Some(2000),
            must_include: None,
            exclude: None,
            session_id: None,
        }))
        .await
        .unwrap();
    assert!(!is_error(&built));
    let context = payload(&built);
    let context_id = context["context_id"].as_str().unwrap().to_string();
    assert!(!context["items"].as_array().unwrap().is_empty());

    let explained = service
        .explain_context(Parameters(genome_mcp::schemas::ContextIdRequest {
            context_id: context_id.clone(),
        }))
        .await
        .unwrap();
    assert!(!is_error(&explained));
    assert_eq!(payload(&explained)["goal"], "understand auth login");

    // A query touching the selected nodes moves the counters.
    service
        .search(Parameters(genome_mcp::schemas::SearchRequest {
            query: "auth login".into(),
            node_type: None,
            language: None,
            file_pattern: None,
            limit: Some(10),
        }))
        .await
        .unwrap();

    let feedback = service
        .get_context_feedback(Parameters(genome_mcp::schemas::ContextIdRequest {
            context_id,
        }))
        .await
        .unwrap();
    assert!(!is_error(&feedback));
    let counters = payload(&feedback);
    assert!(counters["hits"].as_u64().unwrap() + counters["misses"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn resources_expose_lite_and_stats_views() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "def hello():\n    pass\n").unwrap();
    let service = service(dir.path());

    service
        .scan(Parameters(genome_mcp::schemas::ScanRequest {
            scope: None,
            incremental: Some(false),
        }))
        .await
        .unwrap();

    let lite = service
        .read_resource_value("genome://current/brief")
        .unwrap();
    assert_eq!(lite["metadata"]["mode"], "lite");
    assert!(lite["nodes"]["main.hello"]["type"].is_string());
    // Lite drops non-required node fields.
    assert!(lite["nodes"]["main.hello"].get("visibility").is_none());

    let stats = service.read_resource_value("genome://stats").unwrap();
    assert!(stats["nodes"].as_u64().unwrap() >= 2);

    let summary = service
        .read_resource_value("genome://summary?fields=ep")
        .unwrap();
    assert!(summary["ep"].as_array().is_some());
}
