use std::collections::HashSet;

use meta_ads_mcp::app::App;
use meta_ads_mcp::config::{Cli, Config};
use meta_ads_mcp::managers::ads::AD_ACTIONS;
use meta_ads_mcp::managers::adsets::ADSET_ACTIONS;
use meta_ads_mcp::managers::campaigns::CAMPAIGN_ACTIONS;
use meta_ads_mcp::managers::creatives::CREATIVE_ACTIONS;
use meta_ads_mcp::managers::insights::INSIGHTS_ACTIONS;
use meta_ads_mcp::managers::media::MEDIA_ACTIONS;
use meta_ads_mcp::managers::search::SEARCH_ACTIONS;
use meta_ads_mcp::managers::targeting::TARGETING_ACTIONS;
use meta_ads_mcp::mcp::catalog::{tool_by_name, tool_catalog, validate_tool_args};
use serde_json::json;

fn full_config() -> Config {
    Config::from_cli(Cli {
        fb_token: "test-token".to_string(),
        ad_account_id: Some("act_1".to_string()),
        pixel_id: Some("px_1".to_string()),
        page_id: Some("page_1".to_string()),
        instagram_user_id: None,
        catalog_id: Some("cat_1".to_string()),
        website_domain: Some("example.com".to_string()),
    })
}

fn catalog_actions(tool: &str) -> Vec<String> {
    tool_by_name(tool)
        .expect("tool must exist in catalog")
        .input_schema["properties"]["action"]["enum"]
        .as_array()
        .expect("action enum must be an array")
        .iter()
        .map(|v| v.as_str().expect("actions are strings").to_string())
        .collect()
}

#[test]
fn catalog_names_match_wired_handlers() {
    let app = App::initialize(full_config()).expect("app must initialize");
    let wired: HashSet<&str> = app.tool_names().into_iter().collect();
    let catalog: HashSet<&str> = tool_catalog().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(wired, catalog);
}

#[test]
fn catalog_action_enums_match_manager_dispatch_tables() {
    let cases: &[(&str, &[&str])] = &[
        ("campaigns", CAMPAIGN_ACTIONS),
        ("adsets", ADSET_ACTIONS),
        ("ads", AD_ACTIONS),
        ("creatives", CREATIVE_ACTIONS),
        ("insights", INSIGHTS_ACTIONS),
        ("targeting", TARGETING_ACTIONS),
        ("search", SEARCH_ACTIONS),
        ("media", MEDIA_ACTIONS),
    ];
    for (tool, actions) in cases {
        assert_eq!(
            catalog_actions(tool),
            actions.to_vec(),
            "catalog actions for {} must match the dispatch table",
            tool
        );
    }
}

#[test]
fn every_tool_requires_an_action() {
    for tool in tool_catalog() {
        let required = tool.input_schema["required"]
            .as_array()
            .expect("required must be present");
        assert!(
            required.iter().any(|v| v == "action"),
            "{} must require an action",
            tool.name
        );
    }
}

#[test]
fn schema_validation_rejects_unknown_fields_with_suggestions() {
    let err = validate_tool_args("campaigns", &json!({"action": "get", "campain_id": "1"}))
        .expect_err("must reject");
    assert!(err.message.contains("campain_id"));
    assert!(err.message.contains("campaign_id"));
}

#[test]
fn schema_validation_accepts_a_full_create_call() {
    validate_tool_args(
        "campaigns",
        &json!({
            "action": "create_cbo",
            "name": "Summer Sale",
            "objective": "OUTCOME_SALES",
            "daily_budget": 5000,
            "bid_strategy": "LOWEST_COST_WITHOUT_CAP"
        }),
    )
    .expect("valid arguments must pass");
}

#[tokio::test]
async fn dispatch_rejects_actions_the_schema_allows_but_no_manager_knows() {
    // The catalog is the outer gate; the managers stay authoritative for
    // action names even if the two drift apart.
    let app = App::initialize(full_config()).expect("app must initialize");
    for tool in tool_catalog() {
        let err = app
            .dispatch(&tool.name, json!({"action": "definitely_not_an_action"}))
            .await
            .expect_err("unknown action must fail");
        assert!(
            err.message.contains("definitely_not_an_action"),
            "{} must name the rejected action",
            tool.name
        );
    }
}
