use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Config;
use crate::constants::{limits, statuses};
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::graph::params::{Encode, ParamBuilder, ParamSpec};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;

pub const CAMPAIGN_ACTIONS: &[&str] = &[
    "create_cbo",
    "create_abo",
    "update_budget",
    "set_status",
    "get",
    "list_by_account",
];

const CAPPED_BID_STRATEGIES: &[&str] = &["LOWEST_COST_WITH_BID_CAP", "COST_CAP"];

const CREATE_SPEC: ParamSpec = ParamSpec::new(&[
    ("special_ad_categories", Encode::JsonBlob),
    ("ab_test_control_setups", Encode::JsonBlob),
    ("daily_budget", Encode::NumericString),
    ("lifetime_budget", Encode::NumericString),
    ("bid_amount", Encode::NumericString),
    ("spend_cap", Encode::NumericString),
]);

const UPDATE_SPEC: ParamSpec = ParamSpec::new(&[
    ("daily_budget", Encode::NumericString),
    ("lifetime_budget", Encode::NumericString),
]);

const LIST_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("filtering", Encode::JsonBlob),
    ("time_range", Encode::JsonBlob),
    ("effective_status", Encode::JsonBlob),
    ("special_ad_categories", Encode::JsonBlob),
    ("objective", Encode::JsonBlob),
    ("buyer_guarantee_agreement_status", Encode::JsonBlob),
    ("is_completed", Encode::BoolString),
    ("include_drafts", Encode::BoolString),
]);

const GET_SPEC: ParamSpec = ParamSpec::new(&[("fields", Encode::CsvList)]);

pub struct CampaignManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl CampaignManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("campaigns"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "create_cbo" => self.create_cbo(&args).await,
            "create_abo" => self.create_abo(&args).await,
            "update_budget" => self.update_budget(&args).await,
            "set_status" => self.set_status(&args).await,
            "get" => self.get(&args).await,
            "list_by_account" => self.list_by_account(&args).await,
            _ => Err(unknown_action_error("campaigns", action, CAMPAIGN_ACTIONS)),
        }
    }

    fn create_status(&self, args: &Value) -> Result<String, ToolError> {
        match args.get("status") {
            None => Ok("PAUSED".to_string()),
            Some(value) if value.is_null() => Ok("PAUSED".to_string()),
            Some(_) => self.validation.ensure_status(args, "status", statuses::CREATE),
        }
    }

    fn resolve_act_id(&self, args: &Value) -> Result<String, ToolError> {
        let explicit = self.validation.optional_string(args, "act_id")?;
        self.config.require_act_id(explicit.as_deref())
    }

    /// Budget and bidding live at the campaign level; the API requires at
    /// least one budget and an explicit bid amount for capped strategies.
    async fn create_cbo(&self, args: &Value) -> Result<Value, ToolError> {
        let name = self.validation.required_string(args, "name")?;
        let objective = self.validation.required_string(args, "objective")?;
        let act_id = self.resolve_act_id(args)?;
        let status = self.create_status(args)?;

        let has_daily = provided(args, "daily_budget");
        let has_lifetime = provided(args, "lifetime_budget");
        if !has_daily && !has_lifetime {
            return Err(ToolError::invalid_params(
                "CBO campaigns require either daily_budget or lifetime_budget",
            ));
        }

        let bid_strategy = self
            .validation
            .optional_string(args, "bid_strategy")?
            .unwrap_or_else(|| "LOWEST_COST_WITHOUT_CAP".to_string());
        if CAPPED_BID_STRATEGIES.contains(&bid_strategy.as_str()) && !provided(args, "bid_amount") {
            return Err(ToolError::invalid_params(format!(
                "bid_amount is required when bid_strategy is {}",
                bid_strategy
            )));
        }

        let buying_type = self
            .validation
            .optional_string(args, "buying_type")?
            .unwrap_or_else(|| "AUCTION".to_string());

        let mut params = ParamBuilder::new(&CREATE_SPEC);
        params
            .push("name", name)
            .push("objective", objective)
            .push("status", status)
            .push("campaign_budget_optimization", "true")
            .push("buying_type", buying_type)
            .push("bid_strategy", bid_strategy);
        params.set("daily_budget", args.get("daily_budget"))?;
        params.set("lifetime_budget", args.get("lifetime_budget"))?;
        params.set("bid_amount", args.get("bid_amount"))?;
        params.set("spend_cap", args.get("spend_cap"))?;
        // Both arrays are required by the API even when empty.
        params.set("special_ad_categories", Some(&json!([])))?;
        params.set("ab_test_control_setups", Some(&json!([])))?;

        self.logger.info("create_cbo", Some(&json!({"act_id": act_id})));
        self.graph
            .post_form(&format!("{}/campaigns", act_id), &params.finish())
            .await
    }

    /// ABO campaigns carry no budget or bidding parameters at all; those are
    /// set on each ad set instead.
    async fn create_abo(&self, args: &Value) -> Result<Value, ToolError> {
        let name = self.validation.required_string(args, "name")?;
        let objective = self
            .validation
            .optional_string(args, "objective")?
            .unwrap_or_else(|| "OUTCOME_SALES".to_string());
        let act_id = self.resolve_act_id(args)?;
        let status = self.create_status(args)?;
        let buying_type = self
            .validation
            .optional_string(args, "buying_type")?
            .unwrap_or_else(|| "AUCTION".to_string());

        let mut params = ParamBuilder::new(&CREATE_SPEC);
        params
            .push("name", name)
            .push("objective", objective)
            .push("status", status)
            .push("campaign_budget_optimization", "false")
            .push("buying_type", buying_type);
        params.set("special_ad_categories", Some(&json!([])))?;
        params.set("ab_test_control_setups", Some(&json!([])))?;

        self.logger.info("create_abo", Some(&json!({"act_id": act_id})));
        self.graph
            .post_form(&format!("{}/campaigns", act_id), &params.finish())
            .await
    }

    async fn update_budget(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        if !provided(args, "daily_budget") && !provided(args, "lifetime_budget") {
            return Err(ToolError::invalid_params(
                "Either daily_budget or lifetime_budget must be provided",
            ));
        }
        let mut params = ParamBuilder::new(&UPDATE_SPEC);
        params.set("daily_budget", args.get("daily_budget"))?;
        params.set("lifetime_budget", args.get("lifetime_budget"))?;
        self.graph.post_form(&campaign_id, &params.finish()).await
    }

    async fn set_status(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        let status = self
            .validation
            .ensure_status(args, "status", statuses::LIFECYCLE)?;
        self.logger.info(
            "set_status",
            Some(&json!({"campaign_id": campaign_id, "status": status})),
        );
        let mut params = ParamBuilder::new(&UPDATE_SPEC);
        params.push("status", status);
        self.graph.post_form(&campaign_id, &params.finish()).await
    }

    async fn get(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        let mut params = ParamBuilder::new(&GET_SPEC);
        params.set("fields", args.get("fields"))?;
        params.set("date_format", args.get("date_format"))?;
        self.graph.get(&campaign_id, &params.finish()).await
    }

    async fn list_by_account(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.resolve_act_id(args)?;
        let mut params = ParamBuilder::new(&LIST_SPEC);
        for key in [
            "fields",
            "filtering",
            "after",
            "before",
            "date_preset",
            "time_range",
            "updated_since",
            "effective_status",
            "is_completed",
            "special_ad_categories",
            "objective",
            "buyer_guarantee_agreement_status",
            "date_format",
            "include_drafts",
        ] {
            params.set(key, args.get(key))?;
        }
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);
        params.push("limit", limit.to_string());
        self.graph
            .get(&format!("{}/campaigns", act_id), &params.finish())
            .await
    }
}

fn provided(args: &Value, key: &str) -> bool {
    matches!(args.get(key), Some(value) if !value.is_null())
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for CampaignManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;

    fn manager() -> CampaignManager {
        let config = Arc::new(test_config());
        let graph = Arc::new(GraphClient::new(config.clone(), Logger::new("test")).unwrap());
        CampaignManager::new(Logger::new("test"), Validation::new(), config, graph)
    }

    #[tokio::test]
    async fn create_cbo_requires_a_budget() {
        let err = manager()
            .handle_action(json!({
                "action": "create_cbo",
                "name": "Summer Sale",
                "objective": "OUTCOME_SALES",
            }))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("daily_budget or lifetime_budget"));
    }

    #[tokio::test]
    async fn create_cbo_requires_bid_amount_for_capped_strategies() {
        let err = manager()
            .handle_action(json!({
                "action": "create_cbo",
                "name": "Summer Sale",
                "objective": "OUTCOME_SALES",
                "daily_budget": 5000,
                "bid_strategy": "COST_CAP",
            }))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("bid_amount"));
    }

    #[tokio::test]
    async fn set_status_rejects_unknown_status() {
        let err = manager()
            .handle_action(json!({
                "action": "set_status",
                "campaign_id": "123",
                "status": "RUNNING",
            }))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("RUNNING"));
    }

    #[tokio::test]
    async fn unknown_action_suggests_known_one() {
        let err = manager()
            .handle_action(json!({"action": "create_coo"}))
            .await
            .expect_err("must fail");
        let details = err.details.expect("details");
        assert!(details["known_actions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "create_cbo"));
    }
}
