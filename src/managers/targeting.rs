use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Config;
use crate::constants::{fields, limits};
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::graph::params::{Encode, ParamBuilder, ParamSpec};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;

pub const TARGETING_ACTIONS: &[&str] = &["search_interests", "region_keys", "list_pixels"];

const SEARCH_SPEC: ParamSpec = ParamSpec::new(&[("location_types", Encode::JsonBlob)]);

const LIST_SPEC: ParamSpec = ParamSpec::new(&[("fields", Encode::CsvList)]);

pub struct TargetingManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl TargetingManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("targeting"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "search_interests" => self.search_interests(&args).await,
            "region_keys" => self.region_keys(&args).await,
            "list_pixels" => self.list_pixels(&args).await,
            _ => Err(unknown_action_error(
                "targeting",
                action,
                TARGETING_ACTIONS,
            )),
        }
    }

    /// Keyword search over the ad interest database. Returned ids go straight
    /// into targeting `interests` entries.
    async fn search_interests(&self, args: &Value) -> Result<Value, ToolError> {
        let query = self.validation.required_string(args, "query")?;
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);
        let locale = self
            .validation
            .optional_string(args, "locale")?
            .unwrap_or_else(|| "pt_BR".to_string());

        let mut params = ParamBuilder::new(&SEARCH_SPEC);
        params
            .push("type", "adinterest")
            .push("q", query)
            .push("limit", limit.to_string())
            .push("locale", locale);
        self.graph.get("search", &params.finish()).await
    }

    /// Resolves a region name to its targeting key. The best match is lifted
    /// to the top level and the full match list is kept for reference.
    async fn region_keys(&self, args: &Value) -> Result<Value, ToolError> {
        let region_name = self.validation.required_string(args, "region_name")?;
        let country_code = self
            .validation
            .optional_string(args, "country_code")?
            .unwrap_or_else(|| "BR".to_string());

        let mut params = ParamBuilder::new(&SEARCH_SPEC);
        params
            .push("type", "adgeolocation")
            .push("q", region_name.clone())
            .push("country_code", country_code.clone());
        params.set("location_types", Some(&json!(["region"])))?;

        let response = self.graph.get("search", &params.finish()).await?;
        let matches = response
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let Some(best) = matches.first() else {
            return Err(ToolError::not_found("No matching region found")
                .with_hint("Try using the full state name or check spelling")
                .with_details(json!({
                    "region_name": region_name,
                    "country_code": country_code,
                })));
        };

        Ok(json!({
            "key": best.get("key").cloned().unwrap_or(Value::Null),
            "name": best.get("name").cloned().unwrap_or(Value::Null),
            "type": best.get("type").cloned().unwrap_or(Value::Null),
            "country_code": best.get("country_code").cloned().unwrap_or(Value::Null),
            "country_name": best.get("country_name").cloned().unwrap_or(Value::Null),
            "supports_region": best.get("supports_region").cloned().unwrap_or(json!(true)),
            "supports_city": best.get("supports_city").cloned().unwrap_or(json!(false)),
            "all_matches": matches,
        }))
    }

    async fn list_pixels(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.config.require_act_id(
            self.validation
                .optional_string(args, "act_id")?
                .as_deref(),
        )?;
        let mut params = ParamBuilder::new(&LIST_SPEC);
        match args.get("fields") {
            Some(value) if !value.is_null() => params.set("fields", Some(value))?,
            _ => params.push("fields", fields::PIXEL_DEFAULT.join(",")),
        };
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);
        params.push("limit", limit.to_string());
        self.graph
            .get(&format!("{}/adspixels", act_id), &params.finish())
            .await
    }
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for TargetingManager {
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

    fn manager() -> TargetingManager {
        let config = Arc::new(test_config());
        let graph = Arc::new(GraphClient::new(config.clone(), Logger::new("test")).unwrap());
        TargetingManager::new(Logger::new("test"), Validation::new(), config, graph)
    }

    #[tokio::test]
    async fn search_interests_requires_query() {
        let err = manager()
            .handle_action(json!({"action": "search_interests"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("query"));
    }

    #[tokio::test]
    async fn region_keys_requires_region_name() {
        let err = manager()
            .handle_action(json!({"action": "region_keys"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("region_name"));
    }
}
