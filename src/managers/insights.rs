use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::graph::insights::{apply_insights_params, INSIGHTS_SPEC};
use crate::graph::params::ParamBuilder;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;

pub const INSIGHTS_ACTIONS: &[&str] = &["account", "campaign", "adset", "ad", "fetch_url"];

const DEFAULT_DATE_PRESET: &str = "last_30d";

pub struct InsightsManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl InsightsManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("insights"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "account" => {
                let act_id = self.config.require_act_id(
                    self.validation
                        .optional_string(&args, "act_id")?
                        .as_deref(),
                )?;
                self.insights_for(&act_id, "account", &args).await
            }
            "campaign" => {
                let campaign_id = self.validation.required_string(&args, "campaign_id")?;
                self.insights_for(&campaign_id, "campaign", &args).await
            }
            "adset" => {
                let adset_id = self.validation.required_string(&args, "adset_id")?;
                self.insights_for(&adset_id, "adset", &args).await
            }
            "ad" => {
                let ad_id = self.validation.required_string(&args, "ad_id")?;
                self.insights_for(&ad_id, "ad", &args).await
            }
            "fetch_url" => self.fetch_url(&args).await,
            _ => Err(unknown_action_error("insights", action, INSIGHTS_ACTIONS)),
        }
    }

    async fn insights_for(
        &self,
        object_id: &str,
        default_level: &str,
        args: &Value,
    ) -> Result<Value, ToolError> {
        let mut params = ParamBuilder::new(&INSIGHTS_SPEC);
        apply_insights_params(&mut params, args, Some(DEFAULT_DATE_PRESET))?;
        if !params.contains("level") {
            params.push("level", default_level);
        }
        self.graph
            .get(&format!("{}/insights", object_id), &params.finish())
            .await
    }

    /// Follows a paging URL from a previous insights response. The URL is
    /// opaque and already carries its cursor and credentials.
    async fn fetch_url(&self, args: &Value) -> Result<Value, ToolError> {
        let raw = self.validation.required_string(args, "url")?;
        let parsed = url::Url::parse(&raw)
            .map_err(|err| ToolError::invalid_params(format!("url is not a valid URL: {}", err)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::invalid_params(
                "url must use the http or https scheme",
            ));
        }
        self.logger.debug("fetch_url", None);
        self.graph.get_url(&raw).await
    }
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for InsightsManager {
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

    fn manager() -> InsightsManager {
        let config = Arc::new(test_config());
        let graph = Arc::new(GraphClient::new(config.clone(), Logger::new("test")).unwrap());
        InsightsManager::new(Logger::new("test"), Validation::new(), config, graph)
    }

    #[tokio::test]
    async fn campaign_insights_require_campaign_id() {
        let err = manager()
            .handle_action(json!({"action": "campaign"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("campaign_id"));
    }

    #[tokio::test]
    async fn fetch_url_rejects_non_url_input() {
        let err = manager()
            .handle_action(json!({"action": "fetch_url", "url": "not a url"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("valid URL"));
    }

    #[tokio::test]
    async fn fetch_url_rejects_non_http_schemes() {
        let err = manager()
            .handle_action(json!({"action": "fetch_url", "url": "file:///etc/passwd"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("http or https"));
    }
}
