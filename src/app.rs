use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::managers::ads::AdManager;
use crate::managers::adsets::AdsetManager;
use crate::managers::campaigns::CampaignManager;
use crate::managers::creatives::CreativeManager;
use crate::managers::insights::InsightsManager;
use crate::managers::media::MediaManager;
use crate::managers::search::SearchManager;
use crate::managers::targeting::TargetingManager;
use crate::managers::ToolHandler;
use crate::services::logger::Logger;
use crate::services::validation::Validation;

/// Wires the shared Graph client into every tool manager and routes calls by
/// tool name.
pub struct App {
    logger: Logger,
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl App {
    pub fn initialize(config: Config) -> Result<Self, ToolError> {
        let logger = Logger::new("meta-ads");
        let config = Arc::new(config);
        let validation = Validation::new();
        let graph = Arc::new(GraphClient::new(config.clone(), logger.child("graph"))?);

        let mut handlers: HashMap<&'static str, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(
            "campaigns",
            Arc::new(CampaignManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "adsets",
            Arc::new(AdsetManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "ads",
            Arc::new(AdManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "creatives",
            Arc::new(CreativeManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "insights",
            Arc::new(InsightsManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "targeting",
            Arc::new(TargetingManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "search",
            Arc::new(SearchManager::new(
                logger.clone(),
                validation.clone(),
                config.clone(),
                graph.clone(),
            )),
        );
        handlers.insert(
            "media",
            Arc::new(MediaManager::new(
                logger.clone(),
                validation.clone(),
                config,
                graph,
            )),
        );

        logger.info(
            "initialized",
            Some(&serde_json::json!({"tools": handlers.len()})),
        );
        Ok(Self { logger, handlers })
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            return Err(ToolError::not_found(format!("Unknown tool: {}", tool))
                .with_details(serde_json::json!({"known_tools": self.tool_names()})));
        };
        self.logger.debug("dispatch", Some(&serde_json::json!({"tool": tool})));
        handler.handle(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool() {
        let app = App::initialize(test_config()).unwrap();
        let err = app
            .dispatch("accounts", serde_json::json!({"action": "list"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("accounts"));
        let known = err.details.unwrap()["known_tools"].clone();
        assert!(known.as_array().unwrap().iter().any(|v| v == "campaigns"));
    }

    #[test]
    fn every_tool_is_wired() {
        let app = App::initialize(test_config()).unwrap();
        assert_eq!(
            app.tool_names(),
            vec![
                "ads",
                "adsets",
                "campaigns",
                "creatives",
                "insights",
                "media",
                "search",
                "targeting"
            ]
        );
    }
}
