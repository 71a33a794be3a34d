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

pub const AD_ACTIONS: &[&str] = &[
    "create",
    "edit",
    "bulk_update_status",
    "get",
    "list_by_account",
    "list_by_campaign",
    "list_by_adset",
    "get_creative",
];

const WRITE_SPEC: ParamSpec = ParamSpec::new(&[("creative", Encode::JsonBlob)]);

const LIST_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("filtering", Encode::JsonBlob),
    ("effective_status", Encode::JsonBlob),
]);

const GET_SPEC: ParamSpec = ParamSpec::new(&[("fields", Encode::CsvList)]);

pub struct AdManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl AdManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("ads"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "create" => self.create(&args).await,
            "edit" => self.edit(&args).await,
            "bulk_update_status" => self.bulk_update_status(&args).await,
            "get" => self.get(&args).await,
            "list_by_account" => self.list_by_account(&args).await,
            "list_by_campaign" => self.list_by_campaign(&args).await,
            "list_by_adset" => self.list_by_adset(&args).await,
            "get_creative" => self.get_creative(&args).await,
            _ => Err(unknown_action_error("ads", action, AD_ACTIONS)),
        }
    }

    /// Creates an ad in an ad set referencing an existing creative by id.
    async fn create(&self, args: &Value) -> Result<Value, ToolError> {
        let adset_id = self.validation.required_string(args, "adset_id")?;
        let creative_id = self.validation.required_string(args, "creative_id")?;
        let name = self.validation.required_string(args, "name")?;
        let act_id = self.config.require_act_id(
            self.validation
                .optional_string(args, "act_id")?
                .as_deref(),
        )?;
        let status = match args.get("status") {
            None => "PAUSED".to_string(),
            Some(value) if value.is_null() => "PAUSED".to_string(),
            Some(_) => self.validation.ensure_status(args, "status", statuses::CREATE)?,
        };

        let mut params = ParamBuilder::new(&WRITE_SPEC);
        params
            .push("name", name)
            .push("adset_id", adset_id)
            .push("status", status);
        params.set("creative", Some(&json!({"creative_id": creative_id})))?;

        self.logger.info("create", Some(&json!({"act_id": act_id})));
        self.graph
            .post_form(&format!("{}/ads", act_id), &params.finish())
            .await
    }

    async fn edit(&self, args: &Value) -> Result<Value, ToolError> {
        let ad_id = self.validation.required_string(args, "ad_id")?;

        let mut params = ParamBuilder::new(&WRITE_SPEC);
        if let Some(name) = self.validation.optional_string(args, "name")? {
            params.push("name", name);
        }
        if matches!(args.get("status"), Some(value) if !value.is_null()) {
            let status = self
                .validation
                .ensure_status(args, "status", statuses::LIFECYCLE)?;
            params.push("status", status);
        }
        if let Some(creative_id) = self.validation.optional_string(args, "creative_id")? {
            params.set("creative", Some(&json!({"creative_id": creative_id})))?;
        }
        if let Some(adset_id) = self.validation.optional_string(args, "adset_id")? {
            params.push("adset_id", adset_id);
        }

        let pairs = params.finish();
        if pairs.is_empty() {
            return Err(ToolError::invalid_params("No fields to update provided")
                .with_hint("Provide at least one of: name, status, creative_id, adset_id"));
        }
        self.logger.info("edit", Some(&json!({"ad_id": ad_id})));
        self.graph.post_form(&ad_id, &pairs).await
    }

    /// Updates each ad in turn and reports a per-id outcome; one remote
    /// failure never aborts the remaining updates. The results keep the
    /// input order and always count every requested id.
    async fn bulk_update_status(&self, args: &Value) -> Result<Value, ToolError> {
        let ad_ids = self.validation.required_string_list(args, "ad_ids")?;
        let status = self
            .validation
            .ensure_status(args, "status", statuses::LIFECYCLE)?;

        let mut results = Vec::with_capacity(ad_ids.len());
        for ad_id in &ad_ids {
            let mut params = ParamBuilder::new(&WRITE_SPEC);
            params.push("status", status.clone());
            match self.graph.post_form(ad_id, &params.finish()).await {
                Ok(result) => results.push(json!({
                    "ad_id": ad_id,
                    "success": true,
                    "result": result,
                })),
                Err(err) => {
                    self.logger.warn(
                        "bulk_update_status item failed",
                        Some(&json!({"ad_id": ad_id})),
                    );
                    results.push(json!({
                        "ad_id": ad_id,
                        "success": false,
                        "error": err,
                    }));
                }
            }
        }

        Ok(json!({
            "total": ad_ids.len(),
            "results": results,
        }))
    }

    async fn get(&self, args: &Value) -> Result<Value, ToolError> {
        let ad_id = self.validation.required_string(args, "ad_id")?;
        let mut params = ParamBuilder::new(&GET_SPEC);
        params.set("fields", args.get("fields"))?;
        params.set("date_format", args.get("date_format"))?;
        self.graph.get(&ad_id, &params.finish()).await
    }

    async fn get_creative(&self, args: &Value) -> Result<Value, ToolError> {
        let creative_id = self.validation.required_string(args, "creative_id")?;
        let mut params = ParamBuilder::new(&GET_SPEC);
        params.set("fields", args.get("fields"))?;
        params.set("thumbnail_width", args.get("thumbnail_width"))?;
        params.set("thumbnail_height", args.get("thumbnail_height"))?;
        self.graph.get(&creative_id, &params.finish()).await
    }

    async fn list_by_account(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.config.require_act_id(
            self.validation
                .optional_string(args, "act_id")?
                .as_deref(),
        )?;
        self.list(&format!("{}/ads", act_id), args).await
    }

    async fn list_by_campaign(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        self.list(&format!("{}/ads", campaign_id), args).await
    }

    async fn list_by_adset(&self, args: &Value) -> Result<Value, ToolError> {
        let adset_id = self.validation.required_string(args, "adset_id")?;
        self.list(&format!("{}/ads", adset_id), args).await
    }

    async fn list(&self, path: &str, args: &Value) -> Result<Value, ToolError> {
        let mut params = ParamBuilder::new(&LIST_SPEC);
        for key in [
            "fields",
            "filtering",
            "after",
            "before",
            "effective_status",
            "updated_since",
            "date_format",
        ] {
            params.set(key, args.get(key))?;
        }
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);
        params.push("limit", limit.to_string());
        self.graph.get(path, &params.finish()).await
    }
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for AdManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
