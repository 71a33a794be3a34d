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

pub const ADSET_ACTIONS: &[&str] = &[
    "create",
    "update",
    "get",
    "get_batch",
    "list_by_account",
    "list_by_campaign",
];

/// Optimization goals that only work with a configured pixel, a conversion
/// event, and a conversion domain.
const CONVERSION_GOALS: &[&str] = &[
    "OFFSITE_CONVERSIONS",
    "VALUE",
    "APP_INSTALLS",
    "APP_INSTALLS_AND_OFFSITE_CONVERSIONS",
    "IN_APP_VALUE",
    "ADVERTISER_SILOED_VALUE",
    "MESSAGING_PURCHASE_CONVERSION",
    "MESSAGING_APPOINTMENT_CONVERSION",
];

const CREATE_SPEC: ParamSpec = ParamSpec::new(&[
    ("targeting", Encode::JsonBlob),
    ("promoted_object", Encode::JsonBlob),
    ("daily_budget", Encode::NumericString),
    ("lifetime_budget", Encode::NumericString),
    ("bid_amount", Encode::NumericString),
    ("roas_average_floor", Encode::NumericString),
]);

const UPDATE_SPEC: ParamSpec = ParamSpec::new(&[
    ("frequency_control_specs", Encode::JsonBlob),
    ("targeting", Encode::JsonBlob),
    ("bid_amount", Encode::NumericString),
]);

const LIST_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("filtering", Encode::JsonBlob),
    ("time_range", Encode::JsonBlob),
    ("effective_status", Encode::JsonBlob),
]);

const GET_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("ids", Encode::CsvList),
]);

fn default_targeting() -> Value {
    json!({
        "age_min": 18,
        "age_max": 65,
        "geo_locations": {"countries": ["BR"]},
        "targeting_automation": {"advantage_audience": 1},
    })
}

/// Accepts targeting as an object or as a JSON string; a malformed string is
/// rejected with the parse error and the received text in the details.
fn parse_targeting(value: &Value) -> Result<Value, ToolError> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|err| {
                ToolError::invalid_params("targeting was sent as string but is not valid JSON")
                    .with_details(json!({"details": err.to_string(), "received": text}))
            })
            .and_then(|parsed| {
                if parsed.is_object() {
                    Ok(parsed)
                } else {
                    Err(ToolError::invalid_params("targeting must be a JSON object"))
                }
            }),
        _ => Err(ToolError::invalid_params(
            "targeting must be an object or a JSON string",
        )),
    }
}

fn provided(args: &Value, key: &str) -> bool {
    matches!(args.get(key), Some(value) if !value.is_null())
}

pub struct AdsetManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl AdsetManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("adsets"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "create" => self.create(&args).await,
            "update" => self.update(&args).await,
            "get" => self.get(&args).await,
            "get_batch" => self.get_batch(&args).await,
            "list_by_account" => self.list_by_account(&args).await,
            "list_by_campaign" => self.list_by_campaign(&args).await,
            _ => Err(unknown_action_error("adsets", action, ADSET_ACTIONS)),
        }
    }

    async fn create(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        let name = self.validation.required_string(args, "name")?;
        let optimization_goal = self.validation.required_string(args, "optimization_goal")?;
        let billing_event = self.validation.required_string(args, "billing_event")?;
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

        let mut params = ParamBuilder::new(&CREATE_SPEC);
        params
            .push("name", name)
            .push("campaign_id", campaign_id)
            .push("status", status)
            .push("optimization_goal", optimization_goal.clone())
            .push("billing_event", billing_event);

        if CONVERSION_GOALS.contains(&optimization_goal.as_str()) {
            let pixel_id = self.config.pixel_id().ok_or_else(|| {
                ToolError::invalid_params("pixel_id is required for conversion goals")
                    .with_hint("Start the server with --pixel-id")
            })?;
            let custom_event_type = self
                .validation
                .optional_string(args, "custom_event_type")?
                .ok_or_else(|| {
                    ToolError::invalid_params(
                        "custom_event_type is required for conversion goals (e.g., PURCHASE, VIEW_CONTENT)",
                    )
                })?;
            let website_domain = self.config.website_domain().ok_or_else(|| {
                ToolError::invalid_params("website_domain is required for conversion goals")
                    .with_hint("Start the server with --website-domain")
            })?;
            let destination_type = self
                .validation
                .optional_string(args, "destination_type")?
                .unwrap_or_else(|| "WEBSITE".to_string());
            params.set(
                "promoted_object",
                Some(&json!({
                    "pixel_id": pixel_id,
                    "custom_event_type": custom_event_type.to_uppercase(),
                })),
            )?;
            params.push("destination_type", destination_type);
            params.push("conversion_domain", website_domain);
        }

        if self
            .validation
            .optional_string(args, "bid_strategy")?
            .as_deref()
            == Some("LOWEST_COST_WITH_MIN_ROAS")
            && !provided(args, "roas_average_floor")
        {
            return Err(ToolError::invalid_params(
                "roas_average_floor is required for LOWEST_COST_WITH_MIN_ROAS strategy",
            ));
        }

        let targeting = match args.get("targeting") {
            Some(value) if !value.is_null() => parse_targeting(value)?,
            _ => default_targeting(),
        };
        params.set("targeting", Some(&targeting))?;
        params.set("daily_budget", args.get("daily_budget"))?;
        params.set("lifetime_budget", args.get("lifetime_budget"))?;
        params.set("bid_amount", args.get("bid_amount"))?;
        params.set("bid_strategy", args.get("bid_strategy"))?;
        params.set("start_time", args.get("start_time"))?;
        params.set("end_time", args.get("end_time"))?;
        params.set("roas_average_floor", args.get("roas_average_floor"))?;

        self.logger.info("create", Some(&json!({"act_id": act_id})));
        self.graph
            .post_form(&format!("{}/adsets", act_id), &params.finish())
            .await
    }

    async fn update(&self, args: &Value) -> Result<Value, ToolError> {
        let adset_id = self.validation.required_string(args, "adset_id")?;

        let mut params = ParamBuilder::new(&UPDATE_SPEC);
        params.set(
            "frequency_control_specs",
            args.get("frequency_control_specs"),
        )?;
        params.set("bid_strategy", args.get("bid_strategy"))?;
        params.set("bid_amount", args.get("bid_amount"))?;
        if provided(args, "status") {
            let status = self
                .validation
                .ensure_status(args, "status", statuses::LIFECYCLE)?;
            params.push("status", status);
        }
        params.set("optimization_goal", args.get("optimization_goal"))?;

        if let Some(raw) = args.get("targeting").filter(|v| !v.is_null()) {
            let targeting = parse_targeting(raw)?;
            let resolved = self.resolve_targeting_update(&adset_id, targeting).await?;
            params.set("targeting", Some(&resolved))?;
        }

        let pairs = params.finish();
        if pairs.is_empty() {
            return Err(ToolError::invalid_params("No update parameters provided"));
        }
        self.logger
            .info("update", Some(&json!({"adset_id": adset_id})));
        self.graph.post_form(&adset_id, &pairs).await
    }

    /// A targeting object carrying only `targeting_automation` is a partial
    /// update: the current targeting is fetched and preserved, with only the
    /// automation member replaced. Anything else replaces targeting wholesale.
    async fn resolve_targeting_update(
        &self,
        adset_id: &str,
        targeting: Value,
    ) -> Result<Value, ToolError> {
        let object = targeting
            .as_object()
            .ok_or_else(|| ToolError::invalid_params("targeting must be a JSON object"))?;
        let automation_only = object.len() == 1 && object.contains_key("targeting_automation");
        if !automation_only {
            return Ok(targeting);
        }
        let automation = object["targeting_automation"].clone();

        let mut fetch = ParamBuilder::new(&GET_SPEC);
        fetch.push("fields", "targeting");
        let current = self.graph.get(adset_id, &fetch.finish()).await?;
        match current.get("targeting").and_then(|v| v.as_object()) {
            Some(existing) if !existing.is_empty() => {
                let mut merged = existing.clone();
                merged.insert("targeting_automation".to_string(), automation);
                Ok(Value::Object(merged))
            }
            _ => Ok(json!({
                "targeting_automation": automation,
                "geo_locations": {"countries": ["BR"]},
            })),
        }
    }

    async fn get(&self, args: &Value) -> Result<Value, ToolError> {
        let adset_id = self.validation.required_string(args, "adset_id")?;
        let mut params = ParamBuilder::new(&GET_SPEC);
        params.set("fields", args.get("fields"))?;
        params.set("date_format", args.get("date_format"))?;
        self.graph.get(&adset_id, &params.finish()).await
    }

    /// One round trip for several ad sets; the response maps each id to its
    /// object.
    async fn get_batch(&self, args: &Value) -> Result<Value, ToolError> {
        let adset_ids = self.validation.required_string_list(args, "adset_ids")?;
        let mut params = ParamBuilder::new(&GET_SPEC);
        params.push("ids", adset_ids.join(","));
        params.set("fields", args.get("fields"))?;
        params.set("date_format", args.get("date_format"))?;
        self.graph.get("", &params.finish()).await
    }

    async fn list_by_account(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.config.require_act_id(
            self.validation
                .optional_string(args, "act_id")?
                .as_deref(),
        )?;
        self.list(&format!("{}/adsets", act_id), args).await
    }

    async fn list_by_campaign(&self, args: &Value) -> Result<Value, ToolError> {
        let campaign_id = self.validation.required_string(args, "campaign_id")?;
        self.list(&format!("{}/adsets", campaign_id), args).await
    }

    async fn list(&self, path: &str, args: &Value) -> Result<Value, ToolError> {
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
impl crate::managers::ToolHandler for AdsetManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
