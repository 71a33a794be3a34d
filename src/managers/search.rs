use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::constants::{fields, limits};
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::graph::params::{Encode, ParamBuilder, ParamSpec};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;

pub const SEARCH_ACTIONS: &[&str] = &[
    "campaigns_by_name",
    "adsets_by_name",
    "objects_by_name",
    "find_by_names",
];

const DEFAULT_DATE_PRESET: &str = "last_30d";

const QUERY_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("filtering", Encode::JsonBlob),
]);

/// Resource types addressable by name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectType {
    Campaign,
    Adset,
    Ad,
}

impl ObjectType {
    fn parse(value: &str) -> Result<Self, ToolError> {
        match value {
            "campaign" | "campaigns" => Ok(ObjectType::Campaign),
            "adset" | "adsets" => Ok(ObjectType::Adset),
            "ad" | "ads" => Ok(ObjectType::Ad),
            other => Err(ToolError::invalid_params(format!(
                "Unknown object type '{}'. Use one of: campaign, adset, ad",
                other
            ))),
        }
    }

    fn edge(self) -> &'static str {
        match self {
            ObjectType::Campaign => "campaigns",
            ObjectType::Adset => "adsets",
            ObjectType::Ad => "ads",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ObjectType::Campaign => "campaign",
            ObjectType::Adset => "adset",
            ObjectType::Ad => "ad",
        }
    }

    fn default_fields(self) -> &'static [&'static str] {
        match self {
            ObjectType::Campaign => fields::CAMPAIGN_SEARCH,
            ObjectType::Adset => fields::ADSET_SEARCH,
            ObjectType::Ad => fields::AD_SEARCH,
        }
    }
}

fn name_filter(operator: &str, value: &str) -> Value {
    json!([{"field": "name", "operator": operator, "value": value}])
}

pub struct SearchManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl SearchManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("search"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "campaigns_by_name" => self.by_name(ObjectType::Campaign, &args).await,
            "adsets_by_name" => self.by_name(ObjectType::Adset, &args).await,
            "objects_by_name" => self.objects_by_name(&args).await,
            "find_by_names" => self.find_by_names(&args).await,
            _ => Err(unknown_action_error("search", action, SEARCH_ACTIONS)),
        }
    }

    fn resolve_act_id(&self, args: &Value) -> Result<String, ToolError> {
        let explicit = self.validation.optional_string(args, "act_id")?;
        self.config.require_act_id(explicit.as_deref())
    }

    fn include_insights(&self, args: &Value) -> Result<bool, ToolError> {
        Ok(self
            .validation
            .optional_bool(args, "include_insights")?
            .unwrap_or(true))
    }

    fn insights_fields(&self, args: &Value) -> Result<Vec<String>, ToolError> {
        Ok(self
            .validation
            .optional_string_list(args, "insights_fields")?
            .unwrap_or_else(|| {
                fields::INSIGHTS_DEFAULT
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }))
    }

    fn date_preset(&self, args: &Value) -> Result<String, ToolError> {
        Ok(self
            .validation
            .optional_string(args, "date_preset")?
            .unwrap_or_else(|| DEFAULT_DATE_PRESET.to_string()))
    }

    async fn query_edge(
        &self,
        act_id: &str,
        object_type: ObjectType,
        filtering: &Value,
        field_list: &[String],
        limit: u64,
    ) -> Result<Vec<Value>, ToolError> {
        let mut params = ParamBuilder::new(&QUERY_SPEC);
        params.set("fields", Some(&json!(field_list)))?;
        params.set("filtering", Some(filtering))?;
        params.push("limit", limit.to_string());
        let response = self
            .graph
            .get(&format!("{}/{}", act_id, object_type.edge()), &params.finish())
            .await?;
        Ok(response
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_insights(
        &self,
        object_id: &str,
        insight_fields: &[String],
        date_preset: &str,
    ) -> Result<Vec<Value>, ToolError> {
        let mut params = ParamBuilder::new(&QUERY_SPEC);
        params.set("fields", Some(&json!(insight_fields)))?;
        params.push("date_preset", date_preset);
        let response = self
            .graph
            .get(&format!("{}/insights", object_id), &params.finish())
            .await?;
        Ok(response
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Substring search within one resource type, with per-match insights.
    /// An insights failure is recorded on the item and never fails the search.
    async fn by_name(&self, object_type: ObjectType, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.resolve_act_id(args)?;
        let name_query = self.validation.required_string(args, "name_query")?;
        let field_list = self
            .validation
            .optional_string_list(args, "fields")?
            .unwrap_or_else(|| {
                object_type
                    .default_fields()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);

        let mut matches = self
            .query_edge(
                &act_id,
                object_type,
                &name_filter("CONTAIN", &name_query),
                &field_list,
                limit,
            )
            .await?;

        if matches.is_empty() {
            return Ok(json!({
                "message": format!("No {}s found matching '{}'", object_type.label(), name_query),
                "query": name_query,
                "results": [],
            }));
        }

        if self.include_insights(args)? {
            let insight_fields = self.insights_fields(args)?;
            let date_preset = self.date_preset(args)?;
            for item in &mut matches {
                let Some(id) = item.get("id").and_then(|v| v.as_str()).map(str::to_string)
                else {
                    continue;
                };
                match self
                    .fetch_insights(&id, &insight_fields, &date_preset)
                    .await
                {
                    Ok(rows) => item["insights"] = Value::Array(rows),
                    Err(err) => item["insights_error"] = Value::String(err.message),
                }
            }
        }

        let total = matches.len();
        let mut result = Map::new();
        result.insert("query".to_string(), Value::String(name_query));
        result.insert("total_found".to_string(), json!(total));
        result.insert(
            format!("{}s", object_type.label()),
            Value::Array(matches),
        );
        Ok(Value::Object(result))
    }

    /// Substring search across several resource types at once. A failure on
    /// one type is recorded under `<type>_error` while the others proceed.
    async fn objects_by_name(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.resolve_act_id(args)?;
        let name_query = self.validation.required_string(args, "name_query")?;
        let object_types = match self.validation.optional_string_list(args, "object_types")? {
            Some(list) => list
                .iter()
                .map(|t| ObjectType::parse(t))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![ObjectType::Campaign, ObjectType::Adset, ObjectType::Ad],
        };
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::SEARCH_PAGE_SIZE);
        let include_insights = self.include_insights(args)?;
        let insight_fields = self.insights_fields(args)?;
        let date_preset = self.date_preset(args)?;

        let mut results = Map::new();
        let mut summary = Map::new();
        for object_type in object_types {
            let field_list: Vec<String> = object_type
                .default_fields()
                .iter()
                .map(|s| s.to_string())
                .collect();
            match self
                .query_edge(
                    &act_id,
                    object_type,
                    &name_filter("CONTAIN", &name_query),
                    &field_list,
                    limit,
                )
                .await
            {
                Ok(mut matches) => {
                    if include_insights {
                        for item in &mut matches {
                            let Some(id) =
                                item.get("id").and_then(|v| v.as_str()).map(str::to_string)
                            else {
                                continue;
                            };
                            let rows = self
                                .fetch_insights(&id, &insight_fields, &date_preset)
                                .await
                                .unwrap_or_default();
                            item["insights"] = Value::Array(rows);
                        }
                    }
                    summary.insert(
                        format!("total_{}", object_type.edge()),
                        json!(matches.len()),
                    );
                    results.insert(object_type.edge().to_string(), Value::Array(matches));
                }
                Err(err) => {
                    self.logger.warn(
                        "objects_by_name type failed",
                        Some(&json!({"object_type": object_type.label()})),
                    );
                    summary.insert(format!("total_{}", object_type.edge()), json!(0));
                    results.insert(format!("{}_error", object_type.edge()), json!(err));
                }
            }
        }

        Ok(json!({
            "query": name_query,
            "date_preset": if include_insights { Value::String(date_preset) } else { Value::Null },
            "results": results,
            "summary": summary,
        }))
    }

    /// Exact-match lookup of several names with a two-pass cascade: every
    /// name is tried against the primary type first, and only the names that
    /// found nothing are retried against the secondary type. Names unmatched
    /// after both passes come back in `not_found`. A name never produces
    /// more than one entry. A failed lookup is recorded under `errors` for
    /// that name and never aborts the remaining round trips.
    async fn find_by_names(&self, args: &Value) -> Result<Value, ToolError> {
        let act_id = self.resolve_act_id(args)?;
        let names = self.validation.required_string_list(args, "names")?;
        let primary = ObjectType::parse(
            &self
                .validation
                .optional_string(args, "primary_type")?
                .unwrap_or_else(|| "campaign".to_string()),
        )?;
        let secondary = ObjectType::parse(
            &self
                .validation
                .optional_string(args, "secondary_type")?
                .unwrap_or_else(|| "adset".to_string()),
        )?;
        if primary == secondary {
            return Err(ToolError::invalid_params(
                "primary_type and secondary_type must differ",
            ));
        }
        let include_insights = self.include_insights(args)?;
        let insight_fields = self.insights_fields(args)?;
        let date_preset = self.date_preset(args)?;

        let mut matched: Vec<Value> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();
        let mut errors: Vec<Value> = Vec::new();
        for name in &names {
            match self.lookup_exact(&act_id, primary, name).await {
                Ok(Some(object)) => matched.push(json!({
                    "name": name,
                    "object_type": primary.label(),
                    "object": object,
                })),
                Ok(None) => unmatched.push(name.clone()),
                Err(err) => {
                    self.logger.warn(
                        "find_by_names lookup failed",
                        Some(&json!({"name": name, "object_type": primary.label()})),
                    );
                    errors.push(json!({
                        "name": name,
                        "object_type": primary.label(),
                        "error": err,
                    }));
                }
            }
        }

        let mut not_found: Vec<String> = Vec::new();
        for name in &unmatched {
            match self.lookup_exact(&act_id, secondary, name).await {
                Ok(Some(object)) => matched.push(json!({
                    "name": name,
                    "object_type": secondary.label(),
                    "object": object,
                })),
                Ok(None) => not_found.push(name.clone()),
                Err(err) => {
                    self.logger.warn(
                        "find_by_names lookup failed",
                        Some(&json!({"name": name, "object_type": secondary.label()})),
                    );
                    errors.push(json!({
                        "name": name,
                        "object_type": secondary.label(),
                        "error": err,
                    }));
                }
            }
        }

        if include_insights {
            for entry in &mut matched {
                let Some(id) = entry["object"]
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                else {
                    continue;
                };
                match self
                    .fetch_insights(&id, &insight_fields, &date_preset)
                    .await
                {
                    Ok(rows) => entry["insights"] = Value::Array(rows),
                    Err(err) => entry["insights_error"] = Value::String(err.message),
                }
            }
        }

        Ok(json!({
            "total_requested": names.len(),
            "total_found": matched.len(),
            "matches": matched,
            "not_found": not_found,
            "errors": errors,
        }))
    }

    async fn lookup_exact(
        &self,
        act_id: &str,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Option<Value>, ToolError> {
        let field_list: Vec<String> = object_type
            .default_fields()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let matches = self
            .query_edge(
                act_id,
                object_type,
                &name_filter("EQUAL", name),
                &field_list,
                1,
            )
            .await?;
        Ok(matches.into_iter().next())
    }
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for SearchManager {
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

    fn manager() -> SearchManager {
        let config = Arc::new(test_config());
        let graph = Arc::new(GraphClient::new(config.clone(), Logger::new("test")).unwrap());
        SearchManager::new(Logger::new("test"), Validation::new(), config, graph)
    }

    fn manager_at(base: String) -> SearchManager {
        let config = Arc::new(test_config());
        let graph = Arc::new(
            GraphClient::with_base_url(config.clone(), Logger::new("test"), base).unwrap(),
        );
        SearchManager::new(Logger::new("test"), Validation::new(), config, graph)
    }

    #[test]
    fn object_type_parse_accepts_singular_and_plural() {
        assert_eq!(
            ObjectType::parse("campaigns").unwrap(),
            ObjectType::Campaign
        );
        assert_eq!(ObjectType::parse("adset").unwrap(), ObjectType::Adset);
        assert!(ObjectType::parse("pixel").is_err());
    }

    #[test]
    fn name_filter_shape_matches_remote_contract() {
        let filter = name_filter("EQUAL", "Promo");
        assert_eq!(filter[0]["field"], "name");
        assert_eq!(filter[0]["operator"], "EQUAL");
        assert_eq!(filter[0]["value"], "Promo");
    }

    #[tokio::test]
    async fn find_by_names_rejects_identical_types() {
        let err = manager()
            .handle_action(json!({
                "action": "find_by_names",
                "names": ["Promo"],
                "primary_type": "adset",
                "secondary_type": "adset",
            }))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("must differ"));
    }

    #[tokio::test]
    async fn find_by_names_classifies_across_both_passes() {
        // Pass 1 looks up all three names as campaigns; pass 2 retries the
        // two misses as adsets.
        let base = crate::testutil::serve_scripted(vec![
            (200, json!({"data": [{"id": "c1", "name": "Summer Sale"}]})),
            (200, json!({"data": []})),
            (200, json!({"data": []})),
            (200, json!({"data": [{"id": "s1", "name": "Retarget BR"}]})),
            (200, json!({"data": []})),
        ])
        .await;
        let out = manager_at(base)
            .handle_action(json!({
                "action": "find_by_names",
                "names": ["Summer Sale", "Retarget BR", "Ghost"],
                "include_insights": false,
            }))
            .await
            .expect("must succeed");
        assert_eq!(out["total_requested"], 3);
        assert_eq!(out["total_found"], 2);
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["name"], "Summer Sale");
        assert_eq!(matches[0]["object_type"], "campaign");
        assert_eq!(matches[1]["name"], "Retarget BR");
        assert_eq!(matches[1]["object_type"], "adset");
        assert_eq!(out["not_found"], json!(["Ghost"]));
        assert_eq!(out["errors"], json!([]));
    }

    #[tokio::test]
    async fn find_by_names_records_lookup_failures_and_continues() {
        let base = crate::testutil::serve_scripted(vec![
            (500, json!({"error": {"message": "boom", "code": 1}})),
            (200, json!({"data": [{"id": "c9", "name": "Beta"}]})),
        ])
        .await;
        let out = manager_at(base)
            .handle_action(json!({
                "action": "find_by_names",
                "names": ["Alpha", "Beta"],
                "include_insights": false,
            }))
            .await
            .expect("must succeed");
        assert_eq!(out["total_found"], 1);
        assert_eq!(out["matches"][0]["name"], "Beta");
        let errors = out["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["name"], "Alpha");
        assert_eq!(errors[0]["object_type"], "campaign");
        assert!(errors[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("500"));
    }

    #[tokio::test]
    async fn by_name_requires_query() {
        let err = manager()
            .handle_action(json!({"action": "campaigns_by_name"}))
            .await
            .expect_err("must fail");
        assert!(err.message.contains("name_query"));
    }
}
