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

pub const CREATIVE_ACTIONS: &[&str] = &["create_catalog", "list_product_sets"];

const CREATE_SPEC: ParamSpec = ParamSpec::new(&[
    ("object_story_spec", Encode::JsonBlob),
    ("degrees_of_freedom_spec", Encode::JsonBlob),
    ("catalog_feed_spec", Encode::JsonBlob),
    ("image_template", Encode::JsonBlob),
]);

const LIST_SPEC: ParamSpec = ParamSpec::new(&[("fields", Encode::CsvList)]);

fn enroll_status(enabled: bool) -> Value {
    json!({"enroll_status": if enabled { "OPT_IN" } else { "OPT_OUT" }})
}

/// Advantage+ opt-in flags collapse into one degrees_of_freedom_spec object;
/// flags left unset are not mentioned at all, so the account defaults apply.
fn build_degrees_of_freedom(
    text_optimizations: Option<bool>,
    image_crop: Option<bool>,
    video_crop: Option<bool>,
    composite_media: Option<bool>,
) -> Option<Value> {
    let mut features = Map::new();
    if let Some(enabled) = text_optimizations {
        features.insert("standard_enhancements".to_string(), enroll_status(enabled));
    }
    if let Some(enabled) = image_crop {
        features.insert(
            "image_enhancements".to_string(),
            json!({"image_crop": enroll_status(enabled)}),
        );
    }
    if let Some(enabled) = video_crop {
        features.insert(
            "video_enhancements".to_string(),
            json!({"video_crop": enroll_status(enabled)}),
        );
    }
    if let Some(enabled) = composite_media {
        features.insert("composite_media".to_string(), enroll_status(enabled));
    }
    if features.is_empty() {
        return None;
    }
    Some(json!({"creative_features_spec": features}))
}

pub struct CreativeManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl CreativeManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("creatives"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "create_catalog" => self.create_catalog(&args).await,
            "list_product_sets" => self.list_product_sets(&args).await,
            _ => Err(unknown_action_error("creatives", action, CREATIVE_ACTIONS)),
        }
    }

    /// Catalog creative for Dynamic Product Ads. The creative pulls product
    /// content from the catalog, so `link` is optional; a call to action with
    /// a link nests the link under its value object instead of link_data.
    async fn create_catalog(&self, args: &Value) -> Result<Value, ToolError> {
        let name = self.validation.required_string(args, "name")?;
        let message = self.validation.required_string(args, "message")?;
        let act_id = self.config.require_act_id(
            self.validation
                .optional_string(args, "act_id")?
                .as_deref(),
        )?;
        let page_id = self.config.require_page_id(
            self.validation
                .optional_string(args, "page_id")?
                .as_deref(),
        )?;
        let instagram_user_id = self
            .validation
            .optional_string(args, "instagram_user_id")?
            .or_else(|| self.config.instagram_user_id().map(str::to_string));

        let mut link_data = Map::new();
        link_data.insert("message".to_string(), Value::String(message));
        let link = self.validation.optional_string(args, "link")?;
        match self
            .validation
            .optional_string(args, "call_to_action_type")?
        {
            Some(cta_type) => {
                let mut cta = Map::new();
                cta.insert("type".to_string(), Value::String(cta_type));
                if let Some(link) = link {
                    cta.insert("value".to_string(), json!({"link": link}));
                }
                link_data.insert("call_to_action".to_string(), Value::Object(cta));
            }
            None => {
                if let Some(link) = link {
                    link_data.insert("link".to_string(), Value::String(link));
                }
            }
        }

        let mut story_spec = Map::new();
        story_spec.insert("page_id".to_string(), Value::String(page_id));
        if let Some(ig_id) = instagram_user_id {
            story_spec.insert("instagram_actor_id".to_string(), Value::String(ig_id));
        }
        story_spec.insert("link_data".to_string(), Value::Object(link_data));

        let mut params = ParamBuilder::new(&CREATE_SPEC);
        params.push("name", name);
        params.set("object_story_spec", Some(&Value::Object(story_spec)))?;
        if let Some(product_set_id) = self.validation.optional_string(args, "product_set_id")? {
            params.push("product_set_id", product_set_id);
        }
        let degrees = build_degrees_of_freedom(
            self.validation.optional_bool(args, "adv_text_optimizations")?,
            self.validation.optional_bool(args, "adv_image_crop")?,
            self.validation.optional_bool(args, "adv_video_crop")?,
            self.validation.optional_bool(args, "adv_composite_media")?,
        );
        params.set("degrees_of_freedom_spec", degrees.as_ref())?;
        params.set("image_template", args.get("adv_image_template"))?;
        params.set("catalog_feed_spec", args.get("adv_catalog_feed_spec"))?;

        self.logger
            .info("create_catalog", Some(&json!({"act_id": act_id})));
        self.graph
            .post_form(&format!("{}/adcreatives", act_id), &params.finish())
            .await
    }

    async fn list_product_sets(&self, args: &Value) -> Result<Value, ToolError> {
        let catalog_id = self.config.require_catalog_id(
            self.validation
                .optional_string(args, "catalog_id")?
                .as_deref(),
        )?;
        let mut params = ParamBuilder::new(&LIST_SPEC);
        match args.get("fields") {
            Some(value) if !value.is_null() => params.set("fields", Some(value))?,
            _ => params.push("fields", fields::PRODUCT_SET_DEFAULT.join(",")),
        };
        let limit = self
            .validation
            .optional_u64(args, "limit")?
            .unwrap_or(limits::DEFAULT_PAGE_SIZE);
        params.push("limit", limit.to_string());
        self.graph
            .get(&format!("{}/product_sets", catalog_id), &params.finish())
            .await
    }
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for CreativeManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
