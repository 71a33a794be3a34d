use std::sync::Arc;

use futures::TryStreamExt;
use object_store::{aws::AmazonS3Builder, path::Path as ObjPath, ObjectStore};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::constants::{limits, media, statuses};
use crate::errors::ToolError;
use crate::graph::client::GraphClient;
use crate::graph::params::{Encode, ParamBuilder, ParamSpec};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::tool_errors::unknown_action_error;

pub const MEDIA_ACTIONS: &[&str] = &["create_from_s3"];

const CREATIVE_SPEC: ParamSpec = ParamSpec::new(&[("object_story_spec", Encode::JsonBlob)]);

const AD_SPEC: ParamSpec = ParamSpec::new(&[("creative", Encode::JsonBlob)]);

/// Bucket and key prefix parsed out of a user-supplied storage URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct S3Location {
    bucket: String,
    prefix: String,
}

/// Accepts `s3://bucket/prefix`, virtual-hosted https URLs
/// (`bucket.s3.amazonaws.com` or `bucket.s3.<region>.amazonaws.com`) and
/// path-style https URLs (`s3.<region>.amazonaws.com/bucket/prefix`).
fn parse_s3_url(raw: &str) -> Result<S3Location, ToolError> {
    let invalid = || {
        ToolError::invalid_params(
            "Invalid S3 URL format. Expected s3://bucket/path or https://bucket.s3.amazonaws.com/path",
        )
        .with_details(json!({"s3_folder_url": raw}))
    };

    if let Some(rest) = raw.strip_prefix("s3://") {
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid());
        }
        return Ok(S3Location {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        });
    }

    let parsed = url::Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = parsed.host_str().ok_or_else(invalid)?;
    let path = parsed.path().trim_matches('/');

    if host.contains(".s3.") || host.contains(".s3-") {
        // Virtual-hosted style: the bucket is the first host label.
        let bucket = host.split('.').next().ok_or_else(invalid)?;
        if bucket.is_empty() {
            return Err(invalid());
        }
        return Ok(S3Location {
            bucket: bucket.to_string(),
            prefix: path.to_string(),
        });
    }
    if host.starts_with("s3.") || host.starts_with("s3-") {
        // Path style: the bucket is the first path segment.
        let (bucket, prefix) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(invalid());
        }
        return Ok(S3Location {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        });
    }
    Err(invalid())
}

fn extension_of(key: &str) -> Option<String> {
    let filename = key.rsplit('/').next().unwrap_or(key);
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Splits object keys into image and video buckets by file extension.
/// Anything else is ignored.
fn classify_keys(keys: &[String]) -> (Vec<String>, Vec<String>) {
    let mut images = Vec::new();
    let mut videos = Vec::new();
    for key in keys {
        let Some(ext) = extension_of(key) else {
            continue;
        };
        if media::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            images.push(key.clone());
        } else if media::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            videos.push(key.clone());
        }
    }
    (images, videos)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreativeShape {
    SingleImage,
    Carousel,
    Video,
}

impl CreativeShape {
    fn label(self) -> &'static str {
        match self {
            CreativeShape::SingleImage => "single_image",
            CreativeShape::Carousel => "carousel",
            CreativeShape::Video => "video",
        }
    }
}

/// `auto` picks the shape from what the folder holds: any video wins, then
/// multiple images mean a carousel, then a single image.
fn decide_shape(
    requested: &str,
    image_count: usize,
    video_count: usize,
) -> Result<CreativeShape, ToolError> {
    match requested {
        "auto" => {
            if video_count > 0 {
                Ok(CreativeShape::Video)
            } else if image_count > 1 {
                Ok(CreativeShape::Carousel)
            } else {
                Ok(CreativeShape::SingleImage)
            }
        }
        "single_image" => Ok(CreativeShape::SingleImage),
        "carousel" => Ok(CreativeShape::Carousel),
        "video" => Ok(CreativeShape::Video),
        other => Err(ToolError::invalid_params(format!(
            "Invalid creative_type '{}'. Must be one of: auto, single_image, carousel, video",
            other
        ))),
    }
}

fn ensure_carousel_bounds(image_count: usize) -> Result<(), ToolError> {
    if image_count < limits::CAROUSEL_MIN_CARDS {
        return Err(ToolError::invalid_params(format!(
            "Carousel creatives need at least {} images",
            limits::CAROUSEL_MIN_CARDS
        ))
        .with_details(json!({"images_found": image_count})));
    }
    if image_count > limits::CAROUSEL_MAX_CARDS {
        return Err(ToolError::invalid_params(format!(
            "Carousel creatives allow a maximum of {} images",
            limits::CAROUSEL_MAX_CARDS
        ))
        .with_details(json!({
            "images_found": image_count,
            "max_cards": limits::CAROUSEL_MAX_CARDS,
        })));
    }
    Ok(())
}

/// The adimages edge answers with a map keyed by filename; callers only care
/// about the single entry that was uploaded.
fn first_image_entry(response: &Value) -> Result<Value, ToolError> {
    response
        .get("images")
        .and_then(|v| v.as_object())
        .and_then(|images| images.values().next())
        .cloned()
        .ok_or_else(|| {
            ToolError::remote("Image upload response carried no image entry")
                .with_details(json!({"response": response}))
        })
}

fn map_store_error(err: object_store::Error) -> ToolError {
    match err {
        object_store::Error::NotFound { path, .. } => {
            ToolError::not_found(format!("Storage object not found: {}", path))
        }
        other => ToolError::transport(format!("Storage access failed: {}", other)),
    }
}

pub struct MediaManager {
    logger: Logger,
    validation: Validation,
    config: Arc<Config>,
    graph: Arc<GraphClient>,
}

impl MediaManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<Config>,
        graph: Arc<GraphClient>,
    ) -> Self {
        Self {
            logger: logger.child("media"),
            validation,
            config,
            graph,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        match action.and_then(|v| v.as_str()).unwrap_or("") {
            "create_from_s3" => self.create_from_s3(&args).await,
            _ => Err(unknown_action_error("media", action, MEDIA_ACTIONS)),
        }
    }

    /// End-to-end pipeline: list the bucket folder, classify the files,
    /// download them to a scratch directory, upload to the ad account, build
    /// the matching creative and attach it to a new ad.
    async fn create_from_s3(&self, args: &Value) -> Result<Value, ToolError> {
        let s3_folder_url = self.validation.required_string(args, "s3_folder_url")?;
        let adset_id = self.validation.required_string(args, "adset_id")?;
        let ad_name = self.validation.required_string(args, "ad_name")?;
        let creative_name = self.validation.required_string(args, "creative_name")?;
        let message = self.validation.required_string(args, "message")?;
        let link = self.validation.required_string(args, "link")?;
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
        let call_to_action = self
            .validation
            .optional_string(args, "call_to_action_type")?
            .unwrap_or_else(|| "LEARN_MORE".to_string());
        let status = match args.get("status") {
            Some(value) if !value.is_null() => {
                self.validation.ensure_status(args, "status", statuses::CREATE)?
            }
            _ => "PAUSED".to_string(),
        };
        let requested_type = self
            .validation
            .optional_string(args, "creative_type")?
            .unwrap_or_else(|| "auto".to_string());

        let location = parse_s3_url(&s3_folder_url)?;
        let store = self.build_store(&location, args)?;
        let keys = self.list_keys(store.as_ref(), &location).await?;
        if keys.is_empty() {
            return Err(ToolError::not_found("No files found under the S3 folder")
                .with_details(json!({"s3_folder_url": s3_folder_url})));
        }

        let (images, videos) = classify_keys(&keys);
        if images.is_empty() && videos.is_empty() {
            return Err(ToolError::invalid_params(
                "No supported media files found under the S3 folder",
            )
            .with_details(json!({
                "s3_folder_url": s3_folder_url,
                "files_found": keys,
                "image_extensions": media::IMAGE_EXTENSIONS,
                "video_extensions": media::VIDEO_EXTENSIONS,
            })));
        }

        let shape = decide_shape(&requested_type, images.len(), videos.len())?;
        self.logger.info(
            "create_from_s3",
            Some(&json!({
                "creative_type": shape.label(),
                "images": images.len(),
                "videos": videos.len(),
            })),
        );

        // Scratch directory for downloads; removed on every exit path when
        // the guard drops.
        let scratch = TempDir::new()?;

        let creative = match shape {
            CreativeShape::SingleImage => {
                let key = images.first().ok_or_else(|| {
                    ToolError::invalid_params("No image files available for a single_image creative")
                })?;
                let entry = self
                    .fetch_and_upload_image(store.as_ref(), &scratch, key, &act_id, &creative_name)
                    .await?;
                let image_hash = required_hash(&entry)?;
                self.create_image_creative(
                    &act_id,
                    &creative_name,
                    &page_id,
                    args,
                    json!({
                        "message": message,
                        "link": link,
                        "image_hash": image_hash,
                        "call_to_action": {"type": call_to_action},
                    }),
                )
                .await?
            }
            CreativeShape::Carousel => {
                ensure_carousel_bounds(images.len())?;
                let mut cards = Vec::with_capacity(images.len());
                for (index, key) in images.iter().enumerate() {
                    let entry = self
                        .fetch_and_upload_image(store.as_ref(), &scratch, key, &act_id, &creative_name)
                        .await?;
                    cards.push(json!({
                        "image_hash": required_hash(&entry)?,
                        "name": format!("Card {}", index + 1),
                        "link": link,
                    }));
                }
                self.create_image_creative(
                    &act_id,
                    &creative_name,
                    &page_id,
                    args,
                    json!({
                        "message": message,
                        "link": link,
                        "child_attachments": cards,
                    }),
                )
                .await?
            }
            CreativeShape::Video => {
                let key = videos.first().ok_or_else(|| {
                    ToolError::invalid_params("No video files available for a video creative")
                })?;
                let uploaded = self
                    .fetch_and_upload_video(store.as_ref(), &scratch, key, &act_id, &creative_name)
                    .await?;
                let video_id = uploaded
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ToolError::remote("Video upload response carried no id")
                            .with_details(json!({"response": uploaded}))
                    })?;
                self.create_video_creative(
                    &act_id,
                    &creative_name,
                    &page_id,
                    args,
                    &message,
                    &video_id,
                    &link,
                    &call_to_action,
                )
                .await?
            }
        };

        let creative_id = creative
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ToolError::remote("Creative response carried no id")
                    .with_details(json!({"response": creative}))
            })?;

        let mut params = ParamBuilder::new(&AD_SPEC);
        params
            .push("name", ad_name)
            .push("adset_id", adset_id)
            .push("status", status);
        params.set("creative", Some(&json!({"creative_id": creative_id})))?;
        let ad = self
            .graph
            .post_form(&format!("{}/ads", act_id), &params.finish())
            .await?;

        Ok(json!({
            "success": true,
            "ad": ad,
            "creative": creative,
            "creative_type": shape.label(),
            "media_processed": {
                "images": images.len(),
                "videos": videos.len(),
            },
        }))
    }

    /// Explicit credentials in the call win; otherwise the standard AWS
    /// environment variables are picked up.
    fn build_store(
        &self,
        location: &S3Location,
        args: &Value,
    ) -> Result<Arc<dyn ObjectStore>, ToolError> {
        let access_key = self.validation.optional_string(args, "aws_access_key_id")?;
        let secret_key = self
            .validation
            .optional_string(args, "aws_secret_access_key")?;
        let mut builder = match (access_key, secret_key) {
            (Some(access), Some(secret)) => AmazonS3Builder::new()
                .with_access_key_id(access)
                .with_secret_access_key(secret),
            _ => AmazonS3Builder::from_env(),
        };
        builder = builder.with_bucket_name(&location.bucket);
        if let Some(region) = self.validation.optional_string(args, "aws_region")? {
            builder = builder.with_region(region);
        }
        let store = builder
            .build()
            .map_err(|err| ToolError::transport(format!("S3 client init failed: {}", err)))?;
        Ok(Arc::new(store))
    }

    async fn list_keys(
        &self,
        store: &dyn ObjectStore,
        location: &S3Location,
    ) -> Result<Vec<String>, ToolError> {
        let prefix = (!location.prefix.is_empty()).then(|| ObjPath::from(location.prefix.as_str()));
        let mut stream = store.list(prefix.as_ref());
        let mut keys = Vec::new();
        while let Some(meta) = stream.try_next().await.map_err(map_store_error)? {
            let key = meta.location.to_string();
            // Folder placeholder objects are not media.
            if !key.ends_with('/') {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn fetch_to_scratch(
        &self,
        store: &dyn ObjectStore,
        scratch: &TempDir,
        key: &str,
    ) -> Result<(String, Vec<u8>), ToolError> {
        let path = ObjPath::from(key);
        let bytes = store
            .get(&path)
            .await
            .map_err(map_store_error)?
            .bytes()
            .await
            .map_err(map_store_error)?;
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let local = scratch.path().join(&filename);
        tokio::fs::write(&local, &bytes).await?;
        let data = tokio::fs::read(&local).await?;
        self.logger.debug(
            "downloaded media object",
            Some(&json!({"key": key, "bytes": data.len()})),
        );
        Ok((filename, data))
    }

    async fn fetch_and_upload_image(
        &self,
        store: &dyn ObjectStore,
        scratch: &TempDir,
        key: &str,
        act_id: &str,
        creative_name: &str,
    ) -> Result<Value, ToolError> {
        let (filename, data) = self.fetch_to_scratch(store, scratch, key).await?;
        let response = self
            .graph
            .upload_image(act_id, &filename, data, Some(creative_name))
            .await?;
        first_image_entry(&response)
    }

    async fn fetch_and_upload_video(
        &self,
        store: &dyn ObjectStore,
        scratch: &TempDir,
        key: &str,
        act_id: &str,
        creative_name: &str,
    ) -> Result<Value, ToolError> {
        let (filename, data) = self.fetch_to_scratch(store, scratch, key).await?;
        self.graph
            .upload_video(act_id, &filename, data, Some(creative_name))
            .await
    }

    fn instagram_actor_id(&self, args: &Value) -> Result<Option<String>, ToolError> {
        Ok(self
            .validation
            .optional_string(args, "instagram_user_id")?
            .or_else(|| self.config.instagram_user_id().map(str::to_string)))
    }

    /// Shared by the single-image and carousel shapes; only link_data differs.
    async fn create_image_creative(
        &self,
        act_id: &str,
        creative_name: &str,
        page_id: &str,
        args: &Value,
        link_data: Value,
    ) -> Result<Value, ToolError> {
        let mut story_spec = Map::new();
        story_spec.insert("page_id".to_string(), Value::String(page_id.to_string()));
        if let Some(ig_id) = self.instagram_actor_id(args)? {
            story_spec.insert("instagram_actor_id".to_string(), Value::String(ig_id));
        }
        story_spec.insert("link_data".to_string(), link_data);

        let mut params = ParamBuilder::new(&CREATIVE_SPEC);
        params.push("name", creative_name);
        params.set("object_story_spec", Some(&Value::Object(story_spec)))?;
        self.graph
            .post_form(&format!("{}/adcreatives", act_id), &params.finish())
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_video_creative(
        &self,
        act_id: &str,
        creative_name: &str,
        page_id: &str,
        args: &Value,
        message: &str,
        video_id: &str,
        link: &str,
        call_to_action: &str,
    ) -> Result<Value, ToolError> {
        let mut video_data = Map::new();
        video_data.insert("message".to_string(), Value::String(message.to_string()));
        video_data.insert("video_id".to_string(), Value::String(video_id.to_string()));
        video_data.insert(
            "call_to_action".to_string(),
            json!({"type": call_to_action, "value": {"link": link}}),
        );

        let mut story_spec = Map::new();
        story_spec.insert("page_id".to_string(), Value::String(page_id.to_string()));
        if let Some(ig_id) = self.instagram_actor_id(args)? {
            story_spec.insert("instagram_actor_id".to_string(), Value::String(ig_id));
        }
        story_spec.insert("video_data".to_string(), Value::Object(video_data));

        let mut params = ParamBuilder::new(&CREATIVE_SPEC);
        params.push("name", creative_name);
        params.set("object_story_spec", Some(&Value::Object(story_spec)))?;
        self.graph
            .post_form(&format!("{}/adcreatives", act_id), &params.finish())
            .await
    }
}

fn required_hash(entry: &Value) -> Result<String, ToolError> {
    entry
        .get("hash")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ToolError::remote("Image upload response carried no hash")
                .with_details(json!({"entry": entry}))
        })
}

#[async_trait::async_trait]
impl crate::managers::ToolHandler for MediaManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_s3_scheme_url() {
        let loc = parse_s3_url("s3://my-bucket/creatives/summer/").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.prefix, "creatives/summer");
    }

    #[test]
    fn parse_virtual_hosted_url() {
        let loc = parse_s3_url("https://my-bucket.s3.us-east-1.amazonaws.com/creatives").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.prefix, "creatives");
        let loc = parse_s3_url("https://my-bucket.s3.amazonaws.com/creatives/q3").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.prefix, "creatives/q3");
    }

    #[test]
    fn parse_path_style_url() {
        let loc = parse_s3_url("https://s3.us-east-1.amazonaws.com/my-bucket/creatives").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.prefix, "creatives");
    }

    #[test]
    fn parse_rejects_unrelated_urls() {
        let err = parse_s3_url("https://example.com/files").expect_err("must reject");
        assert!(err.message.contains("Invalid S3 URL format"));
        parse_s3_url("not a url").expect_err("must reject");
        parse_s3_url("s3://").expect_err("must reject");
    }

    #[test]
    fn classification_is_case_insensitive_and_skips_unknowns() {
        let keys = vec![
            "a/one.JPG".to_string(),
            "a/two.png".to_string(),
            "a/clip.MP4".to_string(),
            "a/notes.txt".to_string(),
            "a/noext".to_string(),
        ];
        let (images, videos) = classify_keys(&keys);
        assert_eq!(images, vec!["a/one.JPG", "a/two.png"]);
        assert_eq!(videos, vec!["a/clip.MP4"]);
    }

    #[test]
    fn auto_shape_prefers_video_then_carousel() {
        assert_eq!(decide_shape("auto", 3, 1).unwrap(), CreativeShape::Video);
        assert_eq!(decide_shape("auto", 3, 0).unwrap(), CreativeShape::Carousel);
        assert_eq!(
            decide_shape("auto", 1, 0).unwrap(),
            CreativeShape::SingleImage
        );
        assert_eq!(decide_shape("video", 3, 1).unwrap(), CreativeShape::Video);
        decide_shape("slideshow", 1, 0).expect_err("must reject");
    }

    #[test]
    fn carousel_bounds_are_enforced() {
        ensure_carousel_bounds(1).expect_err("too few");
        ensure_carousel_bounds(2).expect("lower bound ok");
        ensure_carousel_bounds(10).expect("upper bound ok");
        let err = ensure_carousel_bounds(11).expect_err("too many");
        assert_eq!(err.details.unwrap()["images_found"], 11);
    }

    #[test]
    fn image_upload_response_is_flattened() {
        let response = json!({"images": {"one.jpg": {"hash": "abc123", "url": "https://cdn"}}});
        let entry = first_image_entry(&response).unwrap();
        assert_eq!(required_hash(&entry).unwrap(), "abc123");
        first_image_entry(&json!({})).expect_err("must reject");
    }
}
