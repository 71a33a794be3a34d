use crate::errors::ToolError;
use clap::Parser;

/// Command-line flags, read once at startup. The access token is the only
/// required flag; the optional identifiers gate individual tool actions.
#[derive(Debug, Parser)]
#[command(name = "meta-ads-mcp", about = "MCP stdio server for the Meta Ads Graph API")]
pub struct Cli {
    /// Graph API access token
    #[arg(long = "fb-token", env = "FB_TOKEN")]
    pub fb_token: String,

    /// Default ad account id, with the act_ prefix
    #[arg(long = "ad-account-id")]
    pub ad_account_id: Option<String>,

    /// Meta Pixel id used for conversion ad sets
    #[arg(long = "pixel-id")]
    pub pixel_id: Option<String>,

    /// Facebook Page id used for creatives
    #[arg(long = "page-id")]
    pub page_id: Option<String>,

    /// Instagram user id used as instagram_actor_id in creatives
    #[arg(long = "instagram-user-id")]
    pub instagram_user_id: Option<String>,

    /// Product catalog id for DPA creatives
    #[arg(long = "catalog-id")]
    pub catalog_id: Option<String>,

    /// Conversion domain for conversion ad sets
    #[arg(long = "website-domain")]
    pub website_domain: Option<String>,
}

/// Immutable configuration snapshot. Constructed once from the CLI and passed
/// by reference into every manager; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    access_token: String,
    ad_account_id: Option<String>,
    pixel_id: Option<String>,
    page_id: Option<String>,
    instagram_user_id: Option<String>,
    catalog_id: Option<String>,
    website_domain: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            access_token: cli.fb_token,
            ad_account_id: non_empty(cli.ad_account_id),
            pixel_id: non_empty(cli.pixel_id),
            page_id: non_empty(cli.page_id),
            instagram_user_id: non_empty(cli.instagram_user_id),
            catalog_id: non_empty(cli.catalog_id),
            website_domain: non_empty(cli.website_domain),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn ad_account_id(&self) -> Option<&str> {
        self.ad_account_id.as_deref()
    }

    pub fn pixel_id(&self) -> Option<&str> {
        self.pixel_id.as_deref()
    }

    pub fn page_id(&self) -> Option<&str> {
        self.page_id.as_deref()
    }

    pub fn instagram_user_id(&self) -> Option<&str> {
        self.instagram_user_id.as_deref()
    }

    pub fn catalog_id(&self) -> Option<&str> {
        self.catalog_id.as_deref()
    }

    pub fn website_domain(&self) -> Option<&str> {
        self.website_domain.as_deref()
    }

    /// Resolve an identifier from an explicit argument or the configured
    /// default, failing with a message that names the startup flag.
    pub fn require_id(
        &self,
        explicit: Option<&str>,
        configured: Option<&str>,
        label: &str,
        flag: &str,
    ) -> Result<String, ToolError> {
        if let Some(value) = explicit {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        match configured {
            Some(value) => Ok(value.to_string()),
            None => Err(ToolError::invalid_params(format!(
                "No {} provided or configured",
                label
            ))
            .with_hint(format!(
                "Pass {} in the arguments or start the server with {}",
                label, flag
            ))),
        }
    }

    pub fn require_act_id(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        self.require_id(
            explicit,
            self.ad_account_id(),
            "ad account id (act_id)",
            "--ad-account-id",
        )
    }

    pub fn require_page_id(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        self.require_id(explicit, self.page_id(), "page_id", "--page-id")
    }

    pub fn require_catalog_id(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        self.require_id(explicit, self.catalog_id(), "catalog_id", "--catalog-id")
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        access_token: "test-token".to_string(),
        ad_account_id: Some("act_1".to_string()),
        pixel_id: Some("px_1".to_string()),
        page_id: Some("page_1".to_string()),
        instagram_user_id: None,
        catalog_id: Some("cat_1".to_string()),
        website_domain: Some("example.com".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_token_flag_and_optional_ids() {
        let cli = Cli::try_parse_from([
            "meta-ads-mcp",
            "--fb-token",
            "tok",
            "--ad-account-id",
            "act_5",
        ])
        .expect("must parse");
        assert_eq!(cli.fb_token, "tok");
        let config = Config::from_cli(cli);
        assert_eq!(config.access_token(), "tok");
        assert_eq!(config.ad_account_id(), Some("act_5"));
        assert_eq!(config.pixel_id(), None);
    }

    #[test]
    fn require_act_id_prefers_explicit_argument() {
        let config = test_config();
        let resolved = config.require_act_id(Some("act_9")).expect("must resolve");
        assert_eq!(resolved, "act_9");
    }

    #[test]
    fn require_act_id_falls_back_to_configured_default() {
        let config = test_config();
        let resolved = config.require_act_id(None).expect("must resolve");
        assert_eq!(resolved, "act_1");
    }

    #[test]
    fn require_id_fails_with_flag_hint_when_unconfigured() {
        let config = test_config();
        let err = config
            .require_id(None, None, "instagram_user_id", "--instagram-user-id")
            .expect_err("must fail");
        assert!(err.hint.unwrap_or_default().contains("--instagram-user-id"));
    }

    #[test]
    fn blank_explicit_argument_is_treated_as_absent() {
        let config = test_config();
        let resolved = config.require_act_id(Some("   ")).expect("must resolve");
        assert_eq!(resolved, "act_1");
    }
}
