pub mod graph {
    pub const API_VERSION: &str = "v22.0";
    pub const BASE_URL: &str = "https://graph.facebook.com";

    pub const TIMEOUT_CALL_MS: u64 = 60_000;
    pub const TIMEOUT_IMAGE_UPLOAD_MS: u64 = 120_000;
    pub const TIMEOUT_VIDEO_UPLOAD_MS: u64 = 300_000;

    pub const TIME_INCREMENT_DEFAULT: &str = "all_days";
}

pub mod fields {
    pub const CAMPAIGN_SEARCH: &[&str] = &[
        "id",
        "name",
        "objective",
        "status",
        "effective_status",
        "daily_budget",
        "lifetime_budget",
        "created_time",
        "updated_time",
    ];
    pub const ADSET_SEARCH: &[&str] = &[
        "id",
        "name",
        "campaign_id",
        "status",
        "effective_status",
        "daily_budget",
        "lifetime_budget",
        "optimization_goal",
        "billing_event",
        "bid_amount",
        "created_time",
        "updated_time",
    ];
    pub const AD_SEARCH: &[&str] = &[
        "id",
        "name",
        "campaign_id",
        "adset_id",
        "status",
        "effective_status",
    ];
    pub const INSIGHTS_DEFAULT: &[&str] = &[
        "impressions",
        "clicks",
        "spend",
        "reach",
        "cpc",
        "cpm",
        "ctr",
        "frequency",
    ];
    pub const PRODUCT_SET_DEFAULT: &[&str] = &["id", "name", "product_count", "filter"];
    pub const PIXEL_DEFAULT: &[&str] = &[
        "id",
        "name",
        "code",
        "is_created_by_business",
        "creation_time",
        "last_fired_time",
    ];
}

pub mod limits {
    pub const DEFAULT_PAGE_SIZE: u64 = 25;
    pub const SEARCH_PAGE_SIZE: u64 = 10;
    pub const CAROUSEL_MIN_CARDS: usize = 2;
    pub const CAROUSEL_MAX_CARDS: usize = 10;
}

pub mod statuses {
    pub const LIFECYCLE: &[&str] = &["ACTIVE", "PAUSED", "ARCHIVED", "DELETED"];
    pub const CREATE: &[&str] = &["ACTIVE", "PAUSED"];
}

pub mod media {
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];
}
