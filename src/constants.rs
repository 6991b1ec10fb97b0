/// Names of the environment variables the scraper requires at startup.
pub const ENV_USER_AGENT: &str = "USER_AGENT";
pub const ENV_API_URL: &str = "API_URL";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_IG_USERNAME: &str = "IG_USERNAME";
pub const ENV_IG_PASSWORD: &str = "IG_PASSWORD";
pub const ENV_PLATFORM_NAME: &str = "PLATFORM_NAME";
pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_ENDPOINT_URL: &str = "ENDPOINT_URL";
pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

pub const REQUIRED_ENV_VARS: [&str; 10] = [
    ENV_USER_AGENT,
    ENV_API_URL,
    ENV_API_KEY,
    ENV_IG_USERNAME,
    ENV_IG_PASSWORD,
    ENV_PLATFORM_NAME,
    ENV_BUCKET_NAME,
    ENV_ENDPOINT_URL,
    ENV_AWS_ACCESS_KEY_ID,
    ENV_AWS_SECRET_ACCESS_KEY,
];

// Optional environment
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_PUSHGATEWAY_URL: &str = "PUSHGATEWAY_URL";
pub const ENV_SCRAPER_CONFIG: &str = "SCRAPER_CONFIG";

pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_TUNING_FILE: &str = "scraper.toml";

/// Short-code alphabet; a character's index is its base-64 digit value.
pub const SHORT_CODE_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Error tag for an item confirmed gone upstream.
pub const DNE_TAG: &str = "DNE";

pub const POST_ERROR_PREFIX: &str = "PostEM: ";
pub const PROFILE_ERROR_PREFIX: &str = "ProfileEM: ";
pub const COMMENT_ERROR_PREFIX: &str = "CommentEM: ";

/// Separator the legacy status derivation split error tags on.
pub const ERROR_FRAGMENT_SEPARATOR: char = '&';

pub const NO_USERNAME_MESSAGE: &str = "no username";

pub const OUTPUT_FILE_SUFFIX: &str = "_output.json";
pub const DATE_FORMAT: &str = "%Y/%m/%d";
pub const COMMENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Logging
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "ig_scraper.log";
pub const DEFAULT_LOG_FILTER: &str = "ig_scraper=info";
