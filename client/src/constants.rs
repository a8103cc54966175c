// =============================================================================
// devconnect Client Constants
// =============================================================================
// Tunables and fixed names shared across the client, kept in one place.

// =============================================================================
// DATABASE
// =============================================================================

/// Pool size used when DB_MAX_CONNECTIONS is unset or invalid
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Postgres NOTIFY channel fed by the `messages` insert trigger
pub const MESSAGE_INSERT_CHANNEL: &str = "message_inserts";

/// Buffered pushed rows per subscription before a slow reader starts lagging
pub const MESSAGE_FEED_CAPACITY: usize = 256;

// =============================================================================
// STORAGE
// =============================================================================

/// Bucket holding uploaded profile images
pub const DEFAULT_PROFILE_IMAGE_BUCKET: &str = "profile-images";

/// Content type sent when an image extension is not recognised
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

// =============================================================================
// CHAT
// =============================================================================

/// Prefix of client-generated ids for unconfirmed messages
pub const LOCAL_ID_PREFIX: &str = "temp";

/// Message timestamp format (2-digit hour and minute, 12-hour clock)
pub const MESSAGE_TIME_FORMAT: &str = "%I:%M %p";

/// Display time zone when DISPLAY_TZ is unset
pub const DEFAULT_DISPLAY_TZ: &str = "UTC";

// =============================================================================
// DISCOVERY
// =============================================================================

/// Skills shown on a profile card before the rest collapse into "+N"
pub const SKILL_PREVIEW_COUNT: usize = 2;

// =============================================================================
// LOGGING
// =============================================================================

/// Used when `RUST_LOG` is unset; logs go to stderr so chat output stays clean
pub const DEFAULT_LOG_FILTER: &str = "devconnect=info,migrate=info,sqlx=warn";
