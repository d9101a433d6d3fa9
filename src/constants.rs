/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_REFRESH_PATH: &str = "accounts/refresh";
pub const WS_ROOT_SEGMENT: &str = "ws";

// Connection path segments
pub const DIRECT_SEGMENT: &str = "personal";
pub const GROUP_SEGMENT: &str = "group";

// REST path segments
pub const CHAT_SEGMENT: &str = "chat";
pub const DIRECT_HISTORY_SEGMENT: &str = "messages";
pub const GROUP_HISTORY_SEGMENT: &str = "group";
pub const CONTACTS_SEGMENT: &str = "users";

// Cookie names carried by the credential-bearing client
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const STATUS_CHECK_TIMEOUT_MS: u64 = 2000;

// Contact Directory
pub const CONTACT_POLL_INTERVAL_SECS: u64 = 10;

// Session notifications
pub const NOTICE_CHANNEL_CAPACITY: usize = 256;

// Display
pub const DISPLAY_TIME_FORMAT: &str = "%I:%M %p";
pub const CONTACT_PREVIEW_CHARS: usize = 50;
