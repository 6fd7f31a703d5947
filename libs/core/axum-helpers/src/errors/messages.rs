//! Standard error messages and codes for consistent error responses.

// Message constants
pub const VALIDATION_FAILED: &str = "Validation failed for the provided input.";
pub const INVALID_UUID: &str = "Invalid UUID format.";
pub const INVALID_JSON: &str = "Invalid JSON format.";
pub const NOT_FOUND_RESOURCE: &str = "Requested resource was not found.";
pub const INTERNAL_ERROR: &str = "An unexpected error occurred.";
pub const RATE_LIMITED: &str = "Too many requests.";

// Error codes for observability and debugging
pub const CODE_VALIDATION: i32 = 1001;
pub const CODE_UUID: i32 = 1002;
pub const CODE_JSON_EXTRACTION: i32 = 1003;
pub const CODE_NOT_FOUND: i32 = 1004;
pub const CODE_INTERNAL: i32 = 1005;
pub const CODE_RATE_LIMITED: i32 = 1012;

// I/O error code
pub const CODE_IO: i32 = 4001;

// JSON parsing error code
pub const CODE_SERDE_JSON: i32 = 5001;
