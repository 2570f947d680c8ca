// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps the defaults in one place
// and makes them easy to find and modify.

// =============================================================================
// Adapter defaults
// =============================================================================

/// Default timeout applied to adapter calls that don't receive a token (1 minute)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Blob protocol defaults
// =============================================================================

/// Endpoint template for the public blob service; `{account}` is replaced by the account name
pub const PUBLIC_ENDPOINT: &str = "{account}.blob.core.windows.net";

/// Endpoint template for the local storage emulator
pub const DEVELOPMENT_ENDPOINT: &str = "127.0.0.1:10000/{account}";

/// Well-known account name of the local storage emulator
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known (public) account key of the local storage emulator
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Protocol version sent as `x-ms-version`
pub const DEFAULT_API_VERSION: &str = "2015-04-05";

/// Client identifier sent as `x-ms-client-request-id`
pub const DEFAULT_CLIENT_REQUEST_ID: &str = "storage-adapters";

/// Prefix of the headers that take part in the canonicalized header string
pub const CUSTOM_HEADER_PREFIX: &str = "x-ms-";

/// Authorization scheme for shared-key signed requests
pub const SHARED_KEY_SCHEME: &str = "SharedKey";

/// Largest payload accepted by a single-shot block blob upload (bytes, exclusive)
pub const MAX_SINGLE_PUT_BYTES: usize = 64_000_000;

/// Directory separator used by every HTTP-based backend
pub const HTTP_SEPARATOR: char = '/';

// =============================================================================
// Logging defaults
// =============================================================================

/// Default log level when neither the config nor RUST_LOG sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";
