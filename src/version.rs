// Build-time identity from Cargo metadata

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// "scxpal/0.1.0", logged at startup.
pub fn agent_string() -> String {
    format!("{}/{}", NAME, VERSION)
}
