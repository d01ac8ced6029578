//! Server Configuration

/// Runtime settings for the webhook server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,

    /// Serve a built-in demo catalog instead of calling the billing API
    pub mock_billing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            mock_billing: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            mock_billing: std::env::var("GOODS_MOCK_BILLING")
                .ok()
                .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }
}
