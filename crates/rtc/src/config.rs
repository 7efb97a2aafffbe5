//! Configuration types for the peer-connection layer

use serde::{Deserialize, Serialize};

/// Configuration for a peer connection
///
/// The application typically receives this as JSON from its own server, in
/// browser `RTCConfiguration` form (camelCase, unified `iceServers` list).
///
/// # Example
///
/// ```
/// use peercall_rtc::RtcConfig;
///
/// let config: RtcConfig = serde_json::from_str(
///     r#"{"iceServers":[{"urls":["stun:stun.example.com:3478"]}]}"#,
/// )
/// .unwrap();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfig {
    /// STUN/TURN servers used for connectivity establishment
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// A single STUN or TURN server entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    /// Server URLs (`stun:`, `turn:` or `turns:` scheme)
    pub urls: Vec<String>,

    /// Username for TURN authentication
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Credential for TURN authentication
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credential: String,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer {
                urls: vec!["stun:stun.l.google.com:19302".to_string()],
                username: String::new(),
                credential: String::new(),
            }],
        }
    }
}

impl RtcConfig {
    /// Configuration with no ICE servers (host candidates only)
    pub fn empty() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }

    /// Add an ICE server entry
    pub fn with_ice_server(mut self, server: IceServer) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if an ICE server entry has no URLs or a URL with an
    /// unrecognized scheme.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(Error::Transport(
                    "ICE server entry has no URLs".to_string(),
                ));
            }
            for url in &server.urls {
                if !url.starts_with("stun:")
                    && !url.starts_with("turn:")
                    && !url.starts_with("turns:")
                {
                    return Err(Error::Transport(format!(
                        "ICE server URL must use stun:/turn:/turns: scheme, got {}",
                        url
                    )));
                }
            }
        }

        Ok(())
    }
}
