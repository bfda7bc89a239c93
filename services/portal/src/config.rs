//! Portal service configuration

use std::path::PathBuf;

use anyhow::Result;

/// Portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Public base URL the telephony provider uses to reach the voice
    /// webhooks
    pub public_base_url: String,
    /// Whether the session cookie is marked Secure
    pub cookie_secure: bool,
    /// Directory for store snapshots; memory-only when unset
    pub snapshot_dir: Option<PathBuf>,
}

impl PortalConfig {
    /// Create a new PortalConfig from environment variables
    ///
    /// # Environment Variables
    /// - `PORTAL_BIND`: bind address (default: "0.0.0.0:3000")
    /// - `PORTAL_PUBLIC_URL`: public base URL (default: "http://localhost:3000")
    /// - `PORTAL_COOKIE_SECURE`: "true" to mark the cookie Secure (default: false)
    /// - `PORTAL_SNAPSHOT_DIR`: snapshot directory (default: unset)
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            std::env::var("PORTAL_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let public_base_url = std::env::var("PORTAL_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let cookie_secure = std::env::var("PORTAL_COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let snapshot_dir = std::env::var("PORTAL_SNAPSHOT_DIR").ok().map(PathBuf::from);

        Ok(PortalConfig {
            bind_addr,
            public_base_url,
            cookie_secure,
            snapshot_dir,
        })
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            cookie_secure: false,
            snapshot_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_env_is_empty() {
        unsafe {
            std::env::remove_var("PORTAL_BIND");
            std::env::remove_var("PORTAL_PUBLIC_URL");
            std::env::remove_var("PORTAL_COOKIE_SECURE");
            std::env::remove_var("PORTAL_SNAPSHOT_DIR");
        }

        let config = PortalConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert!(!config.cookie_secure);
        assert!(config.snapshot_dir.is_none());
    }

    #[test]
    #[serial]
    fn reads_overrides_from_env() {
        unsafe {
            std::env::set_var("PORTAL_BIND", "127.0.0.1:8080");
            std::env::set_var("PORTAL_PUBLIC_URL", "https://izin.example.com");
            std::env::set_var("PORTAL_COOKIE_SECURE", "true");
            std::env::set_var("PORTAL_SNAPSHOT_DIR", "/tmp/portal-snapshots");
        }

        let config = PortalConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.public_base_url, "https://izin.example.com");
        assert!(config.cookie_secure);
        assert_eq!(
            config.snapshot_dir,
            Some(PathBuf::from("/tmp/portal-snapshots"))
        );

        unsafe {
            std::env::remove_var("PORTAL_BIND");
            std::env::remove_var("PORTAL_PUBLIC_URL");
            std::env::remove_var("PORTAL_COOKIE_SECURE");
            std::env::remove_var("PORTAL_SNAPSHOT_DIR");
        }
    }
}
