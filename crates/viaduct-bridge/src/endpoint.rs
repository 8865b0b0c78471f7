//! Remote endpoint derivation.
//!
//! Each database identifier maps deterministically to one remote endpoint:
//! the identifier becomes a subdomain label of the configured proxy domain,
//! reached over a secure WebSocket (`wss://{id}.{proxy_domain}/`).

use crate::BridgeError;
use url::Url;
use viaduct_engine::EngineError;

/// Derives the remote peer endpoint for a database identifier.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    proxy_domain: String,
    secure: bool,
    override_url: Option<Url>,
}

impl EndpointResolver {
    /// Creates a resolver for `proxy_domain`. `secure` selects `wss` (the
    /// production default) over `ws` (development).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Endpoint`] if the domain is empty or cannot
    /// anchor a valid URL.
    pub fn new(proxy_domain: impl Into<String>, secure: bool) -> Result<Self, BridgeError> {
        let proxy_domain = proxy_domain.into();

        if proxy_domain.is_empty() {
            return Err(BridgeError::Endpoint("proxy domain is empty".to_string()));
        }
        if proxy_domain.contains('/') || proxy_domain.contains("://") {
            return Err(BridgeError::Endpoint(format!(
                "proxy domain {:?} must be a bare host, not a URL",
                proxy_domain
            )));
        }

        let resolver = Self {
            proxy_domain,
            secure,
            override_url: None,
        };
        // Probe with a known-good label so a malformed domain fails at
        // configuration time, not on the first connect.
        resolver.derive("probe")?;
        Ok(resolver)
    }

    /// Connects every session to a fixed URL instead of deriving a subdomain.
    /// For self-hosted proxies without wildcard DNS and for local testing.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Endpoint`] unless `url` is a valid `ws`/`wss` URL.
    pub fn with_override(mut self, url: &str) -> Result<Self, BridgeError> {
        let parsed = Url::parse(url)
            .map_err(|e| BridgeError::Endpoint(format!("override {:?}: {}", url, e)))?;
        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(BridgeError::Endpoint(format!(
                    "override scheme {:?} is not a WebSocket scheme",
                    other
                )))
            }
        }
        self.override_url = Some(parsed);
        Ok(self)
    }

    /// The configured proxy domain.
    pub fn proxy_domain(&self) -> &str {
        &self.proxy_domain
    }

    /// Resolves the endpoint for `id`, validating the identifier first.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Engine`] for an invalid identifier and
    /// [`BridgeError::Endpoint`] if the derived address does not parse.
    pub fn resolve(&self, id: &str) -> Result<Url, BridgeError> {
        viaduct_types::validate_database_id(id).map_err(EngineError::from)?;

        if let Some(url) = &self.override_url {
            return Ok(url.clone());
        }
        self.derive(id)
    }

    fn derive(&self, id: &str) -> Result<Url, BridgeError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let raw = format!("{}://{}.{}/", scheme, id, self.proxy_domain);
        Url::parse(&raw).map_err(|e| BridgeError::Endpoint(format!("{:?}: {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_subdomain_of_proxy_domain() {
        let resolver = EndpointResolver::new("proxy.example.com", true).unwrap();
        let url = resolver.resolve("db-abc").unwrap();
        assert_eq!(url.as_str(), "wss://db-abc.proxy.example.com/");
    }

    #[test]
    fn insecure_mode_uses_plain_scheme() {
        let resolver = EndpointResolver::new("proxy.local", false).unwrap();
        let url = resolver.resolve("dev").unwrap();
        assert_eq!(url.as_str(), "ws://dev.proxy.local/");
    }

    #[test]
    fn invalid_identifier_is_rejected() {
        let resolver = EndpointResolver::new("proxy.example.com", true).unwrap();
        let err = resolver.resolve("Not/Valid").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Engine(EngineError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn empty_or_url_shaped_domains_are_rejected() {
        assert!(EndpointResolver::new("", true).is_err());
        assert!(EndpointResolver::new("wss://proxy.example.com", true).is_err());
        assert!(EndpointResolver::new("proxy.example.com/path", true).is_err());
    }

    #[test]
    fn override_bypasses_derivation_but_not_validation() {
        let resolver = EndpointResolver::new("proxy.example.com", true)
            .unwrap()
            .with_override("ws://127.0.0.1:9999")
            .unwrap();

        let url = resolver.resolve("db-abc").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9999/");

        assert!(resolver.resolve("BAD ID").is_err());
    }

    #[test]
    fn override_must_be_a_websocket_url() {
        let resolver = EndpointResolver::new("proxy.example.com", true).unwrap();
        assert!(resolver
            .clone()
            .with_override("https://proxy.example.com")
            .is_err());
        assert!(resolver.with_override("not a url").is_err());
    }
}
