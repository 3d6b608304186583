//! Default endpoint resolution.
//!
//! A configuration without a `url` targets `<origin>/dispatch`. Where the
//! origin comes from depends on the host: a page location in an embedded
//! browser, a fixed server address, or the environment. The normalizer only
//! sees the [`EndpointResolver`] trait.

use crate::error::ConfigError;

/// Environment variable read by [`EnvOrigin`].
pub const ORIGIN_ENV_VAR: &str = "DISPATCH_ORIGIN";

/// Supplies the origin (scheme://host[:port]) used to derive a default url.
pub trait EndpointResolver: Send + Sync {
    fn origin(&self) -> Result<String, ConfigError>;
}

/// Origin derived from the location of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    origin: String,
}

impl PageLocation {
    /// Parse a full page url such as `https://app.example.com/settings?tab=1`.
    pub fn parse(href: &str) -> Result<Self, ConfigError> {
        let url =
            reqwest::Url::parse(href).map_err(|_| ConfigError::InvalidUrl(href.to_string()))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(ConfigError::MissingOrigin(format!(
                "{href} has an opaque origin"
            )));
        }
        Ok(Self {
            origin: origin.ascii_serialization(),
        })
    }
}

impl EndpointResolver for PageLocation {
    fn origin(&self) -> Result<String, ConfigError> {
        Ok(self.origin.clone())
    }
}

/// A fixed origin, e.g. the address of a known server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOrigin(pub String);

impl StaticOrigin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }
}

impl EndpointResolver for StaticOrigin {
    fn origin(&self) -> Result<String, ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::MissingOrigin("static origin is empty".into()));
        }
        Ok(self.0.clone())
    }
}

/// Reads the origin from [`ORIGIN_ENV_VAR`] each time it is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOrigin;

impl EndpointResolver for EnvOrigin {
    fn origin(&self) -> Result<String, ConfigError> {
        match std::env::var(ORIGIN_ENV_VAR) {
            Ok(origin) if !origin.is_empty() => Ok(origin),
            _ => Err(ConfigError::MissingOrigin(format!(
                "{ORIGIN_ENV_VAR} is not set"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_location_drops_path_and_query() {
        let loc = PageLocation::parse("https://app.example.com/settings/profile?tab=1").unwrap();
        assert_eq!(loc.origin().unwrap(), "https://app.example.com");
    }

    #[test]
    fn page_location_keeps_explicit_port() {
        let loc = PageLocation::parse("http://localhost:8080/").unwrap();
        assert_eq!(loc.origin().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn page_location_rejects_garbage() {
        assert!(matches!(
            PageLocation::parse("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn opaque_origin_is_missing() {
        assert!(matches!(
            PageLocation::parse("data:text/plain,hello"),
            Err(ConfigError::MissingOrigin(_))
        ));
    }

    #[test]
    fn empty_static_origin_is_missing() {
        assert!(StaticOrigin::new("").origin().is_err());
    }
}
