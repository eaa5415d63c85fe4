use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Base URL cannot be empty")]
    EmptyUrl,
    #[error("Base URL does not parse: {0}")]
    MalformedUrl(String),
    #[error("Base URL has no host")]
    MissingHost,
    #[error("Base URL must use http or https, not {0}")]
    UnsupportedScheme(String),
    #[error("Base URL must not carry a query string: {0}")]
    UnexpectedQuery(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl FromStr for Scheme {
    type Err = ValidationError;

    fn from_str(scheme: &str) -> Result<Self, Self::Err> {
        match scheme {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Root of a collide deployment. Endpoint paths are appended to it, so it
/// never ends in `/` and never has a query.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseUrl {
    pub scheme: Scheme,
    /// lowercased
    pub host: String,
    /// `None` for the scheme's default port
    pub port: Option<u16>,
    /// gateway mount point, empty or `/segment[/segment..]`
    pub prefix: String,
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme.as_str())?;
        f.write_str("://")?;
        f.write_str(&self.host)?;
        match self.port {
            Some(port) => write!(f, ":{port}{}", self.prefix),
            None => f.write_str(&self.prefix),
        }
    }
}

impl TryFrom<Url> for BaseUrl {
    type Error = ValidationError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        let scheme = url.scheme().parse::<Scheme>()?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_lowercase(),
            _ => return Err(ValidationError::MissingHost),
        };

        if url.query().is_some() {
            return Err(ValidationError::UnexpectedQuery(url.to_string()));
        }

        Ok(BaseUrl {
            scheme,
            host,
            // url already drops the scheme's default port
            port: url.port(),
            prefix: url.path().trim_end_matches('/').to_string(),
        })
    }
}

impl BaseUrl {
    /// Absolute URL for an endpoint path. `path` must start with `/`.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{self}{path}"))
    }
}

/// Parse a user-supplied service root. Surrounding whitespace and a trailing
/// slash or fragment are tolerated.
pub fn validate_base_url(raw: &str) -> Result<BaseUrl, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    Url::parse(raw)
        .map_err(|err| ValidationError::MalformedUrl(format!("{raw} ({err})")))
        .and_then(BaseUrl::try_from)
}
