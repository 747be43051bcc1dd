use std::fmt;
use std::str::FromStr;

use hyper::Uri;
use hyper::http::uri::{Authority, Scheme};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetError {
    #[error("Target '{0}' is not a valid URI")]
    Unparseable(String),

    #[error("Target '{0}' has no scheme")]
    MissingScheme(String),

    #[error("Target '{0}' has no host")]
    MissingHost(String),
}

/// The backend a route forwards to: scheme, authority, path prefix and raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: Scheme,
    authority: Authority,
    path: String,
    query: String,
}

impl Target {
    pub fn parse(target: &str) -> Result<Self, TargetError> {
        let uri: Uri = target
            .parse()
            .map_err(|_| TargetError::Unparseable(target.to_string()))?;
        Self::from_uri(&uri).map_err(|err| match err {
            TargetError::MissingScheme(_) => TargetError::MissingScheme(target.to_string()),
            TargetError::MissingHost(_) => TargetError::MissingHost(target.to_string()),
            other => other,
        })
    }

    pub fn from_uri(uri: &Uri) -> Result<Self, TargetError> {
        let scheme = uri
            .scheme()
            .cloned()
            .ok_or_else(|| TargetError::MissingScheme(uri.to_string()))?;
        let authority = uri
            .authority()
            .filter(|authority| !authority.host().is_empty())
            .cloned()
            .ok_or_else(|| TargetError::MissingHost(uri.to_string()))?;
        let (path, query) = uri
            .path_and_query()
            .map(|pq| (pq.path().to_string(), pq.query().unwrap_or("").to_string()))
            .unwrap_or_default();

        Ok(Self {
            scheme,
            authority,
            path,
            query,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Everything except plain `http` is dialed over TLS.
    pub fn is_tls(&self) -> bool {
        self.scheme != Scheme::HTTP
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}
