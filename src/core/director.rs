use hyper::header::{HOST, HeaderValue, USER_AGENT};
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Uri};

use crate::core::target::Target;

/// Join a target path prefix and a request path with exactly one slash between them.
pub fn single_joining_slash(prefix: &str, suffix: &str) -> String {
    match (prefix.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{}{}", prefix, &suffix[1..]),
        (false, false) => format!("{prefix}/{suffix}"),
        _ => format!("{prefix}{suffix}"),
    }
}

/// Combine the target's query with the inbound one, target first.
pub fn merge_query(target_query: &str, inbound_query: &str) -> String {
    if target_query.is_empty() || inbound_query.is_empty() {
        format!("{target_query}{inbound_query}")
    } else {
        format!("{target_query}&{inbound_query}")
    }
}

/// Rewrites an inbound request in place so it addresses the route's backend.
#[derive(Debug, Clone)]
pub struct Director {
    target: Target,
}

impl Director {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn direct<B>(&self, req: &mut Request<B>) -> Result<(), hyper::http::Error> {
        let path = single_joining_slash(self.target.path(), req.uri().path());
        let query = merge_query(self.target.query(), req.uri().query().unwrap_or(""));
        let path_and_query = if query.is_empty() {
            PathAndQuery::try_from(path)?
        } else {
            PathAndQuery::try_from(format!("{path}?{query}"))?
        };

        *req.uri_mut() = Uri::builder()
            .scheme(self.target.scheme().clone())
            .authority(self.target.authority().clone())
            .path_and_query(path_and_query)
            .build()?;

        // An explicit empty value keeps the client from injecting its own agent.
        if !req.headers().contains_key(USER_AGENT) {
            req.headers_mut()
                .insert(USER_AGENT, HeaderValue::from_static(""));
        }

        if self.target.is_tls() {
            let host = HeaderValue::from_str(self.target.authority().as_str())?;
            req.headers_mut().insert(HOST, host);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn director(target: &str) -> Director {
        Director::new(Target::parse(target).unwrap())
    }

    fn request(uri: &str) -> Request<()> {
        Request::builder()
            .uri(uri)
            .header(HOST, "proxy.local")
            .body(())
            .unwrap()
    }

    #[test]
    fn test_single_joining_slash() {
        let cases = [
            ("/api/", "/v1", "/api/v1"),
            ("/api", "v1", "/api/v1"),
            ("/api/", "v1", "/api/v1"),
            ("/api", "/v1", "/api/v1"),
            ("", "/v1", "/v1"),
            ("/", "/", "/"),
        ];
        for (prefix, suffix, expected) in cases {
            let joined = single_joining_slash(prefix, suffix);
            assert_eq!(joined, expected, "joining {prefix:?} and {suffix:?}");
            assert!(!joined.contains("//"));
        }
    }

    #[test]
    fn test_merge_query() {
        assert_eq!(merge_query("a=1", "b=2"), "a=1&b=2");
        assert_eq!(merge_query("", "b=2"), "b=2");
        assert_eq!(merge_query("a=1", ""), "a=1");
        assert_eq!(merge_query("", ""), "");
    }

    #[test]
    fn test_rewrites_uri_onto_target() {
        let mut req = request("/widgets?x=1");
        director("http://backend:9000/svc").direct(&mut req).unwrap();

        assert_eq!(req.uri().to_string(), "http://backend:9000/svc/widgets?x=1");
        // Plain backends keep the caller's Host.
        assert_eq!(req.headers()[HOST], "proxy.local");
    }

    #[test]
    fn test_target_query_comes_first() {
        let mut req = request("/items?b=2");
        director("http://backend/base/?a=1").direct(&mut req).unwrap();
        assert_eq!(req.uri().to_string(), "http://backend/base/items?a=1&b=2");
    }

    #[test]
    fn test_missing_user_agent_is_suppressed() {
        let mut req = request("/");
        director("http://backend").direct(&mut req).unwrap();
        assert_eq!(req.headers()[USER_AGENT], "");
    }

    #[test]
    fn test_existing_user_agent_is_untouched() {
        let mut req = request("/");
        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("custom"));
        director("http://backend").direct(&mut req).unwrap();
        assert_eq!(req.headers()[USER_AGENT], "custom");
    }

    #[test]
    fn test_tls_target_rewrites_host() {
        let mut req = request("/login");
        director("https://secure.backend:8443/auth")
            .direct(&mut req)
            .unwrap();

        assert_eq!(
            req.uri().to_string(),
            "https://secure.backend:8443/auth/login"
        );
        assert_eq!(req.headers()[HOST], "secure.backend:8443");
    }
}
