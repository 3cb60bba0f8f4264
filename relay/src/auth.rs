//! Request gating: loopback peers are trusted, everyone else needs a token.

use crate::config::AuthConfig;
use crate::errors::RelayError;
use http::Uri;
use http::header::{AUTHORIZATION, HeaderMap};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// Identity of an authenticated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user: String,
    pub loopback: bool,
}

pub struct Gate {
    allow_loopback: bool,
    loopback_user: String,
    // token -> user name
    tokens: HashMap<String, String>,
}

impl Gate {
    pub fn new(config: &AuthConfig) -> Self {
        Gate {
            allow_loopback: config.allow_loopback,
            loopback_user: config.loopback_user.clone(),
            tokens: config
                .users
                .iter()
                .map(|user| (user.token.clone(), user.name.clone()))
                .collect(),
        }
    }

    /// Resolves the caller of a request, or rejects it.
    ///
    /// A valid token always wins, so a user calling through a local tunnel keeps
    /// their own identity. Without one, loopback peers get the synthetic
    /// loopback identity and everybody else is turned away.
    pub fn authenticate(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        peer: SocketAddr,
    ) -> Result<Caller, RelayError> {
        let loopback = is_loopback(peer.ip());

        if let Some(user) = request_token(uri, headers).and_then(|token| self.tokens.get(&token)) {
            return Ok(Caller {
                user: user.clone(),
                loopback,
            });
        }

        if loopback && self.allow_loopback {
            return Ok(Caller {
                user: self.loopback_user.clone(),
                loopback,
            });
        }

        Err(RelayError::Unauthenticated)
    }
}

pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(v6.is_loopback(), |v4| v4.is_loopback()),
    }
}

/// Token from the `token` query parameter, else from `Authorization: token <value>`
/// (or `Bearer <value>`).
fn request_token(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let from_query = uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    });
    if let Some(token) = from_query.filter(|token| !token.is_empty()) {
        return Some(token);
    }

    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, value) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserToken;
    use hyper::header::HeaderValue;

    fn gate(allow_loopback: bool) -> Gate {
        Gate::new(&AuthConfig {
            allow_loopback,
            loopback_user: "localhost".into(),
            users: vec![UserToken {
                name: "alice".into(),
                token: "secret-a".into(),
            }],
        })
    }

    fn auth_header(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    const LOCAL: &str = "127.0.0.1:50000";
    const REMOTE: &str = "10.1.2.3:50000";
    const INGEST: &str = "/jupyterlab-notifications-extension/ingest";

    fn check(
        gate: &Gate,
        uri: &str,
        headers: &HeaderMap,
        peer: &str,
    ) -> Result<Caller, RelayError> {
        gate.authenticate(&uri.parse().unwrap(), headers, peer.parse().unwrap())
    }

    #[test]
    fn test_loopback_bypass() {
        let gate = gate(true);
        let caller = check(&gate, INGEST, &HeaderMap::new(), LOCAL).unwrap();
        assert_eq!(
            caller,
            Caller {
                user: "localhost".into(),
                loopback: true
            }
        );

        assert!(check(&gate, INGEST, &HeaderMap::new(), "[::1]:50000").is_ok());
        assert!(check(&gate, INGEST, &HeaderMap::new(), "[::ffff:127.0.0.1]:50000").is_ok());
    }

    #[test]
    fn test_remote_without_token_rejected() {
        let gate = gate(true);
        assert!(matches!(
            check(&gate, INGEST, &HeaderMap::new(), REMOTE),
            Err(RelayError::Unauthenticated)
        ));
        assert!(matches!(
            check(&gate, INGEST, &HeaderMap::new(), "[::ffff:10.1.2.3]:50000"),
            Err(RelayError::Unauthenticated)
        ));
    }

    #[test]
    fn test_remote_with_token() {
        let gate = gate(true);
        let expected = Caller {
            user: "alice".into(),
            loopback: false,
        };

        let uri = format!("{INGEST}?foo=1&token=secret-a");
        assert_eq!(check(&gate, &uri, &HeaderMap::new(), REMOTE).unwrap(), expected);

        for header in ["token secret-a", "Token secret-a", "Bearer secret-a"] {
            assert_eq!(
                check(&gate, INGEST, &auth_header(header), REMOTE).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_invalid_token_rejected() {
        let gate = gate(true);
        let uri = format!("{INGEST}?token=wrong");
        assert!(check(&gate, &uri, &HeaderMap::new(), REMOTE).is_err());
        assert!(check(&gate, INGEST, &auth_header("token wrong"), REMOTE).is_err());
        assert!(check(&gate, INGEST, &auth_header("Basic secret-a"), REMOTE).is_err());
        assert!(check(&gate, INGEST, &auth_header("secret-a"), REMOTE).is_err());
    }

    #[test]
    fn test_loopback_with_token_keeps_identity() {
        let gate = gate(true);
        let caller = check(&gate, INGEST, &auth_header("token secret-a"), LOCAL).unwrap();
        assert_eq!(caller.user, "alice");
        assert!(caller.loopback);

        // A bad token from loopback falls back to the loopback identity.
        let caller = check(&gate, INGEST, &auth_header("token nope"), LOCAL).unwrap();
        assert_eq!(caller.user, "localhost");
    }

    #[test]
    fn test_loopback_bypass_disabled() {
        let gate = gate(false);
        assert!(check(&gate, INGEST, &HeaderMap::new(), LOCAL).is_err());
        assert!(check(&gate, INGEST, &auth_header("token secret-a"), LOCAL).is_ok());
    }
}
