//! Locating the relay and the credentials to reach it.
//!
//! Environment access goes through a lookup closure so callers (and tests)
//! decide where variables come from; [`process_env`] reads the real
//! environment.

use serde::Deserialize;
use std::cmp::Reverse;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use url::{Host, Url};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";

/// Checked in order when a remote relay needs a token and none was given.
pub const TOKEN_ENV_VARS: [&str; 3] = ["JUPYTERHUB_API_TOKEN", "JPY_API_TOKEN", "JUPYTER_TOKEN"];

const DEFAULT_PORT: &str = "8888";

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Where the base URL came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Explicit,
    RuntimeFile(PathBuf),
    Environment(&'static str),
    Default,
}

/// A relay to talk to, plus the token advertised alongside it (if any).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub token: Option<String>,
    pub source: Source,
}

// Contents of a `jpserver-<pid>.json` file. Other fields are ignored.
#[derive(Deserialize)]
struct ServerFile {
    url: String,
    #[serde(default)]
    token: Option<String>,
}

/// Picks the base URL: the explicit one, else the newest running server in
/// the runtime directory, else the environment, else [`DEFAULT_BASE_URL`].
pub fn discover<F>(explicit: Option<&str>, env: F) -> Endpoint
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = explicit {
        return Endpoint {
            base_url: url.to_string(),
            token: None,
            source: Source::Explicit,
        };
    }

    if let Some(endpoint) = runtime_dir(&env).and_then(|dir| newest_server(&dir)) {
        return endpoint;
    }

    env_endpoint(&env).unwrap_or_else(|| Endpoint {
        base_url: DEFAULT_BASE_URL.to_string(),
        token: None,
        source: Source::Default,
    })
}

/// `$JUPYTER_RUNTIME_DIR`, else the platform's Jupyter data directory.
pub fn runtime_dir<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env("JUPYTER_RUNTIME_DIR").filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }

    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Jupyter").join("runtime"))
    } else {
        dirs::data_dir().map(|data| data.join("jupyter").join("runtime"))
    }
}

/// The most recently written server file in `dir` that parses.
pub fn newest_server(dir: &Path) -> Option<Endpoint> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no runtime directory");
            return None;
        }
    };

    let mut candidates: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("jpserver-") && name.ends_with(".json")
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();
    candidates.sort_by_key(|(modified, _)| Reverse(*modified));

    candidates.into_iter().find_map(|(_, path)| {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<ServerFile>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(server) => Some(Endpoint {
                base_url: server.url,
                token: server.token.filter(|token| !token.is_empty()),
                source: Source::RuntimeFile(path),
            }),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping server file");
                None
            }
        }
    })
}

fn env_endpoint<F>(env: &F) -> Option<Endpoint>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name| env(name).filter(|value: &String| !value.is_empty());
    let endpoint = |base_url: String, name| Endpoint {
        base_url,
        token: None,
        source: Source::Environment(name),
    };

    if let Some(url) = var("JUPYTER_SERVER_URL") {
        return Some(endpoint(url, "JUPYTER_SERVER_URL"));
    }

    if let Some(prefix) = var("JUPYTERHUB_SERVICE_PREFIX") {
        let port = var("JUPYTER_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let prefix = prefix.trim_matches('/');
        return Some(endpoint(
            format!("http://127.0.0.1:{port}/{prefix}"),
            "JUPYTERHUB_SERVICE_PREFIX",
        ));
    }

    var("JUPYTER_PORT").map(|port| endpoint(format!("http://localhost:{port}"), "JUPYTER_PORT"))
}

/// Whether `url` points at this machine.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => relay::auth::is_loopback(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => relay::auth::is_loopback(IpAddr::V6(ip)),
        None => false,
    }
}

/// Loopback targets get no token. Otherwise the explicit token wins, then
/// the discovered server's, then the first non-empty [`TOKEN_ENV_VARS`].
pub fn resolve_token<F>(
    url: &Url,
    explicit: Option<&str>,
    discovered: Option<&str>,
    env: F,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if is_loopback(url) {
        return None;
    }

    explicit
        .or(discovered)
        .map(str::to_string)
        .or_else(|| {
            TOKEN_ENV_VARS
                .iter()
                .find_map(|name| env(name).filter(|token| !token.is_empty()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::File;
    use std::time::Duration;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn write_server_file(dir: &Path, name: &str, contents: &str, age_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn test_explicit_url_wins() {
        let env = env_from(&[("JUPYTER_SERVER_URL", "http://elsewhere:9999")]);
        let endpoint = discover(Some("http://127.0.0.1:8888/user/alice"), env);
        assert_eq!(endpoint.base_url, "http://127.0.0.1:8888/user/alice");
        assert_eq!(endpoint.source, Source::Explicit);
        assert_eq!(endpoint.token, None);
    }

    #[test]
    fn test_newest_runtime_file() {
        let dir = tempfile::tempdir().unwrap();
        write_server_file(
            dir.path(),
            "jpserver-100.json",
            r#"{"url": "http://localhost:8888/", "token": "old", "pid": 100}"#,
            600,
        );
        write_server_file(
            dir.path(),
            "jpserver-200.json",
            r#"{"url": "http://remote:8890/", "token": "fresh", "pid": 200}"#,
            5,
        );
        write_server_file(dir.path(), "jpserver-300-open.html", "<html/>", 0);
        write_server_file(dir.path(), "kernel-1.json", r#"{"url": "nope"}"#, 0);

        let runtime = dir.path().to_string_lossy().to_string();
        let endpoint = discover(None, env_from(&[("JUPYTER_RUNTIME_DIR", runtime.as_str())]));

        assert_eq!(endpoint.base_url, "http://remote:8890/");
        assert_eq!(endpoint.token.as_deref(), Some("fresh"));
        assert_eq!(
            endpoint.source,
            Source::RuntimeFile(dir.path().join("jpserver-200.json"))
        );
    }

    #[test]
    fn test_unparseable_runtime_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let valid = r#"{"url": "http://a:1/", "token": ""}"#;
        write_server_file(dir.path(), "jpserver-1.json", valid, 60);
        write_server_file(dir.path(), "jpserver-2.json", "{truncated", 1);

        let endpoint = newest_server(dir.path()).unwrap();
        assert_eq!(endpoint.base_url, "http://a:1/");
        assert_eq!(endpoint.token, None);
    }

    #[test]
    fn test_environment_fallbacks() {
        let empty = tempfile::tempdir().unwrap();
        let runtime = empty.path().to_string_lossy().to_string();

        let endpoint = discover(
            None,
            env_from(&[
                ("JUPYTER_RUNTIME_DIR", runtime.as_str()),
                ("JUPYTER_SERVER_URL", "http://hub.internal:8000/"),
                ("JUPYTERHUB_SERVICE_PREFIX", "/user/alice/"),
            ]),
        );
        assert_eq!(endpoint.base_url, "http://hub.internal:8000/");
        assert_eq!(endpoint.source, Source::Environment("JUPYTER_SERVER_URL"));

        let endpoint = discover(
            None,
            env_from(&[
                ("JUPYTER_RUNTIME_DIR", runtime.as_str()),
                ("JUPYTERHUB_SERVICE_PREFIX", "/user/alice/"),
                ("JUPYTER_PORT", "9000"),
            ]),
        );
        assert_eq!(endpoint.base_url, "http://127.0.0.1:9000/user/alice");

        let endpoint = discover(
            None,
            env_from(&[
                ("JUPYTER_RUNTIME_DIR", runtime.as_str()),
                ("JUPYTERHUB_SERVICE_PREFIX", "/user/bob"),
            ]),
        );
        assert_eq!(endpoint.base_url, "http://127.0.0.1:8888/user/bob");

        let endpoint = discover(
            None,
            env_from(&[("JUPYTER_RUNTIME_DIR", runtime.as_str()), ("JUPYTER_PORT", "9001")]),
        );
        assert_eq!(endpoint.base_url, "http://localhost:9001");
        assert_eq!(endpoint.source, Source::Environment("JUPYTER_PORT"));

        let endpoint = discover(None, env_from(&[("JUPYTER_RUNTIME_DIR", runtime.as_str())]));
        assert_eq!(endpoint.base_url, DEFAULT_BASE_URL);
        assert_eq!(endpoint.source, Source::Default);
    }

    #[test]
    fn test_is_loopback() {
        for url in [
            "http://localhost:8888",
            "http://LOCALHOST/",
            "http://127.0.0.1:8888/user/alice",
            "http://127.1.2.3/",
            "http://[::1]:8888/",
        ] {
            assert!(is_loopback(&Url::parse(url).unwrap()), "{url}");
        }
        for url in ["http://remote:8888", "http://10.0.0.5/", "http://[2001:db8::1]/"] {
            assert!(!is_loopback(&Url::parse(url).unwrap()), "{url}");
        }
    }

    #[test]
    fn test_resolve_token() {
        let remote = Url::parse("http://remote:8888").unwrap();
        let local = Url::parse("http://localhost:8888").unwrap();
        let env = env_from(&[("JPY_API_TOKEN", "from-jpy"), ("JUPYTER_TOKEN", "from-jupyter")]);

        assert_eq!(resolve_token(&local, Some("explicit"), Some("discovered"), &env), None);
        assert_eq!(
            resolve_token(&remote, Some("explicit"), Some("discovered"), &env).as_deref(),
            Some("explicit")
        );
        assert_eq!(
            resolve_token(&remote, None, Some("discovered"), &env).as_deref(),
            Some("discovered")
        );
        assert_eq!(resolve_token(&remote, None, None, &env).as_deref(), Some("from-jpy"));

        let env = env_from(&[("JUPYTERHUB_API_TOKEN", ""), ("JUPYTER_TOKEN", "last")]);
        assert_eq!(resolve_token(&remote, None, None, &env).as_deref(), Some("last"));
        assert_eq!(resolve_token(&remote, None, None, env_from(&[])), None);
    }
}
