//! Configuration loading from disk and from command-line route pairs.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{ProxyConfig, RouteConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::TargetError;

/// Error type for configuration loading. All variants are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("host {0:?} has no target; routes are given as HOST TARGET pairs")]
    UnpairedRoute(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid route target: {0}")]
    Target(#[from] TargetError),

    #[error("TLS client setup failed: {0}")]
    Tls(#[from] rustls::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read a TOML file without validating it, so more routes can be merged in.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Turn positional `HOST TARGET HOST TARGET ...` arguments into routes.
pub fn parse_route_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<RouteConfig>, ConfigError> {
    let mut pairs = args.chunks_exact(2);
    let routes = pairs
        .by_ref()
        .map(|pair| RouteConfig::new(pair[0].as_ref(), pair[1].as_ref()))
        .collect();

    if let [host] = pairs.remainder() {
        return Err(ConfigError::UnpairedRoute(host.as_ref().to_string()));
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn route_args_pair_up_in_order() {
        let routes = parse_route_args(&[
            "a.example.com",
            "http://127.0.0.1:3000",
            "b.example.com",
            "ws://127.0.0.1:4000/socket",
        ])
        .unwrap();
        assert_eq!(
            routes,
            vec![
                RouteConfig::new("a.example.com", "http://127.0.0.1:3000"),
                RouteConfig::new("b.example.com", "ws://127.0.0.1:4000/socket"),
            ]
        );
    }

    #[test]
    fn dangling_host_is_rejected() {
        let err = parse_route_args(&["a.example.com", "http://a", "b.example.com"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnpairedRoute(ref host) if host == "b.example.com"));
    }

    #[test]
    fn no_args_means_no_routes() {
        let empty: [&str; 0] = [];
        assert!(parse_route_args(&empty).unwrap().is_empty());
    }

    #[test]
    fn parses_full_toml() {
        let config = parse_config(
            r#"
            [listener]
            host = "127.0.0.1"
            port = 8080

            [routing]
            case_insensitive_hosts = true

            [[routes]]
            host = "app.example.com"
            target = "http://127.0.0.1:3000"

            [observability]
            log_level = "debug"
            metrics_address = "127.0.0.1:9090"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address(), "127.0.0.1:8080");
        assert!(config.routing.case_insensitive_hosts);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = parse_config("[[routes]]\nhost = \"a\"\ntarget = \"http://b\"\n").unwrap();
        assert_eq!(config.listener.port, 80);
        assert_eq!(config.observability.metrics_address, None);
    }

    #[test]
    fn load_config_validates() {
        let path = std::env::temp_dir().join(format!("vhost-proxy-test-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[[routes]]\nhost = \"a.example.com\"\ntarget = \"gopher://x\"").unwrap();
        drop(file);

        let err = load_config(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("a.example.com"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
