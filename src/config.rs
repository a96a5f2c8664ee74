//! Server configuration.
//!
//! Everything is read from environment variables at startup. Loading goes
//! through a lookup closure so tests can feed values without touching the
//! process environment.

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderName, HeaderValue, Method};
use image::Limits;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::detect::BoundingBox;
use crate::error::ConfigError;

/// Default body limit for uploads (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default filename suggested to the client for the cropped image.
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "bus_line.png";

/// Default decoder allocation cap (128 MiB).
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 128 * 1024 * 1024;

/// Default cap on decoded width and height.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 16_384;

/// Either "anything" or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList<T> {
    Any,
    Only(Vec<T>),
}

impl<T> AllowList<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, AllowList::Any)
    }
}

/// Cross-origin policy applied to every route.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: AllowList<HeaderValue>,
    pub allowed_methods: AllowList<Method>,
    pub allowed_headers: AllowList<HeaderName>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    /// Any origin, method and header, with credentials. Local development only.
    pub fn permissive() -> Self {
        Self {
            allowed_origins: AllowList::Any,
            allowed_methods: AllowList::Any,
            allowed_headers: AllowList::Any,
            allow_credentials: true,
        }
    }

    /// Build the tower-http layer.
    ///
    /// Browsers refuse a literal `*` together with credentials, so "any" is
    /// expressed by echoing what the request asked for.
    pub fn layer(&self) -> CorsLayer {
        let origins = match &self.allowed_origins {
            AllowList::Any => AllowOrigin::mirror_request(),
            AllowList::Only(list) => AllowOrigin::list(list.iter().cloned()),
        };
        let methods = match &self.allowed_methods {
            AllowList::Any => AllowMethods::mirror_request(),
            AllowList::Only(list) => AllowMethods::list(list.iter().cloned()),
        };
        let headers = match &self.allowed_headers {
            AllowList::Any => AllowHeaders::mirror_request(),
            AllowList::Only(list) => AllowHeaders::list(list.iter().cloned()),
        };

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(self.allow_credentials)
            .expose_headers([
                header::CONTENT_DISPOSITION,
                HeaderName::from_static(crate::server::REQUEST_ID_HEADER),
            ])
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,
    /// Box handed to the fixed-box detector.
    pub crop_box: BoundingBox,
    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
    /// Filename suggested in `Content-Disposition`. Printable ASCII only.
    pub download_filename: String,
    /// Most memory the image decoder may allocate for one upload.
    pub max_decode_bytes: u64,
    /// Largest accepted width or height of a decoded upload.
    pub max_image_dimension: u32,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            crop_box: BoundingBox::DEFAULT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            download_filename: DEFAULT_DOWNLOAD_FILENAME.to_string(),
            max_decode_bytes: DEFAULT_MAX_DECODE_BYTES,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from environment variables.
    ///
    /// - `HOST` — bind host (default: 0.0.0.0)
    /// - `PORT` — bind port (default: 8000)
    /// - `CROP_BOX` — `x,y,width,height` (default: 100,50,120,60)
    /// - `MAX_UPLOAD_BYTES` — body limit (default: 10485760)
    /// - `DOWNLOAD_FILENAME` — filename hint, printable ASCII (default: bus_line.png)
    /// - `MAX_DECODE_BYTES` — decoder allocation cap (default: 134217728)
    /// - `MAX_IMAGE_DIMENSION` — largest decoded width or height (default: 16384)
    /// - `CORS_ALLOWED_ORIGINS` / `CORS_ALLOWED_METHODS` / `CORS_ALLOWED_HEADERS`
    ///   — `*` or a comma-separated list (default: `*`)
    /// - `CORS_ALLOW_CREDENTIALS` — `true`/`false` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host: IpAddr = match get("HOST") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("HOST", &raw, e))?,
            None => defaults.bind_addr.ip(),
        };
        let port: u16 = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("PORT", &raw, e))?,
            None => defaults.bind_addr.port(),
        };

        let crop_box = match get("CROP_BOX") {
            Some(raw) => raw
                .parse::<BoundingBox>()
                .map_err(|e| ConfigError::invalid("CROP_BOX", &raw, e))?,
            None => defaults.crop_box,
        };
        if crop_box.is_empty() || crop_box.to_edges().is_none() {
            return Err(ConfigError::invalid(
                "CROP_BOX",
                &crop_box.to_string(),
                "box must have non-zero area and fit in u32 coordinates",
            ));
        }

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| ConfigError::invalid("MAX_UPLOAD_BYTES", &raw, e))?,
            None => defaults.max_upload_bytes,
        };

        let download_filename = get("DOWNLOAD_FILENAME").unwrap_or(defaults.download_filename);
        if !download_filename.chars().all(is_filename_char) {
            return Err(ConfigError::invalid(
                "DOWNLOAD_FILENAME",
                &download_filename,
                "must be printable ASCII without quotes or slashes",
            ));
        }

        let max_decode_bytes = match get("MAX_DECODE_BYTES") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid("MAX_DECODE_BYTES", &raw, e))?,
            None => defaults.max_decode_bytes,
        };
        let max_image_dimension = match get("MAX_IMAGE_DIMENSION") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|dim| *dim > 0)
                .ok_or_else(|| {
                    ConfigError::invalid("MAX_IMAGE_DIMENSION", &raw, "expected a positive integer")
                })?,
            None => defaults.max_image_dimension,
        };

        let allow_credentials = match get("CORS_ALLOW_CREDENTIALS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::invalid("CORS_ALLOW_CREDENTIALS", &raw, "expected a boolean"))?,
            None => defaults.cors.allow_credentials,
        };

        let cors = CorsConfig {
            allowed_origins: parse_allow_list("CORS_ALLOWED_ORIGINS", get("CORS_ALLOWED_ORIGINS"), |s| {
                HeaderValue::from_str(s).map_err(|e| e.to_string())
            })?,
            allowed_methods: parse_allow_list("CORS_ALLOWED_METHODS", get("CORS_ALLOWED_METHODS"), |s| {
                Method::from_bytes(s.to_ascii_uppercase().as_bytes()).map_err(|e| e.to_string())
            })?,
            allowed_headers: parse_allow_list("CORS_ALLOWED_HEADERS", get("CORS_ALLOWED_HEADERS"), |s| {
                HeaderName::from_bytes(s.as_bytes()).map_err(|e| e.to_string())
            })?,
            allow_credentials,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            crop_box,
            max_upload_bytes,
            download_filename,
            max_decode_bytes,
            max_image_dimension,
            cors,
        })
    }

    /// Decoder limits applied to every upload.
    pub fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decode_bytes);
        limits.max_image_width = Some(self.max_image_dimension);
        limits.max_image_height = Some(self.max_image_dimension);
        limits
    }

    /// `Content-Disposition` value for the download.
    ///
    /// Characters `from_lookup` would reject are replaced by `_`, so configs
    /// built by hand still produce a plain ASCII header.
    pub fn content_disposition(&self) -> HeaderValue {
        let name: String = self
            .download_filename
            .chars()
            .map(|c| if is_filename_char(c) { c } else { '_' })
            .collect();
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
    }
}

/// Printable ASCII, minus the characters that break a quoted filename or a path.
fn is_filename_char(c: char) -> bool {
    (c.is_ascii_graphic() || c == ' ') && !matches!(c, '"' | '/' | '\\')
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `None` or `*` means any; otherwise each comma-separated entry is parsed.
fn parse_allow_list<T, P>(
    var: &'static str,
    raw: Option<String>,
    parse: P,
) -> Result<AllowList<T>, ConfigError>
where
    P: Fn(&str) -> Result<T, String>,
{
    let Some(raw) = raw else {
        return Ok(AllowList::Any);
    };
    if raw == "*" {
        return Ok(AllowList::Any);
    }

    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if item == "*" {
                return Err(ConfigError::invalid(var, &raw, "'*' cannot be mixed with explicit entries"));
            }
            parse(item).map_err(|e| ConfigError::invalid(var, item, e))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(AllowList::Only)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.crop_box, BoundingBox::new(100, 50, 120, 60));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.download_filename, "bus_line.png");
        assert_eq!(config.max_decode_bytes, DEFAULT_MAX_DECODE_BYTES);
        assert_eq!(config.max_image_dimension, DEFAULT_MAX_IMAGE_DIMENSION);
        assert!(config.cors.allowed_origins.is_any());
        assert!(config.cors.allowed_methods.is_any());
        assert!(config.cors.allowed_headers.is_any());
        assert!(config.cors.allow_credentials);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9090"),
            ("CROP_BOX", "0,0,10,20"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("DOWNLOAD_FILENAME", "line.png"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, https://example.com"),
            ("CORS_ALLOWED_METHODS", "post,options"),
            ("CORS_ALLOW_CREDENTIALS", "false"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.crop_box, BoundingBox::new(0, 0, 10, 20));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.download_filename, "line.png");
        assert_eq!(
            config.cors.allowed_origins,
            AllowList::Only(vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("https://example.com"),
            ])
        );
        assert_eq!(
            config.cors.allowed_methods,
            AllowList::Only(vec![Method::POST, Method::OPTIONS])
        );
        assert!(config.cors.allowed_headers.is_any());
        assert!(!config.cors.allow_credentials);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let cases = [
            ("PORT", "eighty"),
            ("HOST", "not-an-ip"),
            ("CROP_BOX", "1,2,3"),
            ("CROP_BOX", "1,2,0,4"),
            ("MAX_UPLOAD_BYTES", "-1"),
            ("DOWNLOAD_FILENAME", "../etc/passwd"),
            ("DOWNLOAD_FILENAME", "автобус.png"),
            ("DOWNLOAD_FILENAME", "tab\there.png"),
            ("MAX_DECODE_BYTES", "lots"),
            ("MAX_IMAGE_DIMENSION", "0"),
            ("CORS_ALLOW_CREDENTIALS", "maybe"),
            ("CORS_ALLOWED_HEADERS", "bad header"),
            ("CORS_ALLOWED_ORIGINS", "*, http://localhost:3000"),
        ];

        for (var, value) in cases {
            let err = load(&[(var, value)]).unwrap_err();
            let ConfigError::InvalidValue { var: reported, .. } = err;
            assert_eq!(reported, var, "value {value:?}");
        }
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", "  "), ("CORS_ALLOWED_ORIGINS", "")]).unwrap();
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.cors.allowed_origins.is_any());
    }

    #[test]
    fn test_decode_limits_follow_config() {
        let config = load(&[("MAX_DECODE_BYTES", "4096"), ("MAX_IMAGE_DIMENSION", "640")]).unwrap();
        let limits = config.decode_limits();
        assert_eq!(limits.max_alloc, Some(4096));
        assert_eq!(limits.max_image_width, Some(640));
        assert_eq!(limits.max_image_height, Some(640));
    }

    #[test]
    fn test_content_disposition_is_plain_ascii() {
        let config = load(&[("DOWNLOAD_FILENAME", "line 7.png")]).unwrap();
        assert_eq!(
            config.content_disposition(),
            "attachment; filename=\"line 7.png\""
        );

        let by_hand = ServerConfig {
            download_filename: "автобус\"7\".png".to_string(),
            ..ServerConfig::default()
        };
        let value = by_hand.content_disposition();
        assert!(value.as_bytes().iter().all(|b| b.is_ascii_graphic() || *b == b' '));
        assert_eq!(value, "attachment; filename=\"________7_.png\"");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nope"), None);
    }
}
