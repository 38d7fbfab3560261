//! Connection parameter parsing and validation.
//!
//! This module handles parsing connection strings of the form
//! `backend://connect-string` and building connection parameters with
//! validation.

use crate::error::ConnectionError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Option enabling upper-cased column names in dynamic rows.
pub const OPTION_UPPERCASE_COLUMN_NAMES: &str = "uppercase_column_names";

const REDACTED_OPTIONS: [&str; 2] = ["password", "pwd"];

/// Parameters needed to open a session.
#[derive(Clone)]
pub struct ConnectionParameters {
    /// Name of the backend in the registry
    backend: String,

    /// Backend-specific connect string
    connect_string: String,

    /// Additional options interpreted by the core or the backend
    options: HashMap<String, String>,
}

impl ConnectionParameters {
    /// Create parameters for `backend` with the given connect string.
    pub fn new(backend: &str, connect_string: &str) -> Self {
        Self {
            backend: backend.to_string(),
            connect_string: connect_string.to_string(),
            options: HashMap::new(),
        }
    }

    /// Create a new ConnectionParametersBuilder.
    pub fn builder() -> ConnectionParametersBuilder {
        ConnectionParametersBuilder::new()
    }

    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    pub fn connect_string(&self) -> &str {
        &self.connect_string
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    /// Set an option, replacing any previous value.
    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.insert(name.to_string(), value.to_string());
    }

    pub fn get_option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Check whether an option is set to one of `1`, `true`, `yes` or `on`.
    ///
    /// Missing options and unrecognized values count as off.
    pub fn is_option_on(&self, name: &str) -> bool {
        self.get_option(name)
            .and_then(|v| parse_bool(v).ok())
            .unwrap_or(false)
    }
}

impl FromStr for ConnectionParameters {
    type Err = ConnectionError;

    /// Parse a connection string in the format `backend://connect-string`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sqlbridge::connection::ConnectionParameters;
    /// # use std::str::FromStr;
    /// let params = ConnectionParameters::from_str("sqlite3://db=app.db timeout=2")?;
    /// assert_eq!(params.backend_name(), "sqlite3");
    /// assert_eq!(params.connect_string(), "db=app.db timeout=2");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.trim();

        let (backend, rest) = url.split_once("://").ok_or_else(|| {
            ConnectionError::ParseError(
                "Connection string must have the form 'backend://connect-string'".to_string(),
            )
        })?;

        ConnectionParametersBuilder::new()
            .backend(backend)
            .connect_string(rest)
            .build()
    }
}

// Prevent passwords from being displayed in debug or display output
impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options: HashMap<&str, &str> = self
            .options
            .iter()
            .map(|(k, v)| {
                if is_secret(k) {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("ConnectionParameters")
            .field("backend", &self.backend)
            .field("connect_string", &redact_connect_string(&self.connect_string))
            .field("options", &options)
            .finish()
    }
}

impl fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}",
            self.backend,
            redact_connect_string(&self.connect_string)
        )
    }
}

/// Builder for constructing ConnectionParameters with validation.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParametersBuilder {
    backend: Option<String>,
    connect_string: Option<String>,
    options: HashMap<String, String>,
}

impl ConnectionParametersBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend name.
    pub fn backend(mut self, backend: &str) -> Self {
        self.backend = Some(backend.to_string());
        self
    }

    /// Set the backend-specific connect string.
    pub fn connect_string(mut self, connect_string: &str) -> Self {
        self.connect_string = Some(connect_string.to_string());
        self
    }

    /// Add an option.
    pub fn option(mut self, name: &str, value: &str) -> Self {
        self.options.insert(name.to_string(), value.to_string());
        self
    }

    /// Enable or disable upper-cased column names in dynamic rows.
    pub fn uppercase_column_names(self, enabled: bool) -> Self {
        self.option(
            OPTION_UPPERCASE_COLUMN_NAMES,
            if enabled { "true" } else { "false" },
        )
    }

    /// Build the ConnectionParameters with validation.
    pub fn build(self) -> Result<ConnectionParameters, ConnectionError> {
        let backend = self
            .backend
            .ok_or_else(|| ConnectionError::InvalidParameter {
                parameter: "backend".to_string(),
                message: "Backend name is required".to_string(),
            })?;

        if backend.is_empty() {
            return Err(ConnectionError::InvalidParameter {
                parameter: "backend".to_string(),
                message: "Backend name cannot be empty".to_string(),
            });
        }

        if !backend
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConnectionError::InvalidParameter {
                parameter: "backend".to_string(),
                message: format!("Invalid backend name: {}", backend),
            });
        }

        if let Some(value) = self.options.get(OPTION_UPPERCASE_COLUMN_NAMES) {
            parse_bool(value)?;
        }

        Ok(ConnectionParameters {
            backend,
            connect_string: self.connect_string.unwrap_or_default(),
            options: self.options,
        })
    }
}

/// Parse `name=value` pairs separated by whitespace or `;`.
///
/// Values may be wrapped in single or double quotes to include separators.
///
/// # Errors
/// Returns `ConnectionError::ParseError` on a name without `=` or an
/// unterminated quote
pub fn extract_options(connect_string: &str) -> Result<HashMap<String, String>, ConnectionError> {
    let mut options = HashMap::new();
    let mut chars = connect_string.chars().peekable();
    let is_separator = |c: char| c.is_whitespace() || c == ';';

    loop {
        while chars.next_if(|c| is_separator(*c)).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !is_separator(*c)) {
            name.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            return Err(ConnectionError::ParseError(format!(
                "Expected '=' after option name '{}'",
                name
            )));
        }
        if name.is_empty() {
            return Err(ConnectionError::ParseError(
                "Option name cannot be empty".to_string(),
            ));
        }

        let mut value = String::new();
        match chars.next_if(|c| *c == '\'' || *c == '"') {
            Some(quote) => {
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(ConnectionError::ParseError(format!(
                        "Unterminated quote in value of option '{}'",
                        name
                    )));
                }
            }
            None => {
                while let Some(c) = chars.next_if(|c| !is_separator(*c)) {
                    value.push(c);
                }
            }
        }

        options.insert(name, value);
    }

    Ok(options)
}

/// Parse boolean value from string.
pub(crate) fn parse_bool(s: &str) -> Result<bool, ConnectionError> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConnectionError::InvalidParameter {
            parameter: "boolean".to_string(),
            message: format!("Invalid boolean value: {}", s),
        }),
    }
}

fn is_secret(name: &str) -> bool {
    REDACTED_OPTIONS.contains(&name.to_lowercase().as_str())
}

fn redact_connect_string(connect_string: &str) -> String {
    match extract_options(connect_string) {
        Ok(options) if options.keys().any(|k| is_secret(k)) => {
            let mut pairs: Vec<String> = options
                .iter()
                .map(|(k, v)| {
                    if is_secret(k) {
                        format!("{}=<redacted>", k)
                    } else {
                        format!("{}={}", k, v)
                    }
                })
                .collect();
            pairs.sort();
            pairs.join(" ")
        }
        _ => connect_string.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_minimal() {
        let params = ConnectionParametersBuilder::new()
            .backend("sqlite3")
            .build()
            .unwrap();

        assert_eq!(params.backend_name(), "sqlite3");
        assert_eq!(params.connect_string(), "");
        assert!(params.options().is_empty());
    }

    #[test]
    fn test_builder_full() {
        let params = ConnectionParameters::builder()
            .backend("sqlite3")
            .connect_string("db=:memory:")
            .uppercase_column_names(true)
            .option("custom", "value")
            .build()
            .unwrap();

        assert_eq!(params.connect_string(), "db=:memory:");
        assert!(params.is_option_on(OPTION_UPPERCASE_COLUMN_NAMES));
        assert_eq!(params.get_option("custom"), Some("value"));
    }

    #[test]
    fn test_builder_validation_missing_backend() {
        let result = ConnectionParametersBuilder::new().connect_string("x").build();

        assert!(matches!(
            result.unwrap_err(),
            ConnectionError::InvalidParameter { parameter, .. } if parameter == "backend"
        ));
    }

    #[test]
    fn test_builder_validation_bad_backend_name() {
        assert!(ConnectionParameters::builder()
            .backend("my backend")
            .build()
            .is_err());
        assert!(ConnectionParameters::builder().backend("").build().is_err());
    }

    #[test]
    fn test_builder_validation_bad_boolean_option() {
        let result = ConnectionParameters::builder()
            .backend("sqlite3")
            .option(OPTION_UPPERCASE_COLUMN_NAMES, "maybe")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_basic() {
        let params = ConnectionParameters::from_str("sqlite3://db=test.db").unwrap();

        assert_eq!(params.backend_name(), "sqlite3");
        assert_eq!(params.connect_string(), "db=test.db");
    }

    #[test]
    fn test_parse_keeps_nested_scheme() {
        let params =
            ConnectionParameters::from_str("odbc://DSN=x;URL=http://host/path").unwrap();

        assert_eq!(params.backend_name(), "odbc");
        assert_eq!(params.connect_string(), "DSN=x;URL=http://host/path");
    }

    #[test]
    fn test_parse_missing_scheme() {
        let result = ConnectionParameters::from_str("db=test.db");
        assert!(matches!(result, Err(ConnectionError::ParseError(_))));
    }

    #[test]
    fn test_is_option_on() {
        let mut params = ConnectionParameters::new("sqlite3", "");
        for on in ["1", "true", "YES", "on"] {
            params.set_option("flag", on);
            assert!(params.is_option_on("flag"), "{} should be on", on);
        }
        for off in ["0", "false", "no", "off", "garbage"] {
            params.set_option("flag", off);
            assert!(!params.is_option_on("flag"), "{} should be off", off);
        }
        assert!(!params.is_option_on("missing"));
    }

    #[test]
    fn test_extract_options() {
        let options =
            extract_options("db=test.db  timeout=5;readonly=1 name='a b;c' other=\"x y\"")
                .unwrap();

        assert_eq!(options.get("db"), Some(&"test.db".to_string()));
        assert_eq!(options.get("timeout"), Some(&"5".to_string()));
        assert_eq!(options.get("readonly"), Some(&"1".to_string()));
        assert_eq!(options.get("name"), Some(&"a b;c".to_string()));
        assert_eq!(options.get("other"), Some(&"x y".to_string()));
    }

    #[test]
    fn test_extract_options_empty_value() {
        let options = extract_options("user= db=x").unwrap();
        assert_eq!(options.get("user"), Some(&String::new()));
        assert_eq!(options.get("db"), Some(&"x".to_string()));
    }

    #[test]
    fn test_extract_options_errors() {
        assert!(extract_options("test.db").is_err());
        assert!(extract_options("name='unterminated").is_err());
        assert!(extract_options("=value").is_err());
    }

    #[test]
    fn test_display_no_password_leak() {
        let params =
            ConnectionParameters::from_str("postgresql://dbname=app user=admin password=super_secret")
                .unwrap();

        let display = format!("{}", params);
        assert!(!display.contains("super_secret"));
        assert!(display.contains("user=admin"));
    }

    #[test]
    fn test_debug_no_password_leak() {
        let mut params = ConnectionParameters::new("odbc", "DSN=x;PWD=hunter2");
        params.set_option("password", "super_secret");

        let debug = format!("{:?}", params);
        assert!(!debug.contains("super_secret"));
        assert!(!debug.contains("hunter2"));
    }
}
