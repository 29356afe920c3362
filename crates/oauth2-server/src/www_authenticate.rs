//! `WWW-Authenticate` challenge construction (RFC 6750 §3, RFC 7617)

/// Builder for a single `WWW-Authenticate` challenge
#[derive(Debug, Clone)]
pub struct WwwAuthenticateBuilder {
    /// Authentication scheme
    scheme: String,
    /// Protection realm
    realm: Option<String>,
    /// Error code (if applicable)
    error: Option<String>,
    /// Error description
    error_description: Option<String>,
}

impl WwwAuthenticateBuilder {
    /// Create a new challenge builder for a scheme
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            realm: None,
            error: None,
            error_description: None,
        }
    }

    /// Set the realm
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Set error code and description
    pub fn with_error(mut self, error: impl Into<String>, description: Option<&str>) -> Self {
        self.error = Some(error.into());
        self.error_description = description.map(String::from);
        self
    }

    /// Build the header value
    ///
    /// Produces a header like:
    /// ```text
    /// Bearer realm="Service", error="invalid_token", error_description="The access token expired"
    /// ```
    pub fn build(self) -> String {
        let mut params = Vec::new();

        if let Some(realm) = self.realm {
            params.push(format!("realm=\"{}\"", quote(&realm)));
        }
        if let Some(error) = self.error {
            params.push(format!("error=\"{}\"", quote(&error)));
        }
        if let Some(description) = self.error_description {
            params.push(format!("error_description=\"{}\"", quote(&description)));
        }

        if params.is_empty() {
            self.scheme
        } else {
            format!("{} {}", self.scheme, params.join(", "))
        }
    }
}

/// Escape a value for a quoted-string auth-param
fn quote(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}
