use base64::Engine;
use eyre::Result;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

/// Credentials attached to every request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// A token sent in a custom header, e.g. Nightscout's `api-secret`
    ApiKey { header: String, value: String },
    /// Username and password via Basic Auth headers
    Basic(String, String),
    /// Don't use any authentication
    None,
}

impl Auth {
    /// Bearer auth when a token is present, no auth otherwise
    pub fn bearer(token: Option<String>) -> Self {
        match token {
            Some(token) if !token.is_empty() => Self::Bearer(token),
            _ => Self::None,
        }
    }

    /// Default headers for this auth method
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        match self {
            Self::Bearer(token) => {
                headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse()?);
            }
            Self::ApiKey { header, value } => {
                headers.insert(
                    HeaderName::from_bytes(header.as_bytes())?,
                    HeaderValue::from_str(value)?,
                );
            }
            Self::Basic(username, password) => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                headers.insert(AUTHORIZATION, format!("Basic {}", credentials).parse()?);
            }
            Self::None => {}
        }
        Ok(headers)
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer"),
            Self::ApiKey { header, .. } => write!(f, "ApiKey ({})", header),
            Self::Basic(_, _) => write!(f, "Basic"),
            Self::None => write!(f, "None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let headers = Auth::Basic("user".into(), "pass".into()).headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_api_key_header() {
        let auth = Auth::ApiKey {
            header: "api-secret".into(),
            value: "abc123".into(),
        };
        let headers = auth.headers().unwrap();
        assert_eq!(headers["api-secret"], "abc123");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_bearer_from_option() {
        assert_eq!(Auth::bearer(None), Auth::None);
        assert_eq!(Auth::bearer(Some(String::new())), Auth::None);
        let headers = Auth::bearer(Some("tok".into())).headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
    }
}
