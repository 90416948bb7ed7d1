use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProdlensError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] ureq::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Retailer table error: {0}")]
    KnowledgeBaseError(String),

    #[error("Rating probe failed: {0}")]
    ProbeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProdlensError {
    /// Get an actionable hint for how to resolve this error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ProdlensError::HttpError(_) | ProdlensError::FetchError(_) => Some(
                "Check your internet connection, or save the page and run:\n  prodlens detect <url> --file page.html"
            ),
            ProdlensError::UrlParseError(_) => Some(
                "Pass a full URL including the scheme, e.g. https://www.example.com/item/123"
            ),
            ProdlensError::KnowledgeBaseError(_) => Some(
                "Check `retailers_path` in your config, or remove it to use the built-in retailer table"
            ),
            ProdlensError::ConfigError(_) | ProdlensError::TomlError(_) => Some(
                "Check your config file (see `PRODLENS_CONFIG`), or delete it to use defaults"
            ),
            ProdlensError::JsonError(_) => Some(
                "Observations must be a JSON array of objects with platform, rating, reviewCount and trustWeight"
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProdlensError>;
