use std::path::Path;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UriError {
    #[error("invalid URI '{value}': {source}")]
    Parse {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("path '{0}' cannot be expressed as a file URI")]
    NotAbsolutePath(String),
    #[error("relative reference '{0}' has no base URI to resolve against")]
    NoBase(String),
}

/// Interprets `input` as an absolute URL, or as a filesystem path relative
/// to the current directory.
pub fn document_url(input: &str) -> Result<Url, UriError> {
    match Url::parse(input) {
        // Single-letter schemes are Windows drive prefixes, not URLs.
        Ok(url) if url.scheme().len() > 1 => Ok(url),
        _ => {
            let path = Path::new(input);
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map_err(|_| UriError::NotAbsolutePath(input.to_string()))?
                    .join(path)
            };
            Url::from_file_path(&absolute).map_err(|()| UriError::NotAbsolutePath(input.to_string()))
        }
    }
}

/// Resolves a resource reference found in a document against its base URI.
/// Absolute references are returned as-is.
pub fn resolve_reference(base: Option<&Url>, reference: &str) -> Result<Url, UriError> {
    let reference = reference.trim();
    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| UriError::NoBase(reference.to_string()))?;
            base.join(reference).map_err(|source| UriError::Parse {
                value: reference.to_string(),
                source,
            })
        }
        Err(source) => Err(UriError::Parse {
            value: reference.to_string(),
            source,
        }),
    }
}
