use core::fmt;
use std::error::Error;

/// Failures the engine recovers from without aborting a rebuild.
#[derive(Debug)]
pub enum ThemeError {
    /// An image could not be loaded or decoded.
    ImageLoad { url: String, reason: String },
    /// The session ended while work was in flight.
    Cancelled,
    /// A stylesheet's rules cannot be read (cross-origin).
    CrossOriginAccess { href: Option<String> },
    /// The fetch collaborator failed.
    Fetch { url: String, source: anyhow::Error },
}

impl fmt::Display for ThemeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { url, reason } => write!(formatter, "Unable to load image {url}: {reason}"),
            Self::Cancelled => write!(formatter, "Cancelled"),
            Self::CrossOriginAccess { href: Some(href) } => {
                write!(formatter, "Cannot access rules of stylesheet {href}")
            }
            Self::CrossOriginAccess { href: None } => write!(formatter, "Cannot access stylesheet rules"),
            Self::Fetch { url, source } => write!(formatter, "Fetch of {url} failed: {source}"),
        }
    }
}

impl Error for ThemeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
