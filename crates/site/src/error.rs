use skeindocs_core::SourceLocation;
use thiserror::Error;

/// Errors that can abort a documentation build.
#[derive(Debug, Error)]
pub enum DocsError {
    /// IO error while reading pages or writing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Front matter missing or malformed.
    #[error("front matter error in {file}: {message}")]
    Frontmatter {
        /// Offending document
        file: String,
        /// What went wrong
        message: String,
    },
    /// Document structure the parser cannot accept.
    #[error("markdown error at {location}: {message}")]
    Markdown {
        /// What went wrong
        message: String,
        /// Where in the document
        location: SourceLocation,
    },
    /// Heading level outside the section/subsection scheme.
    #[error("unexpected <h{level}> in {file}")]
    UnexpectedHeading {
        /// The offending heading level
        level: u8,
        /// Offending document
        file: String,
    },
    /// A script snippet failed its check; the build must not degrade.
    #[error("error compiling snippet in {file}: {diagnostic}")]
    Check {
        /// Document the snippet came from
        file: String,
        /// Diagnostic text, kept verbatim
        diagnostic: String,
    },
    /// A JSDoc shape the synthesizer refuses to guess about.
    #[error("unhandled JSDoc conversion: {snippet}")]
    UnsupportedJsDoc {
        /// The snippet text, for diagnosis
        snippet: String,
    },
    /// Internal logic error (unexpected state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DocsError {
    /// Front matter failure pinned to a document.
    pub fn frontmatter(file: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Frontmatter {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Markdown structure failure with location.
    pub fn markdown(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Markdown {
            message: message.into(),
            location,
        }
    }

    /// Snippet check failure carrying the verbatim diagnostic.
    pub fn check(file: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Check {
            file: file.into(),
            diagnostic: diagnostic.into(),
        }
    }
}
