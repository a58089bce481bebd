//! Error types for the synthesis pipeline.
//!
//! Only conditions that abort an export appear here. Anchor patterns that
//! fail to match (table fingerprint, date-box shape, distribution-list
//! paragraph) degrade the affected stage to a no-op and are logged at the
//! match site instead.

/// Fatal failures of a synthesis call.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The template bytes could not be opened as a zip container.
    #[error("template container could not be opened: {0}")]
    CorruptPackage(#[source] zip::result::ZipError),

    /// A part required by the pipeline (the main document XML) is absent
    /// or unreadable.
    #[error("required part missing from template: {0}")]
    MissingRequiredPart(String),

    /// Repacking the output container failed.
    #[error("failed to assemble output package: {0}")]
    AssemblyFailure(String),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
