//! Fatal conversion errors.

use thiserror::Error;

/// A structural failure that aborts the conversion of one document.
///
/// Recoverable anomalies never surface here; they go through [`crate::diag::Diagnostics`].
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(
        "heading stack is empty when adding div ({heading}); make sure a level-0 Body heading is present"
    )]
    EmptyHeadStack { heading: String },

    #[error("cannot insert a sibling after detached <{tag}> element")]
    Detached { tag: String },
}
