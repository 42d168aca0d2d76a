use thiserror::Error;

/// Errors surfaced by the automation engine.
///
/// The first four variants are recoverable at record granularity: a batch
/// driver catches them, logs, and moves on to the next record. `Session`
/// means the browser side of the conversation is gone and is fatal to the
/// whole batch.
#[derive(Error, Debug)]
pub enum AutomationError {
    /// A wait condition was not satisfied before its deadline.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An element was located but refused the requested action.
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// The context stack was driven into an impossible state, or a
    /// window/frame that should exist does not.
    #[error("Context error: {0}")]
    ContextError(String),

    /// An input record field failed required parsing.
    #[error("Data error: {0}")]
    DataError(String),

    /// The browser session itself failed (transport, crashed driver).
    #[error("Session error: {0}")]
    Session(String),
}

impl AutomationError {
    /// True for failures the batch driver may absorb per record.
    pub fn is_record_scoped(&self) -> bool {
        !matches!(self, AutomationError::Session(_))
    }
}
