use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// The device port could not be opened.
    #[error("Could not open device at `{path}`: {problem}")]
    DeviceOpen {
        /// The port we tried to open.
        path: String,

        /// What went wrong.
        problem: String,
    },

    /// The device did not close down cleanly during shutdown.
    #[error("Device at `{path}` did not close cleanly: {problem}")]
    DeviceClose {
        /// The port we tried to close.
        path: String,

        /// What went wrong.
        problem: String,
    },

    /// Something unexpected happened.
    #[error("Internal issue: {0}")]
    InternalIssue(String),
}
