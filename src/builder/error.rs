//! Error types for builder sessions

use thiserror::Error;

use crate::accessor::AccessorError;

/// Usage-protocol errors raised while driving a builder.
///
/// These are programmer errors in the driving code: the calls made do not
/// match the regions the template declares. They are never recovered from;
/// every variant names the region that was expected versus what was
/// invoked so drift between a template file and its driver is caught at
/// the first wrong call.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The operation does not match the next pending region
    #[error("expected {expected}, but {invoked} was invoked")]
    RegionMismatch { expected: String, invoked: String },

    /// The operation kind matches but its accessor does not
    #[error("accessor mismatch for {region}: declared {declared}, supplied {supplied}")]
    AccessorMismatch {
        region: String,
        declared: String,
        supplied: String,
    },

    /// An operation was invoked after every region was satisfied
    #[error("no pending region for {invoked}: traversal is past the last marker")]
    PastLastRegion { invoked: String },

    /// A substitution site was left without a value, or resolved to no
    /// value without being marked `REMOVE_IF_NULL`
    #[error("missing replacement for match '{site}'")]
    MissingReplacement { site: String },

    /// `begin_iteration` called with no enclosing `foreach`
    #[error("begin_iteration called outside a FOREACH region")]
    NoActiveLoop,

    /// A region operation was issued inside a loop before its first
    /// iteration began
    #[error("operation inside {loop_region} before its first iteration")]
    IterationRequired { loop_region: String },

    /// An iteration ended (or a new one began) before every region in the
    /// loop body was satisfied
    #[error("iteration of {loop_region} stopped with {pending} still unsatisfied")]
    UnfinishedIteration {
        loop_region: String,
        pending: String,
    },

    /// A replace region's nested body returned before satisfying every
    /// inner region
    #[error("{region} body ended with {pending} still unsatisfied")]
    IncompleteBody { region: String, pending: String },

    /// `finish` was called while regions remain pending
    #[error("builder finished with {pending} still unsatisfied")]
    UnsatisfiedRegion { pending: String },

    /// A removed line also carries a site with a set replacement
    #[error("line removal conflicts with a set replacement for match '{site}'")]
    ConflictingRemoval { site: String },

    /// A malformed accessor constructed by the driving code
    #[error(transparent)]
    InvalidAccessor(#[from] AccessorError),
}
