//! `BridgeError`: unified error type for grid-bridge public APIs.
//!
//! Every failure in this crate is a configuration or data problem that the
//! caller cannot recover from; there is no retry path anywhere. In the
//! parallel setting the orchestrator signals all peers before surfacing one
//! of these locally, so no rank is left blocked inside a collective.

use thiserror::Error;

use crate::store::values::ElementType;

/// Unified error type for grid-bridge operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// The two coordinate orderings describe grids of different size.
    /// Almost always a user error such as the wrong resolution being selected.
    #[error(
        "coordinate orderings disagree: {field} field point(s) vs {native} native point(s)"
    )]
    PointCountMismatch {
        /// Number of field-order points supplied.
        field: usize,
        /// Number of native-order points supplied.
        native: usize,
    },
    /// A correspondence was requested over zero points.
    #[error("cannot build a correspondence over empty point lists")]
    EmptyPointList,
    /// A named variable is absent from a store, schema, or file.
    #[error("variable `{0}` not found")]
    UnknownVariable(String),
    /// A named dimension is absent from a schema or file.
    #[error("dimension `{0}` not found")]
    UnknownDimension(String),
    /// A named attribute is absent from its scope.
    #[error("attribute `{0}` not found")]
    UnknownAttribute(String),
    /// A variable was registered against a dimension the schema does not define.
    #[error("variable `{variable}` references undefined dimension `{dimension}`")]
    UndefinedDimension {
        /// Variable being registered.
        variable: String,
        /// Offending dimension name.
        dimension: String,
    },
    /// Reverse dimension lookup matched more than one dimension.
    #[error("dimension size {size} is ambiguous: both `{first}` and `{second}` match")]
    AmbiguousDimensionSize {
        /// The queried size.
        size: usize,
        /// First matching dimension in registration order.
        first: String,
        /// Second matching dimension in registration order.
        second: String,
    },
    /// Reverse dimension lookup matched nothing.
    #[error("no dimension of size {0} is registered")]
    NoDimensionForSize(usize),
    /// An element type outside the supported numeric set reached a dispatch point.
    #[error("element type {found} is not supported for {context}")]
    UnsupportedElementType {
        /// What the caller was doing.
        context: &'static str,
        /// The offending type tag.
        found: ElementType,
    },
    /// Field and buffer element types disagree.
    #[error("element type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type on the destination side of the copy.
        expected: ElementType,
        /// Type on the source side of the copy.
        found: ElementType,
    },
    /// A buffer is not sized for the requested copy.
    #[error("size mismatch: expected {expected} element(s), found {found}")]
    SizeMismatch {
        /// Required element count.
        expected: usize,
        /// Actual element count.
        found: usize,
    },
    /// Field and buffer level counts are incompatible with the level policy.
    #[error(
        "level count mismatch under policy {policy}: field has {field} level(s), buffer has {buffer}"
    )]
    LevelCountMismatch {
        /// Level count on the field side.
        field: usize,
        /// Level count on the buffer side.
        buffer: usize,
        /// Name of the reconciliation policy in force.
        policy: &'static str,
    },
    /// A permutation entry points outside the point range.
    #[error("permutation entry {index} out of range for {len} point(s)")]
    IndexOutOfRange {
        /// Offending index value.
        index: usize,
        /// Valid exclusive upper bound.
        len: usize,
    },
    /// An operation was attempted against a handle opened in the other mode.
    #[error("operation `{operation}` is invalid on a handle opened for {mode}")]
    ModeViolation {
        /// The attempted operation.
        operation: &'static str,
        /// The mode the handle is actually in.
        mode: &'static str,
    },
    /// An operation needed an open handle and none was open.
    #[error("operation `{0}` requires an open file")]
    NotOpen(&'static str),
    /// The file to read does not exist.
    #[error("file `{0}` not found")]
    FileNotFound(String),
    /// A requested timestamp is absent from the decoded time axis.
    #[error("timestamp `{0}` not present in the decoded time axis")]
    TimestampNotFound(String),
    /// The time-origin attribute text did not parse.
    #[error("cannot parse time origin `{0}` (expected `<date> <time>`)")]
    TimeOriginUnparseable(String),
    /// A time-slice read was requested but no time axis has been decoded.
    #[error("no time axis has been decoded for grid `{0}`")]
    NoTimeAxis(String),
    /// A variable's flat size is not a multiple of the horizontal point count.
    #[error(
        "variable `{variable}` has {total} element(s), not divisible by {points} grid point(s)"
    )]
    ShapeMismatch {
        /// Variable under inspection.
        variable: String,
        /// Flat element count.
        total: usize,
        /// Horizontal point count of the grid.
        points: usize,
    },
    /// No correspondence has been built for the named grid yet.
    #[error("no permutation cached for grid `{0}`")]
    MissingPermutation(String),
    /// A broadcast carried a type code outside the known set.
    #[error("unknown element type code {0} in broadcast")]
    BadTypeCode(u8),
}
