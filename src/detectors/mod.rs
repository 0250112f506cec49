//! Data-quality signal detectors.
//!
//! Each detector is stateless, consumes the unified record set (plus, for
//! the location check, externally resolved regions) and writes exactly one
//! flag family. Detectors are independent and may run in any order.

pub mod attention;
pub mod inconsistency;
pub mod location;
pub mod speeding;
pub mod straightline;

pub use attention::AttentionDetector;
pub use inconsistency::InconsistencyDetector;
pub use location::LocationDetector;
pub use speeding::SpeedingDetector;
pub use straightline::StraightLineDetector;
