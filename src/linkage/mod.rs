//! Record linkage: one canonical record per retained baseline identity.
//!
//! ```text
//! CaptureStore (5 streams)
//!     ↓
//! RecordLinker (backfill → per-arm outer join → arm union → baseline left join)
//!     ↓
//! Vec<UnifiedRecord>
//!     ↓
//! IdentityValidator / detectors write disjoint QualityFlags
//!     ↓
//! ExclusionAggregator
//! ```

pub mod linker;
pub mod record;

pub use linker::RecordLinker;
pub use record::{FollowupResponses, QualityFlags, UnifiedRecord};
