pub mod relevance;
pub mod request_id;

pub use relevance::{Relevant, SubjectTracker};
pub use request_id::{request_span, RequestId};
