pub mod config;
pub mod emptiness;
pub mod reports;
pub mod types;

pub use config::Config;
pub use emptiness::{is_effectively_empty, payload_is_empty};
pub use reports::{MergeReport, PollReport, RequeueReport, SubmitReport, SubmitStop};
pub use types::{
    CollectedReply, CollectionJob, JobFilters, JobStatus, PayloadKey, Platform, Post, PostStatus,
    RawPayload, ReplyRecord, RetryMetadata, SortOrder,
};
