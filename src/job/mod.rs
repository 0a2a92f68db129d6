pub mod dispatcher;
pub mod forward;
pub mod input;
pub mod model;
pub mod store;

pub use dispatcher::Dispatcher;
pub use forward::ResultForwarder;
pub use input::{AudioSource, InputError, TranscriptionRequest};
pub use model::{
    JobHandle, JobInput, JobOutput, JobStatus, RunRequest, RunResponse, Segment, StatusResponse,
    Task, Transcription, Word,
};
pub use store::JobStore;
