pub mod document;
pub mod idea;
pub mod job;
pub mod research_pack;

pub use document::{Document, DocumentMetadata, RankedDocument, SearchMetadata, SearchResult};
pub use idea::NormalizedIdea;
pub use job::{JobError, JobState, JobStatus, NodeResult};
pub use research_pack::{Fact, ResearchMetrics, ResearchPack, SourceRef};
