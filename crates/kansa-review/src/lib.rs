//! Review orchestration: completion client, prompt construction, the
//! unified/separate review pipeline, and report output.

pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod report;
