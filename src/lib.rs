//! Cognisight - voice screening analysis service
//!
//! Accepts a short speech clip over HTTP and returns a risk estimate with
//! quality checks and descriptive features. The analysis is a
//! deterministic stand-in and carries no clinical meaning.

pub mod analysis;
pub mod client;
pub mod model;
pub mod multipart;
pub mod report;
pub mod server;
pub mod session;

pub use analysis::{Analyzer, AudioClip};
pub use client::{AnalysisClient, CancellationToken, ClientConfig, ClientError};
pub use model::AnalysisResult;
pub use server::{AnalysisServer, ServerConfig, ServerHandle};
