//! Elasticsearch REST plumbing shared by every component.
//!
//! The cluster is treated as an opaque document store and query executor:
//! this module only knows how to send JSON bodies to a handful of endpoints
//! and decode the responses. Query construction lives in [`crate::search`].

mod client;
mod error;
mod types;

pub use client::ElasticClient;
pub use error::{ElasticError, ElasticResult};
pub use types::{
    CatIndex, ClusterInfo, CountResponse, DedupReport, HitsEnvelope, IndexResponse, RawHit,
    SearchResponseBody, TotalHits, VersionInfo,
};
