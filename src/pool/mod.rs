//! Worker pool and multi-target coordinator
//!
//! [`WorkerPool`] is the generic bounded pool. [`NewsPool`] sits on top of it
//! and turns a list of [`CrawlTarget`](crate::model::CrawlTarget)s into one
//! work item per target.

mod coordinator;
mod worker;

pub use crate::config::LanePolicy;
pub use coordinator::{plan_lanes, LanePlan, NewsPool};
pub use worker::{PoolReport, PoolState, WorkFuture, WorkItem, WorkerPool};
