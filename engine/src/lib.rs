//! Consumers of the deferred core: lazily initialized resources and page
//! fetch orchestration.
//!
//! Nothing here schedules work on its own; everything is driven by the
//! [`Reactor`](later_core::Reactor) the caller passes in.

pub mod fetch;
pub mod resource;

pub use fetch::{Fetcher, Notify, Page, PageStore, ScriptedFetcher, request_page, request_pages};
pub use resource::{LazyResource, ResourceError, ResourceState};
