// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query pipeline: tokenization, scoring, ranking, and the narrower
//! search/lookup operations.

pub mod get;
pub mod route;
pub mod score;
pub mod search;
pub mod tokenize;

pub use get::{get, GetHit, GetQuery};
pub use route::{route, RequestContext, RouteRequest, RoutedDocument, RoutingResult};
pub use search::{search, SearchHit};
pub use tokenize::{analyze, QueryTerms};
