// SPDX-License-Identifier: MIT OR Apache-2.0

//! iroute - Deterministic instruction routing library
//!
//! Shared modules for the iroute CLI tool and MCP server.

pub mod config;
pub mod corpus;
pub mod errors;
pub mod eval;
pub mod mcp;
pub mod query;
