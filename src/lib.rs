// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod store;
