// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Provider adapters.

pub mod schemas;

pub use schemas::{FunctionSchema, ToolsSchema};
