// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine backends, record sources and event publishers.

pub mod memory;
pub mod redis;
pub mod sql;
pub mod traits;
