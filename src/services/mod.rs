// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod cleaner;
pub mod engine;
#[cfg(test)]
pub(crate) mod fake;
pub mod llm;
pub mod logging;
pub mod markdown;
pub mod orchestrator;
pub mod shared;
