// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod api;
pub mod config;
pub mod crawler;
pub mod version;
