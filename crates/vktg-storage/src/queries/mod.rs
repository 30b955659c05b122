// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the two store tables.

pub mod correlations;
pub mod links;
