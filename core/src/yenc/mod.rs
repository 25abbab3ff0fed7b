/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Argano, a streaming NNTP client for binary newsgroups.
 *
 * Argano is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Argano is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Argano.  If not, see <http://www.gnu.org/licenses/>.
 */

//! yEnc decoding: control-line parsing, the incremental byte kernel, and the
//! streaming body pipeline that feeds decoded bytes to the consumer while the
//! article is still arriving.

pub(crate) mod body;
pub mod codec;
pub mod header;

pub use body::{YencBody, YencEvent, YencEventStream};
pub use header::{YencHeaders, YencTrailer};
