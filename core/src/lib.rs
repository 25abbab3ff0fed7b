/*
 * lib.rs
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

//! Argano core: an async NNTP client (RFC 3977) specialised for binary
//! newsgroup workloads. A bounded pool of connections multiplexes concurrent
//! callers with priority-based fair queuing; article bodies are decoded
//! incrementally from yEnc and streamed to the consumer as they arrive.

pub mod config;
pub mod net;
pub mod protocol;
pub mod yenc;

pub use config::ServerConfig;
pub use protocol::nntp::{
    ArticleRef, ArticleResponse, GroupResponse, ListGroupResponse, NewsgroupEntry, NntpClient,
    NntpConnection, NntpError, NntpPool, OverviewEntry, Response, StatResponse,
};
pub use yenc::{YencBody, YencEvent, YencEventStream, YencHeaders, YencTrailer};
