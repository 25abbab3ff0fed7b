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

//! NNTP client stack: wire framing, response parsing, the framed connection
//! with its reconnect machinery, the typed command client, and the priority
//! connection pool. One connection serves one command at a time; concurrency
//! comes from pooling, not pipelining.

mod client;
pub(crate) mod connection;
mod error;
mod pool;
mod response;
pub(crate) mod wire;

pub use client::{ArticleRef, NntpClient};
pub use connection::NntpConnection;
pub use error::{NntpError, Result};
pub use pool::{ClientLease, NntpPool};
pub use response::{
    parse_article_response_line, parse_group_response_line, parse_newsgroup_line,
    parse_overview_line, parse_response_line, ArticleResponse, GroupResponse, ListGroupResponse,
    NewsgroupEntry, OverviewEntry, Response, StatResponse,
};
