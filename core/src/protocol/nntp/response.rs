/*
 * response.rs
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

//! NNTP response records and parsers. A status line is a 3-digit code and an
//! optional message separated by a single space (RFC 3977 §3.2). The
//! specialised parsers tokenise the message of GROUP/LISTGROUP/ARTICLE-family
//! responses; OVER and LIST ACTIVE data lines are parsed leniently, skipping
//! lines that do not match.

use super::error::{NntpError, Result};

/// Parsed status line: 3-digit code plus the rest of the line.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub message: String,
}

impl Response {
    /// 2xx, including the 1xx informational codes that open a multi-line body.
    pub fn is_multiline_success(&self) -> bool {
        (100..300).contains(&self.code)
    }
}

/// Parse a status line. The first three bytes are the decimal code; the
/// remainder after the single separating space is the message.
pub fn parse_response_line(line: &str) -> Result<Response> {
    if line.len() < 3 {
        return Err(NntpError::Protocol(format!("malformed response line: {:?}", line)));
    }
    let code: u16 = line[..3]
        .parse()
        .map_err(|_| NntpError::Protocol(format!("malformed response code: {:?}", line)))?;
    let message = if line.len() > 4 { line[4..].to_string() } else { String::new() };
    Ok(Response { code, message })
}

/// Tokenise an article-family message into (article number, message-id).
/// Missing tokens default to 0 and the empty string; STAT by message-id, for
/// example, reports no article number on some servers.
pub fn parse_article_response_line(message: &str) -> (i64, String) {
    let mut tokens = message.split_whitespace();
    let number = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0);
    let message_id = tokens.next().unwrap_or("").to_string();
    (number, message_id)
}

/// Full article response: status fields plus the dot-unstuffed body lines.
#[derive(Debug, Clone)]
pub struct ArticleResponse {
    pub code: u16,
    pub message: String,
    pub article_number: i64,
    pub message_id: String,
    pub lines: Vec<String>,
}

impl ArticleResponse {
    pub fn new(response: Response, lines: Vec<String>) -> Self {
        let (article_number, message_id) = parse_article_response_line(&response.message);
        Self {
            code: response.code,
            message: response.message,
            article_number,
            message_id,
            lines,
        }
    }
}

/// GROUP response: estimated count plus the low and high water marks.
#[derive(Debug, Clone)]
pub struct GroupResponse {
    pub code: u16,
    pub message: String,
    pub count: i64,
    pub low: i64,
    pub high: i64,
    pub name: String,
}

/// Tokenise a full GROUP response line into its five whitespace-separated
/// fields: code, count, low, high, name.
pub fn parse_group_response_line(line: &str) -> Result<GroupResponse> {
    let response = parse_response_line(line)?;
    GroupResponse::from_response(response)
}

impl GroupResponse {
    /// Build from an already-parsed status line whose message carries
    /// `count low high name`.
    pub fn from_response(response: Response) -> Result<Self> {
        let mut tokens = response.message.split_whitespace();
        let malformed =
            || NntpError::Protocol(format!("malformed group response: {}", response.message));
        let count: i64 = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
        let low: i64 = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
        let high: i64 = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
        let name = tokens.next().ok_or_else(malformed)?.to_string();
        Ok(Self {
            code: response.code,
            message: response.message.clone(),
            count,
            low,
            high,
            name,
        })
    }
}

/// LISTGROUP response: GROUP fields plus the article numbers in the group.
#[derive(Debug, Clone)]
pub struct ListGroupResponse {
    pub code: u16,
    pub message: String,
    pub count: i64,
    pub low: i64,
    pub high: i64,
    pub name: String,
    pub article_numbers: Vec<i64>,
}

impl ListGroupResponse {
    pub fn new(group: GroupResponse, lines: &[String]) -> Self {
        let article_numbers = lines.iter().filter_map(|l| l.trim().parse().ok()).collect();
        Self {
            code: group.code,
            message: group.message,
            count: group.count,
            low: group.low,
            high: group.high,
            name: group.name,
            article_numbers,
        }
    }
}

/// STAT/NEXT/LAST outcome. 430 and 423 are information, not failures: the
/// article simply is not there.
#[derive(Debug, Clone)]
pub enum StatResponse {
    Found { number: i64, message_id: String },
    NotFound { code: u16, message: String },
}

impl StatResponse {
    pub fn is_found(&self) -> bool {
        matches!(self, StatResponse::Found { .. })
    }
}

/// Article overview from an OVER/XOVER response (tab-separated fields).
#[derive(Debug, Clone)]
pub struct OverviewEntry {
    pub article_number: i64,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub message_id: String,
    pub references: String,
    pub bytes: i64,
    pub lines: i64,
}

pub fn parse_overview_line(line: &str) -> Option<OverviewEntry> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return None;
    }
    Some(OverviewEntry {
        article_number: fields[0].parse().ok()?,
        subject: fields[1].to_string(),
        from: fields[2].to_string(),
        date: fields[3].to_string(),
        message_id: fields[4].to_string(),
        references: fields[5].to_string(),
        bytes: fields[6].parse().unwrap_or(0),
        lines: fields[7].parse().unwrap_or(0),
    })
}

/// Newsgroup entry from LIST ACTIVE or NEWGROUPS: `name high low status`.
#[derive(Debug, Clone)]
pub struct NewsgroupEntry {
    pub name: String,
    pub high: i64,
    pub low: i64,
    pub status: char,
}

pub fn parse_newsgroup_line(line: &str) -> Option<NewsgroupEntry> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?.to_string();
    let high: i64 = parts.next()?.parse().ok()?;
    let low: i64 = parts.next()?.parse().ok()?;
    let status = parts.next()?.chars().next().unwrap_or('y');
    Some(NewsgroupEntry { name, high, low, status })
}
