/*
 * client.rs
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

//! Typed per-command operations over one connection: CAPABILITIES, MODE
//! READER, GROUP, LISTGROUP, ARTICLE/HEAD/BODY, STAT/NEXT/LAST, OVER, HDR,
//! LIST ACTIVE, NEWGROUPS/NEWNEWS, HELP, DATE, POST/IHAVE, QUIT. Binary
//! bodies go through the streaming yEnc pipeline.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::ServerConfig;
use crate::yenc::{body as yenc_body, YencEventStream, YencHeaders};

use super::connection::NntpConnection;
use super::error::{NntpError, Result};
use super::response::{
    parse_article_response_line, parse_newsgroup_line, parse_overview_line, ArticleResponse,
    GroupResponse, ListGroupResponse, NewsgroupEntry, OverviewEntry, Response, StatResponse,
};

/// How an article-family command addresses its article.
#[derive(Debug, Clone, Copy)]
pub enum ArticleRef<'a> {
    Number(i64),
    /// Message-id including the angle brackets, e.g. `<part1@example>`.
    MessageId(&'a str),
    /// The server's current article.
    Current,
}

impl ArticleRef<'_> {
    fn command(&self, verb: &str) -> String {
        match self {
            ArticleRef::Number(n) => format!("{} {}", verb, n),
            ArticleRef::MessageId(id) => format!("{} {}", verb, id),
            ArticleRef::Current => verb.to_string(),
        }
    }
}

fn unexpected(cmd: &str, response: &Response) -> NntpError {
    NntpError::Protocol(format!("{} failed: {} {}", cmd, response.code, response.message))
}

/// Typed command client over one NNTP connection. Like the connection it is
/// not concurrent: one command at a time, serialised by the command lock.
pub struct NntpClient {
    connection: NntpConnection,
}

impl NntpClient {
    /// Connect per the configuration and authenticate when credentials are set.
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let connection =
            NntpConnection::connect(&config.host, config.port, config.use_tls).await?;
        if let Some((user, pass)) = config.credentials() {
            connection.authinfo(&user, &pass).await?;
        }
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &NntpConnection {
        &self.connection
    }

    pub fn posting_allowed(&self) -> bool {
        self.connection.posting_allowed()
    }

    /// Await a pending reconnect, if any.
    pub async fn ensure_connected(&self) -> Result<()> {
        self.connection.ensure_connected().await
    }

    pub fn schedule_reconnect(&self) {
        self.connection.schedule_reconnect()
    }

    pub async fn close(&self) {
        self.connection.close().await
    }

    /// CAPABILITIES (RFC 3977 §5.2).
    pub async fn capabilities(&self) -> Result<Vec<String>> {
        let (response, lines) = self.connection.command_multiline("CAPABILITIES").await?;
        if response.code != 101 {
            return Err(unexpected("CAPABILITIES", &response));
        }
        Ok(lines)
    }

    /// MODE READER (RFC 3977 §5.3).
    pub async fn mode_reader(&self) -> Result<Response> {
        let response = self.connection.command("MODE READER").await?;
        match response.code {
            200 | 201 => Ok(response),
            _ => Err(unexpected("MODE READER", &response)),
        }
    }

    /// GROUP: select a newsgroup, returning count and water marks.
    pub async fn group(&self, name: &str) -> Result<GroupResponse> {
        let response = self.connection.command(&format!("GROUP {}", name)).await?;
        if response.code != 211 {
            return Err(unexpected("GROUP", &response));
        }
        GroupResponse::from_response(response)
    }

    /// LISTGROUP: select a newsgroup and list its article numbers.
    pub async fn listgroup(&self, name: Option<&str>) -> Result<ListGroupResponse> {
        let cmd = match name {
            Some(n) => format!("LISTGROUP {}", n),
            None => "LISTGROUP".to_string(),
        };
        let (response, lines) = self.connection.command_multiline(&cmd).await?;
        if response.code != 211 {
            return Err(unexpected("LISTGROUP", &response));
        }
        Ok(ListGroupResponse::new(GroupResponse::from_response(response)?, &lines))
    }

    /// ARTICLE: headers and body as text lines.
    pub async fn article(&self, article: ArticleRef<'_>) -> Result<ArticleResponse> {
        let (response, lines) =
            self.connection.command_multiline(&article.command("ARTICLE")).await?;
        match response.code {
            220 => Ok(ArticleResponse::new(response, lines)),
            430 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected("ARTICLE", &response)),
        }
    }

    /// HEAD: headers only.
    pub async fn head(&self, article: ArticleRef<'_>) -> Result<ArticleResponse> {
        let (response, lines) = self.connection.command_multiline(&article.command("HEAD")).await?;
        match response.code {
            221 => Ok(ArticleResponse::new(response, lines)),
            430 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected("HEAD", &response)),
        }
    }

    /// BODY as text lines. For binary articles use `body_yenc`.
    pub async fn body(&self, article: ArticleRef<'_>) -> Result<ArticleResponse> {
        let (response, lines) = self.connection.command_multiline(&article.command("BODY")).await?;
        match response.code {
            222 => Ok(ArticleResponse::new(response, lines)),
            430 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected("BODY", &response)),
        }
    }

    /// BODY through the streaming yEnc pipeline: yields the parsed headers,
    /// then a byte stream of decoded data. The connection stays dedicated to
    /// the stream until it completes or is abandoned.
    pub async fn body_yenc(&self, article: ArticleRef<'_>) -> Result<YencEventStream> {
        let (response, guard) = self.connection.command_raw(&article.command("BODY")).await?;
        match response.code {
            222 => yenc_body::fetch_body(guard).await,
            430 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected("BODY", &response)),
        }
    }

    /// yEnc headers without the body. The body bytes are left on the wire, so
    /// this always costs a background reconnect; it is for peeking at part
    /// declarations, not for bulk use.
    pub async fn body_yenc_headers(&self, article: ArticleRef<'_>) -> Result<YencHeaders> {
        let (response, guard) = self.connection.command_raw(&article.command("BODY")).await?;
        match response.code {
            222 => yenc_body::fetch_headers_only(guard).await,
            430 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected("BODY", &response)),
        }
    }

    /// STAT: existence check. 430/423 come back as `NotFound`, not an error.
    pub async fn stat(&self, article: ArticleRef<'_>) -> Result<StatResponse> {
        self.stat_like(&article.command("STAT"), &[430, 423]).await
    }

    /// NEXT: move to and report the next article in the group.
    pub async fn next(&self) -> Result<StatResponse> {
        self.stat_like("NEXT", &[420, 421]).await
    }

    /// LAST: move to and report the previous article in the group.
    pub async fn last(&self) -> Result<StatResponse> {
        self.stat_like("LAST", &[420, 422]).await
    }

    async fn stat_like(&self, cmd: &str, not_found: &[u16]) -> Result<StatResponse> {
        let response = self.connection.command(cmd).await?;
        if response.code == 223 {
            let (number, message_id) = parse_article_response_line(&response.message);
            return Ok(StatResponse::Found { number, message_id });
        }
        if not_found.contains(&response.code) {
            return Ok(StatResponse::NotFound { code: response.code, message: response.message });
        }
        Err(unexpected(cmd, &response))
    }

    /// OVER: overview records for an article number range (inclusive).
    pub async fn over(&self, low: i64, high: i64) -> Result<Vec<OverviewEntry>> {
        self.over_command(&format!("OVER {}-{}", low, high)).await
    }

    /// XOVER: pre-RFC-3977 spelling of OVER, still common on binary servers.
    pub async fn xover(&self, low: i64, high: i64) -> Result<Vec<OverviewEntry>> {
        self.over_command(&format!("XOVER {}-{}", low, high)).await
    }

    async fn over_command(&self, cmd: &str) -> Result<Vec<OverviewEntry>> {
        let (response, lines) = self.connection.command_multiline(cmd).await?;
        match response.code {
            224 => Ok(lines.iter().filter_map(|l| parse_overview_line(l)).collect()),
            420 | 423 => Err(NntpError::ArticleNotFound(response.message)),
            _ => Err(unexpected(cmd, &response)),
        }
    }

    /// HDR: one header field over a range, raw lines.
    pub async fn hdr(&self, field: &str, range: &str) -> Result<Vec<String>> {
        self.hdr_command(&format!("HDR {} {}", field, range)).await
    }

    /// XHDR: legacy spelling of HDR.
    pub async fn xhdr(&self, field: &str, range: &str) -> Result<Vec<String>> {
        self.hdr_command(&format!("XHDR {} {}", field, range)).await
    }

    async fn hdr_command(&self, cmd: &str) -> Result<Vec<String>> {
        let (response, lines) = self.connection.command_multiline(cmd).await?;
        match response.code {
            221 | 225 => Ok(lines),
            _ => Err(unexpected(cmd, &response)),
        }
    }

    /// LIST ACTIVE, optionally filtered by a wildmat.
    pub async fn list_active(&self, wildmat: Option<&str>) -> Result<Vec<NewsgroupEntry>> {
        let cmd = match wildmat {
            Some(w) => format!("LIST ACTIVE {}", w),
            None => "LIST ACTIVE".to_string(),
        };
        let (response, lines) = self.connection.command_multiline(&cmd).await?;
        if response.code != 215 {
            return Err(unexpected("LIST ACTIVE", &response));
        }
        Ok(lines.iter().filter_map(|l| parse_newsgroup_line(l)).collect())
    }

    /// NEWGROUPS: groups created since the given instant.
    pub async fn newgroups(&self, since: DateTime<Utc>) -> Result<Vec<NewsgroupEntry>> {
        let cmd = format!("NEWGROUPS {} GMT", since.format("%Y%m%d %H%M%S"));
        let (response, lines) = self.connection.command_multiline(&cmd).await?;
        if response.code != 231 {
            return Err(unexpected("NEWGROUPS", &response));
        }
        Ok(lines.iter().filter_map(|l| parse_newsgroup_line(l)).collect())
    }

    /// NEWNEWS: message-ids posted to matching groups since the given instant.
    pub async fn newnews(&self, wildmat: &str, since: DateTime<Utc>) -> Result<Vec<String>> {
        let cmd = format!("NEWNEWS {} {} GMT", wildmat, since.format("%Y%m%d %H%M%S"));
        let (response, lines) = self.connection.command_multiline(&cmd).await?;
        if response.code != 230 {
            return Err(unexpected("NEWNEWS", &response));
        }
        Ok(lines)
    }

    /// HELP text.
    pub async fn help(&self) -> Result<Vec<String>> {
        let (response, lines) = self.connection.command_multiline("HELP").await?;
        if response.code != 100 {
            return Err(unexpected("HELP", &response));
        }
        Ok(lines)
    }

    /// DATE: the server's clock, `yyyymmddhhmmss` UTC.
    pub async fn date(&self) -> Result<NaiveDateTime> {
        let response = self.connection.command("DATE").await?;
        if response.code != 111 {
            return Err(unexpected("DATE", &response));
        }
        let stamp = response.message.split_whitespace().next().unwrap_or("");
        NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").map_err(|_| {
            NntpError::Protocol(format!("malformed DATE response: {}", response.message))
        })
    }

    /// POST: two-phase submission of a complete article (headers and body).
    /// Dot-stuffing and the terminator are handled here.
    pub async fn post(&self, article: &str) -> Result<()> {
        let response = self.connection.command_with_body("POST", 340, article).await?;
        if response.code == 240 {
            Ok(())
        } else {
            Err(unexpected("POST", &response))
        }
    }

    /// IHAVE: offer an article by message-id, then transfer it.
    pub async fn ihave(&self, message_id: &str, article: &str) -> Result<()> {
        let cmd = format!("IHAVE {}", message_id);
        let response = self.connection.command_with_body(&cmd, 335, article).await?;
        if response.code == 235 {
            Ok(())
        } else {
            Err(unexpected("IHAVE", &response))
        }
    }

    /// QUIT and close the socket. Best-effort: a failed QUIT still closes.
    pub async fn quit(&self) -> Result<()> {
        let _ = self.connection.command("QUIT").await;
        self.connection.close().await;
        Ok(())
    }
}
