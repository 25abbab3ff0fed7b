/*
 * config.rs
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

//! Server configuration for a connection pool. Credentials are an optional
//! pair (both username and password, or neither); the keepalive and idle
//! grace intervals are in milliseconds, with zero disabling the feature.

use crate::protocol::nntp::NntpError;

/// Configuration for one news server and the pool of connections to it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upper bound on concurrently open sockets. Must be at least 1.
    pub max_connections: u32,
    /// Interval between keepalive probes on idle connections. 0 disables probing.
    pub keepalive_interval_ms: i64,
    /// Inactivity period after which the pool closes its connections. 0 disables.
    pub idle_grace_period_ms: i64,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
            username: None,
            password: None,
            max_connections: 1,
            keepalive_interval_ms: 60_000,
            idle_grace_period_ms: 300_000,
        }
    }

    pub fn set_use_tls(&mut self, use_tls: bool) -> &mut Self {
        self.use_tls = use_tls;
        self
    }

    pub fn set_credentials(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn set_max_connections(&mut self, max_connections: u32) -> &mut Self {
        self.max_connections = max_connections;
        self
    }

    pub fn set_keepalive_interval_ms(&mut self, interval_ms: i64) -> &mut Self {
        self.keepalive_interval_ms = interval_ms;
        self
    }

    pub fn set_idle_grace_period_ms(&mut self, grace_ms: i64) -> &mut Self {
        self.idle_grace_period_ms = grace_ms;
        self
    }

    /// Username and password as a pair, when both are present.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        }
    }

    /// Check the option constraints: `max_connections >= 1`, credentials both-or-neither.
    pub fn validate(&self) -> Result<(), NntpError> {
        if self.host.is_empty() {
            return Err(NntpError::Protocol("host must not be empty".into()));
        }
        if self.max_connections < 1 {
            return Err(NntpError::Protocol("max_connections must be at least 1".into()));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(NntpError::Protocol(
                "username and password must be set together".into(),
            ));
        }
        Ok(())
    }
}
