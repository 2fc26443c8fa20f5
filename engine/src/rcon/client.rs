//! Evrima RCON client
//! Stateless, connection-per-call binary TCP client
//!
//! Every call opens a fresh connection, authenticates, executes one command
//! and reads one reply. No failure ever crosses this boundary as an error:
//! the caller receives [`RconResponse::NoResponse`] and decides what absence
//! of a reply means.

use crate::constants::{RCON_MAX_REPLY_BYTES, RCON_TIMEOUT_MS};
use crate::domain::{DomainError, Result};
use crate::rcon::Opcode;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

const PACKET_AUTH: u8 = 0x01;
const PACKET_EXEC: u8 = 0x02;

/// One admin command: opcode byte plus optional UTF-8 argument text
#[derive(Debug, Clone)]
pub struct RconCommand {
    pub opcode: Opcode,
    pub args: Option<String>,
}

impl RconCommand {
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, args: None }
    }

    pub fn with_args(opcode: Opcode, args: impl Into<String>) -> Self {
        Self {
            opcode,
            args: Some(args.into()),
        }
    }
}

/// Outcome of an RCON call: a reply string or an explicit no-response
/// sentinel, never an implicit empty success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RconResponse {
    Reply(String),
    NoResponse,
}

impl RconResponse {
    pub fn is_reply(&self) -> bool {
        matches!(self, RconResponse::Reply(_))
    }
}

/// True iff the auth reply matches the server's acceptance pattern
fn is_auth_accepted(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    lower.contains("accepted") || lower.contains("logged in")
}

/// Connection-per-call RCON client; holds only host, port and password
#[derive(Debug, Clone)]
pub struct RconClient {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl RconClient {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout: Duration::from_millis(RCON_TIMEOUT_MS),
        }
    }

    /// Override the per-operation bound (connect, read and write each)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute one command; every failure resolves to `NoResponse`
    pub async fn execute(&self, command: RconCommand) -> RconResponse {
        match self.execute_inner(&command).await {
            Ok(reply) => {
                debug!(opcode = %command.opcode, bytes = reply.len(), "RCON reply received");
                RconResponse::Reply(reply)
            }
            Err(e) => {
                warn!(opcode = %command.opcode, error = %e, "RCON command failed");
                RconResponse::NoResponse
            }
        }
    }

    /// Auth-then-exec on a fresh connection, two round trips
    async fn execute_inner(&self, command: &RconCommand) -> Result<String> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DomainError::Timeout(format!("connect to {}", addr)))?
            .map_err(|e| DomainError::ConnectionFailed(format!("{}: {}", addr, e)))?;

        // Auth: [0x01][password][0x00]
        let mut frame = Vec::with_capacity(self.password.len() + 2);
        frame.push(PACKET_AUTH);
        frame.extend_from_slice(self.password.as_bytes());
        frame.push(0x00);
        self.write_frame(&mut stream, &frame, "auth write").await?;

        let auth_reply = self.read_reply(&mut stream, "auth read").await?;
        if !is_auth_accepted(&auth_reply) {
            return Err(DomainError::AuthenticationFailed);
        }

        // Exec: [0x02][opcode][args][0x00]
        let args = command.args.as_deref().unwrap_or("");
        let mut frame = Vec::with_capacity(args.len() + 3);
        frame.push(PACKET_EXEC);
        frame.push(command.opcode.byte());
        frame.extend_from_slice(args.as_bytes());
        frame.push(0x00);
        self.write_frame(&mut stream, &frame, "exec write").await?;

        self.read_reply(&mut stream, "exec read").await
    }

    async fn write_frame(
        &self,
        stream: &mut TcpStream,
        frame: &[u8],
        operation: &str,
    ) -> Result<()> {
        timeout(self.timeout, stream.write_all(frame))
            .await
            .map_err(|_| DomainError::Timeout(operation.to_string()))?
            .map_err(|e| DomainError::ConnectionFailed(format!("{}: {}", operation, e)))
    }

    /// One bounded read; the reply is assumed to arrive whole, no reassembly
    async fn read_reply(&self, stream: &mut TcpStream, operation: &str) -> Result<String> {
        let mut buf = vec![0u8; RCON_MAX_REPLY_BYTES];
        let mut n = timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| DomainError::Timeout(operation.to_string()))?
            .map_err(|e| DomainError::ConnectionFailed(format!("{}: {}", operation, e)))?;

        // A zero-byte read means the peer closed without replying
        if n == 0 {
            return Err(DomainError::ConnectionFailed(format!(
                "{}: connection closed before reply",
                operation
            )));
        }

        while n > 0 && buf[n - 1] == 0 {
            n -= 1;
        }
        Ok(String::from_utf8_lossy(&buf[..n]).to_string())
    }

    // ===== Admin operations, all funnelled through execute =====

    pub async fn save(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::Save)).await
    }

    pub async fn announce(&self, message: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::Announce, message))
            .await
    }

    pub async fn direct_message(&self, player_id: &str, message: &str) -> RconResponse {
        self.execute(RconCommand::with_args(
            Opcode::DirectMessage,
            format!("{},{}", player_id, message),
        ))
        .await
    }

    pub async fn server_details(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::ServerDetails)).await
    }

    pub async fn wipe_corpses(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::WipeCorpses)).await
    }

    pub async fn update_playables(&self, classes: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::UpdatePlayables, classes))
            .await
    }

    pub async fn ban(&self, player_id: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::Ban, player_id))
            .await
    }

    pub async fn kick(&self, player_id: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::Kick, player_id))
            .await
    }

    pub async fn player_data(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::PlayerData)).await
    }

    pub async fn toggle_whitelist(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::ToggleWhitelist)).await
    }

    pub async fn add_whitelist_id(&self, player_id: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::AddWhitelistId, player_id))
            .await
    }

    pub async fn remove_whitelist_id(&self, player_id: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::RemoveWhitelistId, player_id))
            .await
    }

    pub async fn toggle_global_chat(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::ToggleGlobalChat)).await
    }

    pub async fn toggle_humans(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::ToggleHumans)).await
    }

    pub async fn toggle_ai(&self) -> RconResponse {
        self.execute(RconCommand::new(Opcode::ToggleAi)).await
    }

    pub async fn disable_ai_classes(&self, classes: &str) -> RconResponse {
        self.execute(RconCommand::with_args(Opcode::DisableAiClasses, classes))
            .await
    }

    pub async fn ai_density(&self, density: f32) -> RconResponse {
        self.execute(RconCommand::with_args(
            Opcode::AiDensity,
            density.to_string(),
        ))
        .await
    }
}
