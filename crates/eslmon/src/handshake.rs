//! Authentication handshake
//!
//! On connect the peer sends `auth/request`; the client answers with
//! `auth <password>` and expects a `command/reply` starting with `+OK`.

use esl_protocol::ContentType;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::Connection;
use crate::error::CommandError;

/// Reply-Text prefix of a successful command
const SUCCESS_PREFIX: &str = "+OK";

/// Authenticate a freshly opened connection
///
/// Not retried; the caller bounds it with the command timeout.
pub async fn authenticate<S>(conn: &mut Connection<S>, password: &str) -> Result<(), CommandError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let request = conn.read().await.map_err(CommandError::Read)?;
    match request.kind() {
        ContentType::AuthRequest => {}
        ContentType::RudeRejection => return Err(CommandError::AccessDenied),
        ContentType::DisconnectNotice => return Err(CommandError::ServerDisconnected),
        _ => {
            return Err(CommandError::UnexpectedContentType {
                phase: "auth request",
                content_type: request.content_type,
            })
        }
    }

    let reply = conn.send(&format!("auth {password}")).await?;
    if reply.kind() != ContentType::CommandReply {
        return Err(CommandError::UnexpectedContentType {
            phase: "auth response",
            content_type: reply.content_type,
        });
    }

    if !reply.text().starts_with(SUCCESS_PREFIX) {
        return Err(CommandError::InvalidPassword);
    }

    tracing::debug!("authenticated");
    Ok(())
}
