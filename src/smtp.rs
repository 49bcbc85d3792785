//! Transports: SMTP submission through lettre, and a dry run that only logs.
//!
//! The SMTP transport drives lettre's connection-level API directly instead of
//! its pooled `SmtpTransport`, so one session can be held across many sends
//! and reopened explicitly when the server drops it.

use crate::config::{SenderCredentials, SmtpConfig};
use crate::delivery::{MailSession, OutgoingMessage, Transport, TransportError};
use lettre::Message;
use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::Rset;
use lettre::transport::smtp::extension::ClientId;
use std::time::Duration;

/// `List-Unsubscribe` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// Convert an outgoing message into a lettre message.
///
/// Unparseable addresses are a rejection of this recipient, not a transport
/// failure.
pub fn to_lettre_message(message: &OutgoingMessage) -> Result<Message, TransportError> {
    let from = Mailbox::new(
        message.from_name.clone(),
        message
            .from
            .parse()
            .map_err(|_| TransportError::Rejected(format!("invalid sender {}", message.from)))?,
    );
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|_| TransportError::Rejected(format!("invalid address {}", message.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ListUnsubscribe(message.list_unsubscribe.clone()))
        .singlepart(SinglePart::html(message.html.clone()))
        .map_err(|e| TransportError::Rejected(e.to_string()))
}

// ============================================================================
// SMTP
// ============================================================================

/// SMTP submission with STARTTLS and PLAIN/LOGIN authentication.
pub struct SmtpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    credentials: Credentials,
}

impl SmtpTransport {
    pub fn new(smtp: &SmtpConfig, sender: &SenderCredentials) -> Self {
        Self {
            host: smtp.host.clone(),
            port: smtp.port,
            timeout: smtp.timeout(),
            credentials: Credentials::new(sender.email.clone(), sender.password.clone()),
        }
    }
}

impl Transport for SmtpTransport {
    type Session = SmtpSession;

    fn connect(&self) -> Result<SmtpSession, TransportError> {
        let connect_err = |e: lettre::transport::smtp::Error| TransportError::Connect(e.to_string());
        let hello = ClientId::default();

        tracing::debug!(host = %self.host, port = self.port, "connecting");
        let mut conn = SmtpConnection::connect(
            (self.host.as_str(), self.port),
            Some(self.timeout),
            &hello,
            None,
            None,
        )
        .map_err(connect_err)?;

        let tls = TlsParameters::new(self.host.clone()).map_err(connect_err)?;
        conn.starttls(&tls, &hello).map_err(connect_err)?;

        if let Err(e) = conn.auth(&[Mechanism::Plain, Mechanism::Login], &self.credentials) {
            let _ = conn.quit();
            return Err(if e.is_permanent() {
                TransportError::Auth(e.to_string())
            } else {
                TransportError::Connect(e.to_string())
            });
        }

        Ok(SmtpSession { conn, broken: false })
    }
}

pub struct SmtpSession {
    conn: SmtpConnection,
    broken: bool,
}

impl MailSession for SmtpSession {
    fn send(&mut self, message: &OutgoingMessage) -> Result<(), TransportError> {
        if self.broken || !self.conn.test_connected() {
            return Err(TransportError::Disconnected("connection closed".to_string()));
        }
        let email = to_lettre_message(message)?;

        match self.conn.send(email.envelope(), &email.formatted()) {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() || e.is_client() => {
                // Leave the connection ready for the next recipient.
                if self.conn.command(Rset).is_err() {
                    self.broken = true;
                }
                Err(TransportError::Rejected(e.to_string()))
            }
            Err(e) => {
                self.broken = true;
                Err(TransportError::Disconnected(e.to_string()))
            }
        }
    }

    fn close(&mut self) {
        if self.conn.quit().is_err() {
            self.conn.abort();
        }
    }
}

// ============================================================================
// Dry run
// ============================================================================

/// Logs every message instead of sending it. Needs no network or credentials.
#[derive(Debug, Default)]
pub struct DryRunTransport;

pub struct DryRunSession;

impl Transport for DryRunTransport {
    type Session = DryRunSession;

    fn connect(&self) -> Result<DryRunSession, TransportError> {
        tracing::info!("dry run: no mail will be sent");
        Ok(DryRunSession)
    }
}

impl MailSession for DryRunSession {
    fn send(&mut self, message: &OutgoingMessage) -> Result<(), TransportError> {
        // Surface addresses lettre would refuse, as a real send would.
        to_lettre_message(message)?;
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "dry run: would send"
        );
        Ok(())
    }

    fn close(&mut self) {}
}
