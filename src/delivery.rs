//! Bulk delivery of a rendered issue.
//!
//! One transport session is opened for the whole run and reused for every
//! recipient. Each recipient gets its own message (`To` is that recipient
//! only).
//!
//! ## Failure handling
//!
//! | Condition                         | Effect                                   |
//! |-----------------------------------|------------------------------------------|
//! | connect/auth fails at start       | fatal [`DeliveryError`], nothing sent    |
//! | [`TransportError::Disconnected`]  | reconnect and retry, up to the ceiling   |
//! | [`TransportError::Rejected`]      | recipient recorded as failed, no retry   |
//! | retries exhausted                 | recipient recorded as failed             |
//!
//! The session lives in a [`SessionGuard`], so it is closed on every path out
//! of [`deliver`], including early returns and panics.
//!
//! ## Pacing
//!
//! Consecutive sends are separated by `smtp.send_delay_secs`. There is no
//! delay after the last recipient. The sleep function is injected so tests
//! run instantly and can observe the pauses.

use crate::config::SmtpConfig;
use crate::types::RenderedDocument;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport or one of its sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    Disconnected(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Fatal errors of a delivery run.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Mail server rejected the credentials: {0}")]
    Auth(String),
    #[error("Could not open a mail session: {0}")]
    Connect(String),
}

impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth(reason) => Self::Auth(reason),
            other => Self::Connect(other.to_string()),
        }
    }
}

/// A single message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub from_name: Option<String>,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub list_unsubscribe: String,
}

/// An open, authenticated connection to a mail-submission service.
pub trait MailSession {
    fn send(&mut self, message: &OutgoingMessage) -> Result<(), TransportError>;
    /// Close the session. Must be safe to call on a broken connection.
    fn close(&mut self);
}

/// Opens sessions.
pub trait Transport {
    type Session: MailSession;

    /// Connect, secure and authenticate.
    fn connect(&self) -> Result<Self::Session, TransportError>;
}

// ============================================================================
// Session guard
// ============================================================================

/// Owns the current session and closes it when dropped.
pub struct SessionGuard<S: MailSession> {
    session: Option<S>,
}

impl<S: MailSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Install a new session, closing the previous one if any.
    pub fn replace(&mut self, session: S) {
        self.close();
        self.session = Some(session);
    }

    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run `op` against the guarded session, reconnecting on disconnect.
///
/// `ceiling` is the total number of attempts (at least one). A failed
/// reconnect consumes an attempt. Errors other than
/// [`TransportError::Disconnected`] are returned immediately.
pub fn with_reconnect<T, R>(
    transport: &T,
    guard: &mut SessionGuard<T::Session>,
    ceiling: u32,
    mut op: impl FnMut(&mut T::Session) -> Result<R, TransportError>,
) -> Result<R, TransportError>
where
    T: Transport,
{
    let ceiling = ceiling.max(1);
    let mut last_error = TransportError::Disconnected("no session".to_string());

    for attempt in 1..=ceiling {
        if !guard.is_open() {
            match transport.connect() {
                Ok(session) => {
                    tracing::debug!(attempt, "reconnected");
                    guard.replace(session);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect failed");
                    last_error = e;
                    continue;
                }
            }
        }
        let Some(session) = guard.session_mut() else {
            continue;
        };
        match op(session) {
            Ok(value) => return Ok(value),
            Err(TransportError::Disconnected(reason)) => {
                tracing::warn!(attempt, ceiling, %reason, "session dropped");
                guard.close();
                last_error = TransportError::Disconnected(reason);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}

// ============================================================================
// Messages
// ============================================================================

/// Who the newsletter is sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub name: Option<String>,
    pub unsubscribe: Option<String>,
}

impl Sender {
    pub fn new(address: impl Into<String>, smtp: &SmtpConfig) -> Self {
        Self {
            address: address.into(),
            name: smtp.from_name.clone(),
            unsubscribe: smtp.unsubscribe.clone(),
        }
    }

    /// `List-Unsubscribe` value: configured, or a mailto back to the sender.
    pub fn list_unsubscribe(&self) -> String {
        self.unsubscribe
            .clone()
            .unwrap_or_else(|| format!("<mailto:{}?subject=unsubscribe>", self.address))
    }
}

/// Build the message for one recipient.
pub fn build_message(sender: &Sender, document: &RenderedDocument, to: &str) -> OutgoingMessage {
    OutgoingMessage {
        from: sender.address.clone(),
        from_name: sender.name.clone(),
        to: to.to_string(),
        subject: document.title.clone(),
        html: document.html.clone(),
        list_unsubscribe: sender.list_unsubscribe(),
    }
}

// ============================================================================
// Delivery loop
// ============================================================================

/// Retry and pacing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub retry_ceiling: u32,
    pub send_delay: Duration,
}

impl From<&SmtpConfig> for DeliverySettings {
    fn from(smtp: &SmtpConfig) -> Self {
        Self {
            retry_ceiling: smtp.retry_ceiling,
            send_delay: smtp.send_delay(),
        }
    }
}

/// Outcome for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Sent,
    Failed(String),
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub results: Vec<(String, DeliveryResult)>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn sent(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| *r == DeliveryResult::Sent)
            .map(|(addr, _)| addr.as_str())
            .collect()
    }

    /// Failed addresses with their reasons.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter_map(|(addr, r)| match r {
                DeliveryResult::Failed(reason) => Some((addr.as_str(), reason.as_str())),
                DeliveryResult::Sent => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }
}

/// Send `document` to every recipient, one message each.
///
/// Returns an error only when the initial session cannot be opened; every
/// per-recipient problem is recorded in the report instead.
pub fn deliver<T: Transport>(
    transport: &T,
    document: &RenderedDocument,
    recipients: &[String],
    sender: &Sender,
    settings: &DeliverySettings,
    mut sleep: impl FnMut(Duration),
) -> Result<DeliveryReport, DeliveryError> {
    let mut guard = SessionGuard::new(transport.connect()?);
    tracing::info!(issue = %document.issue, recipients = recipients.len(), "session opened");

    let mut report = DeliveryReport::default();
    for (index, recipient) in recipients.iter().enumerate() {
        if index > 0 && !settings.send_delay.is_zero() {
            sleep(settings.send_delay);
        }

        let message = build_message(sender, document, recipient);
        let result = match with_reconnect(transport, &mut guard, settings.retry_ceiling, |s| {
            s.send(&message)
        }) {
            Ok(()) => {
                tracing::info!(%recipient, "sent");
                DeliveryResult::Sent
            }
            Err(e) => {
                tracing::warn!(%recipient, error = %e, "delivery failed");
                DeliveryResult::Failed(e.to_string())
            }
        };
        report.results.push((recipient.clone(), result));
    }

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    /// Everything the mock transport observed, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Connect,
        Send(String),
        Close,
    }

    #[derive(Default)]
    struct State {
        events: Vec<Event>,
        connect_failures: VecDeque<TransportError>,
        send_failures: HashMap<String, VecDeque<TransportError>>,
        always_disconnect: Vec<String>,
        sent: Vec<OutgoingMessage>,
    }

    /// Transport with scripted failures. Sessions share its state.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Rc<RefCell<State>>,
    }

    pub struct MockSession {
        state: Rc<RefCell<State>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `connect` call with `err`.
        pub fn fail_next_connect(&self, err: TransportError) {
            self.state.borrow_mut().connect_failures.push_back(err);
        }

        /// Fail the next send to `to` with `err`.
        pub fn fail_send(&self, to: &str, err: TransportError) {
            self.state
                .borrow_mut()
                .send_failures
                .entry(to.to_string())
                .or_default()
                .push_back(err);
        }

        /// Every send to `to` drops the connection.
        pub fn always_disconnect(&self, to: &str) {
            self.state.borrow_mut().always_disconnect.push(to.to_string());
        }

        pub fn events(&self) -> Vec<Event> {
            self.state.borrow().events.clone()
        }

        pub fn sent(&self) -> Vec<OutgoingMessage> {
            self.state.borrow().sent.clone()
        }

        pub fn count(&self, wanted: &Event) -> usize {
            self.events().iter().filter(|e| *e == wanted).count()
        }
    }

    impl Transport for MockTransport {
        type Session = MockSession;

        fn connect(&self) -> Result<MockSession, TransportError> {
            let mut state = self.state.borrow_mut();
            state.events.push(Event::Connect);
            if let Some(err) = state.connect_failures.pop_front() {
                return Err(err);
            }
            Ok(MockSession {
                state: Rc::clone(&self.state),
            })
        }
    }

    impl MailSession for MockSession {
        fn send(&mut self, message: &OutgoingMessage) -> Result<(), TransportError> {
            let mut state = self.state.borrow_mut();
            state.events.push(Event::Send(message.to.clone()));
            if state.always_disconnect.contains(&message.to) {
                return Err(TransportError::Disconnected("server hung up".to_string()));
            }
            if let Some(err) = state
                .send_failures
                .get_mut(&message.to)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
            state.sent.push(message.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.state.borrow_mut().events.push(Event::Close);
        }
    }

    fn document() -> RenderedDocument {
        RenderedDocument {
            issue: "2024-01-01".to_string(),
            title: "Issue #1".to_string(),
            html: "<p>Hello</p>".to_string(),
        }
    }

    fn sender() -> Sender {
        Sender {
            address: "news@example.org".to_string(),
            name: Some("The News".to_string()),
            unsubscribe: None,
        }
    }

    fn settings() -> DeliverySettings {
        DeliverySettings {
            retry_ceiling: 3,
            send_delay: Duration::from_secs(3),
        }
    }

    fn addresses(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(transport: &MockTransport, recipients: &[String]) -> (DeliveryReport, Vec<Duration>) {
        let mut sleeps = Vec::new();
        let report = deliver(
            transport,
            &document(),
            recipients,
            &sender(),
            &settings(),
            |d| sleeps.push(d),
        )
        .unwrap();
        (report, sleeps)
    }

    // =========================================================================
    // Delivery completeness
    // =========================================================================

    #[test]
    fn every_recipient_gets_one_message() {
        let transport = MockTransport::new();
        let recipients = addresses(&["a@x.org", "b@x.org", "c@x.org"]);

        let (report, _) = run(&transport, &recipients);

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.sent(), vec!["a@x.org", "b@x.org", "c@x.org"]);
        assert!(report.failed().is_empty());
        assert!(report.is_success());

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        for (message, expected) in sent.iter().zip(&recipients) {
            assert_eq!(&message.to, expected);
            assert_eq!(message.subject, "Issue #1");
            assert_eq!(message.html, "<p>Hello</p>");
        }
        assert_eq!(transport.count(&Event::Connect), 1);
    }

    #[test]
    fn message_carries_sender_and_unsubscribe() {
        let message = build_message(&sender(), &document(), "a@x.org");
        assert_eq!(message.from, "news@example.org");
        assert_eq!(message.from_name.as_deref(), Some("The News"));
        assert_eq!(
            message.list_unsubscribe,
            "<mailto:news@example.org?subject=unsubscribe>"
        );
    }

    #[test]
    fn configured_unsubscribe_overrides_default() {
        let mut sender = sender();
        sender.unsubscribe = Some("<https://example.org/unsub>".to_string());
        let message = build_message(&sender, &document(), "a@x.org");
        assert_eq!(message.list_unsubscribe, "<https://example.org/unsub>");
    }

    #[test]
    fn empty_recipient_list_opens_and_closes_session() {
        let transport = MockTransport::new();
        let (report, sleeps) = run(&transport, &[]);
        assert_eq!(report.attempted(), 0);
        assert!(sleeps.is_empty());
        assert_eq!(transport.events(), vec![Event::Connect, Event::Close]);
    }

    // =========================================================================
    // Pacing
    // =========================================================================

    #[test]
    fn delay_between_sends_but_not_after_last() {
        let transport = MockTransport::new();
        let (_, sleeps) = run(&transport, &addresses(&["a@x.org", "b@x.org", "c@x.org"]));
        assert_eq!(sleeps, vec![Duration::from_secs(3); 2]);
    }

    #[test]
    fn single_recipient_never_sleeps() {
        let transport = MockTransport::new();
        let (_, sleeps) = run(&transport, &addresses(&["a@x.org"]));
        assert!(sleeps.is_empty());
    }

    #[test]
    fn zero_delay_skips_sleep() {
        let transport = MockTransport::new();
        let mut sleeps = Vec::new();
        let settings = DeliverySettings {
            retry_ceiling: 3,
            send_delay: Duration::ZERO,
        };
        deliver(
            &transport,
            &document(),
            &addresses(&["a@x.org", "b@x.org"]),
            &sender(),
            &settings,
            |d| sleeps.push(d),
        )
        .unwrap();
        assert!(sleeps.is_empty());
    }

    // =========================================================================
    // Retry
    // =========================================================================

    #[test]
    fn always_disconnecting_recipient_fails_after_ceiling() {
        let transport = MockTransport::new();
        transport.always_disconnect("bad@x.org");
        let recipients = addresses(&["a@x.org", "bad@x.org", "c@x.org"]);

        let (report, _) = run(&transport, &recipients);

        assert_eq!(transport.count(&Event::Send("bad@x.org".to_string())), 3);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, "bad@x.org");
        assert!(report.failed()[0].1.contains("connection lost"));
        assert_eq!(report.sent(), vec!["a@x.org", "c@x.org"]);
    }

    #[test]
    fn transient_disconnect_recovers_with_new_session() {
        let transport = MockTransport::new();
        transport.fail_send("a@x.org", TransportError::Disconnected("timeout".to_string()));

        let (report, _) = run(&transport, &addresses(&["a@x.org", "b@x.org"]));

        assert!(report.is_success());
        assert_eq!(
            transport.events(),
            vec![
                Event::Connect,
                Event::Send("a@x.org".to_string()),
                Event::Close,
                Event::Connect,
                Event::Send("a@x.org".to_string()),
                Event::Send("b@x.org".to_string()),
                Event::Close,
            ]
        );
    }

    #[test]
    fn failed_reconnect_consumes_an_attempt() {
        let transport = MockTransport::new();
        let mut guard = SessionGuard::new(transport.connect().unwrap());
        transport.fail_next_connect(TransportError::Connect("refused".to_string()));
        let mut calls = 0;

        let result = with_reconnect(&transport, &mut guard, 3, |_| {
            calls += 1;
            Err::<(), _>(TransportError::Disconnected("gone".to_string()))
        });

        // attempt 1: op, attempt 2: reconnect fails, attempt 3: reconnect + op
        assert_eq!(calls, 2);
        assert_eq!(
            result,
            Err(TransportError::Disconnected("gone".to_string()))
        );
        assert_eq!(transport.count(&Event::Connect), 3);
    }

    #[test]
    fn zero_ceiling_still_tries_once() {
        let transport = MockTransport::new();
        let mut guard = SessionGuard::new(transport.connect().unwrap());
        let mut calls = 0;
        let result = with_reconnect(&transport, &mut guard, 0, |_| {
            calls += 1;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn rejected_recipient_is_not_retried() {
        let transport = MockTransport::new();
        transport.fail_send("bad", TransportError::Rejected("550 invalid mailbox".to_string()));

        let (report, _) = run(&transport, &addresses(&["bad", "b@x.org"]));

        assert_eq!(transport.count(&Event::Send("bad".to_string())), 1);
        assert_eq!(transport.count(&Event::Connect), 1);
        assert_eq!(report.failed(), vec![("bad", "message rejected: 550 invalid mailbox")]);
        assert_eq!(report.sent(), vec!["b@x.org"]);
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    #[test]
    fn auth_failure_is_fatal_before_any_send() {
        let transport = MockTransport::new();
        transport.fail_next_connect(TransportError::Auth("535 bad credentials".to_string()));

        let result = deliver(
            &transport,
            &document(),
            &addresses(&["a@x.org"]),
            &sender(),
            &settings(),
            |_| {},
        );

        assert!(matches!(result, Err(DeliveryError::Auth(_))));
        assert_eq!(transport.events(), vec![Event::Connect]);
    }

    #[test]
    fn connect_failure_is_fatal() {
        let transport = MockTransport::new();
        transport.fail_next_connect(TransportError::Connect("no route".to_string()));
        let result = deliver(&transport, &document(), &[], &sender(), &settings(), |_| {});
        assert!(matches!(result, Err(DeliveryError::Connect(_))));
    }

    #[test]
    fn session_closed_after_failures() {
        let transport = MockTransport::new();
        transport.always_disconnect("a@x.org");
        run(&transport, &addresses(&["a@x.org"]));

        let connects = transport.count(&Event::Connect);
        let closes = transport.count(&Event::Close);
        assert_eq!(connects, 3);
        assert_eq!(closes, 3);
        assert_eq!(transport.events().last(), Some(&Event::Close));
    }

    #[test]
    fn guard_closes_on_drop() {
        let transport = MockTransport::new();
        {
            let _guard = SessionGuard::new(transport.connect().unwrap());
        }
        assert_eq!(transport.events(), vec![Event::Connect, Event::Close]);
    }

    #[test]
    fn guard_closes_once() {
        let transport = MockTransport::new();
        let mut guard = SessionGuard::new(transport.connect().unwrap());
        guard.close();
        drop(guard);
        assert_eq!(transport.count(&Event::Close), 1);
    }
}
