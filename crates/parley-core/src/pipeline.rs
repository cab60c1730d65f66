//! Message pipeline: one send, end to end

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::image::PendingImage;
use crate::message::ChatMessage;
use crate::model::ChatModel;
use crate::session::SharedSession;

/// Assistant text appended when the model call fails
pub const ERROR_NOTICE: &str = "Sorry, there was an error processing your message.";

/// Why a send was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Blank text and no image
    Empty,
    /// Another send is still in flight
    Busy,
}

/// What happened to a `send_message` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The model answered and the reply was appended
    Replied,
    /// The model call failed and the apology was appended
    Failed,
    /// Nothing happened
    Rejected(Rejection),
}

/// Coordinates a session with the model it talks to.
///
/// Cloning is cheap; clones share the same session and model.
#[derive(Clone)]
pub struct MessagePipeline {
    session: SharedSession,
    model: Arc<dyn ChatModel>,
}

impl MessagePipeline {
    pub fn new(session: SharedSession, model: Arc<dyn ChatModel>) -> Self {
        Self { session, model }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Send user input to the model and record both sides in the transcript.
    ///
    /// Image sends go through the stateless single-shot path; text-only sends
    /// continue the model's chat history.
    pub async fn send_message(&self, text: &str, image: Option<PendingImage>) -> SendOutcome {
        let has_text = !text.trim().is_empty();
        if !has_text && image.is_none() {
            debug!("ignoring empty send");
            return SendOutcome::Rejected(Rejection::Empty);
        }

        let user_id = {
            let mut session = self.session.lock();
            if session.is_busy() {
                debug!("ignoring send while another is in flight");
                return SendOutcome::Rejected(Rejection::Busy);
            }
            session.set_busy(true);

            let id = session.reserve_turn();
            let text = has_text.then(|| text.to_string());
            let preview = image.as_ref().map(|img| img.preview().clone());
            session.append(ChatMessage::user(id, text, preview));
            id
        };
        let gate = BusyGate::new(&self.session);

        let result = match &image {
            Some(image) => {
                info!(id = %user_id, media_type = image.media_type(), bytes = image.bytes().len(), "sending image prompt");
                self.model.generate_content(text, &image.to_inline()).await
            }
            None => {
                info!(id = %user_id, "sending chat message");
                self.model.continue_chat(text).await
            }
        };
        drop(image);

        let mut session = self.session.lock();
        let outcome = match result {
            Ok(reply) => {
                session.append(ChatMessage::assistant(user_id.next(), reply));
                SendOutcome::Replied
            }
            Err(err) => {
                let cause = format!("{err:#}");
                error!(id = %user_id, error = %cause, "error sending message");
                session.append(ChatMessage::assistant(user_id.next(), ERROR_NOTICE));
                SendOutcome::Failed
            }
        };
        session.set_busy(false);
        gate.disarm();
        outcome
    }
}

/// Clears the busy flag if a send is dropped or panics before it finishes.
struct BusyGate<'a> {
    session: Option<&'a SharedSession>,
}

impl<'a> BusyGate<'a> {
    fn new(session: &'a SharedSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// The send finished normally and already released the gate itself
    fn disarm(mut self) {
        self.session = None;
    }
}

impl Drop for BusyGate<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("send abandoned, releasing busy flag");
            session.lock().set_busy(false);
        }
    }
}
