//! Long-polling loop: Bot API updates in, rendered replies out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use steadyday_core::messenger::{EditOutcome, Messenger};
use steadyday_core::{Inbound, InboundEvent, Reply, Router};

use super::client::TelegramMessenger;
use super::render;
use super::types::Update;

/// Long-poll timeout passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Where the replies to one update go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: i64,
    /// Message carrying the pressed button; the first screen replaces it.
    pub edit_message_id: Option<i64>,
    pub callback_id: Option<String>,
}

/// Turn an update into a router event and its reply target.
///
/// Updates without a sender, from bots, or outside a private chat are skipped.
pub fn inbound(update: &Update) -> Option<(Inbound, ReplyTarget)> {
    if let Some(query) = &update.callback_query {
        if query.from.is_bot {
            return None;
        }
        let inbound = Inbound {
            user_id: query.from.id,
            username: query.from.username.clone(),
            first_name: query.from.first_name.clone(),
            event: InboundEvent::Callback(query.data.clone().unwrap_or_default()),
        };
        let target = ReplyTarget {
            chat_id: query.from.id,
            edit_message_id: query.message.as_ref().map(|m| m.message_id),
            callback_id: Some(query.id.clone()),
        };
        return Some((inbound, target));
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    if from.is_bot || (!message.chat.kind.is_empty() && message.chat.kind != "private") {
        return None;
    }
    let text = message.text.as_deref()?;
    let inbound = Inbound {
        user_id: from.id,
        username: from.username.clone(),
        first_name: from.first_name.clone(),
        event: InboundEvent::from_message(text),
    };
    let target = ReplyTarget {
        chat_id: message.chat.id,
        edit_message_id: None,
        callback_id: None,
    };
    Some((inbound, target))
}

pub struct Poller {
    client: Arc<TelegramMessenger>,
    router: Arc<Router>,
    offset: i64,
}

impl Poller {
    pub fn new(client: Arc<TelegramMessenger>, router: Arc<Router>) -> Self {
        Self {
            client,
            router,
            offset: 0,
        }
    }

    /// Poll until `shutdown` flips to `true`.
    ///
    /// Updates are handled one at a time, in order.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("polling for updates");
        loop {
            let batch = tokio::select! {
                batch = self.client.get_updates(self.offset, POLL_TIMEOUT_SECS) => batch,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            match batch {
                Ok(updates) => {
                    for update in updates {
                        self.offset = self.offset.max(update.update_id + 1);
                        self.handle(&update).await;
                    }
                }
                Err(e) => {
                    let backoff = e.backoff().max(Duration::from_secs(1));
                    warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "getUpdates failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        info!("polling stopped");
    }

    async fn handle(&self, update: &Update) {
        let Some((inbound, target)) = inbound(update) else {
            debug!(update_id = update.update_id, "update skipped");
            return;
        };
        let replies = self.router.handle(inbound).await;
        deliver_replies(self.client.as_ref(), &target, replies).await;
        if let Some(callback_id) = &target.callback_id {
            if let Err(e) = self.client.answer_callback(callback_id, None).await {
                debug!(error = %e, "answerCallbackQuery failed");
            }
        }
    }
}

/// Send the router's replies to `target`.
///
/// The first screen of a button press edits the message the button was on;
/// when that message is gone a new one is sent instead.
pub async fn deliver_replies(messenger: &dyn Messenger, target: &ReplyTarget, replies: Vec<Reply>) {
    let mut edit = target.edit_message_id;
    for reply in replies {
        let result = match reply {
            Reply::Screen(screen) => {
                let rendered = render::screen(&screen);
                match edit.take() {
                    Some(message_id) => {
                        match messenger
                            .edit_previous_message(
                                target.chat_id,
                                message_id,
                                &rendered.text,
                                rendered.markup(),
                            )
                            .await
                        {
                            Ok(EditOutcome::NotFound) => {
                                messenger
                                    .send(target.chat_id, &rendered.text, rendered.markup())
                                    .await
                            }
                            Ok(EditOutcome::Edited | EditOutcome::Unchanged) => Ok(()),
                            Err(e) => Err(e),
                        }
                    }
                    None => {
                        messenger
                            .send(target.chat_id, &rendered.text, rendered.markup())
                            .await
                    }
                }
            }
            Reply::Notice(notice) => messenger.send(target.chat_id, render::notice(notice), None).await,
            Reply::Document {
                kind,
                filename,
                content,
            } => {
                messenger
                    .send_document(target.chat_id, &filename, content, render::document_caption(kind))
                    .await
            }
        };
        if let Err(e) = result {
            warn!(chat_id = target.chat_id, error = %e, "reply not delivered");
        }
    }
}
