//! Outbound messaging.
//!
//! The relay only needs four calls from a chat platform: send text, send a
//! photo, send a media group, and edit a previously sent text. Every send
//! returns a [`MessageHandle`] that is stored so later status changes can edit
//! the same message.

pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MessageHandle;
use crate::utils::text::truncate_with_ellipsis;

pub use telegram::TelegramMessenger;

/// Bot API limit for message text.
pub const MAX_TEXT_CHARS: usize = 4096;
/// Bot API limit for media captions.
pub const MAX_CAPTION_CHARS: usize = 1024;
/// Bot API limit for items in one media group.
pub const MAX_GROUP_ITEMS: usize = 10;

/// Messaging collaborator.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, text: &str, thread_id: Option<i64>) -> Result<MessageHandle>;

    async fn send_photo(
        &self,
        url: &str,
        caption: &str,
        thread_id: Option<i64>,
    ) -> Result<MessageHandle>;

    /// Send an album; the handle refers to its first message.
    async fn send_media_group(
        &self,
        urls: &[String],
        caption: &str,
        thread_id: Option<i64>,
    ) -> Result<MessageHandle>;

    async fn edit_text(&self, handle: MessageHandle, text: &str) -> Result<()>;
}

/// A rendered message ready for dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub media: Vec<String>,
    pub thread_id: Option<i64>,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>, thread_id: Option<i64>) -> Self {
        Self {
            text: text.into(),
            media: Vec::new(),
            thread_id,
        }
    }

    pub fn with_media(mut self, media: Vec<String>) -> Self {
        self.media = media;
        self
    }
}

/// Send a new message, picking text, photo, or album by media count.
pub async fn deliver(messenger: &dyn Messenger, message: &OutboundMessage) -> Result<MessageHandle> {
    match message.media.as_slice() {
        [] => {
            let text = truncate_with_ellipsis(&message.text, MAX_TEXT_CHARS);
            messenger.send_text(&text, message.thread_id).await
        }
        [single] => {
            let caption = truncate_with_ellipsis(&message.text, MAX_CAPTION_CHARS);
            messenger
                .send_photo(single, &caption, message.thread_id)
                .await
        }
        many => {
            let caption = truncate_with_ellipsis(&message.text, MAX_CAPTION_CHARS);
            let urls: Vec<String> = many.iter().take(MAX_GROUP_ITEMS).cloned().collect();
            messenger
                .send_media_group(&urls, &caption, message.thread_id)
                .await
        }
    }
}

/// Replace the text of a delivered message.
pub async fn redeliver(
    messenger: &dyn Messenger,
    handle: MessageHandle,
    message: &OutboundMessage,
) -> Result<()> {
    let text = truncate_with_ellipsis(&message.text, MAX_TEXT_CHARS);
    messenger.edit_text(handle, &text).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Probe {
        calls: Mutex<Vec<(String, usize, usize)>>,
    }

    impl Probe {
        fn log(&self, method: &str, items: usize, text: &str) -> Result<MessageHandle> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((method.to_string(), items, text.chars().count()));
            Ok(MessageHandle(calls.len() as i64))
        }
    }

    #[async_trait]
    impl Messenger for Probe {
        async fn send_text(&self, text: &str, _: Option<i64>) -> Result<MessageHandle> {
            self.log("text", 0, text)
        }

        async fn send_photo(&self, _: &str, caption: &str, _: Option<i64>) -> Result<MessageHandle> {
            self.log("photo", 1, caption)
        }

        async fn send_media_group(
            &self,
            urls: &[String],
            caption: &str,
            _: Option<i64>,
        ) -> Result<MessageHandle> {
            self.log("group", urls.len(), caption)
        }

        async fn edit_text(&self, _: MessageHandle, text: &str) -> Result<()> {
            self.log("edit", 0, text).map(|_| ())
        }
    }

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img/{i}.jpg")).collect()
    }

    #[tokio::test]
    async fn test_deliver_picks_call_by_media_count() {
        let probe = Probe::default();
        deliver(&probe, &OutboundMessage::new("a", None)).await.unwrap();
        deliver(&probe, &OutboundMessage::new("b", None).with_media(images(1)))
            .await
            .unwrap();
        deliver(&probe, &OutboundMessage::new("c", None).with_media(images(14)))
            .await
            .unwrap();

        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls[0].0, "text");
        assert_eq!(calls[1].0, "photo");
        assert_eq!((calls[2].0.as_str(), calls[2].1), ("group", MAX_GROUP_ITEMS));
    }

    #[tokio::test]
    async fn test_captions_and_edits_are_truncated() {
        let probe = Probe::default();
        let long = "公".repeat(5000);
        deliver(&probe, &OutboundMessage::new(long.clone(), None).with_media(images(1)))
            .await
            .unwrap();
        redeliver(&probe, MessageHandle(1), &OutboundMessage::new(long, None))
            .await
            .unwrap();

        let calls = probe.calls.lock().unwrap();
        assert!(calls[0].2 <= MAX_CAPTION_CHARS);
        assert!(calls[1].2 <= MAX_TEXT_CHARS);
        assert_eq!(calls[1].0, "edit");
    }
}
