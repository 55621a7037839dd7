//! Streaming accumulation onto the trailing assistant message.
//!
//! Fragments are folded into the conversation in arrival order, one
//! store mutation per fragment. The trailing assistant message is the
//! only message ever replaced mid-flight.

use futures::StreamExt;
use parley_common::Result;

use crate::config::StreamConfig;
use crate::store::ViewStore;
use crate::traits::FragmentStream;
use crate::types::Message;

/// Remove the paired transport wrapper tokens from accumulated content.
///
/// Runs against the whole accumulated text, so a marker split across
/// fragment boundaries is still removed once it completes.
pub(crate) fn strip_wrapper_markers(content: &str, config: &StreamConfig) -> String {
    content
        .replace(&config.start_marker, "")
        .replace(&config.end_marker, "")
}

/// Applies an incoming fragment sequence to the trailing assistant
/// message of one view.
pub(crate) struct StreamAccumulator<'a> {
    store: &'a ViewStore,
    view: &'a str,
    config: &'a StreamConfig,
}

impl<'a> StreamAccumulator<'a> {
    pub(crate) fn new(store: &'a ViewStore, view: &'a str, config: &'a StreamConfig) -> Self {
        Self { store, view, config }
    }

    /// Append the user turn and the empty assistant placeholder.
    pub(crate) fn begin(&self, content: &str, model: &str) {
        self.store.mutate(self.view, |state| {
            state.messages.push(Message::user(content).with_model(model));
            state.messages.push(Message::assistant("").with_model(model));
        });
    }

    /// Fold one fragment into the trailing assistant message.
    pub(crate) fn apply(&self, fragment: &str) {
        self.store.mutate(self.view, |state| {
            if let Some(last) = state.messages.last_mut() {
                let combined = format!("{}{}", last.content, fragment);
                last.content = strip_wrapper_markers(&combined, self.config);
            }
        });
    }

    /// Drain the stream to completion, folding fragments in arrival
    /// order.
    ///
    /// A transport error propagates immediately; whatever content has
    /// accumulated stays in place as final. No rollback.
    pub(crate) async fn drain(&self, mut fragments: FragmentStream) -> Result<()> {
        while let Some(fragment) = fragments.next().await {
            self.apply(&fragment?);
        }
        Ok(())
    }

    /// Apply the output post-processor once to the final assistant
    /// content.
    pub(crate) fn finish(&self, post_process: &(dyn Fn(String) -> String + Send + Sync)) {
        self.store.mutate(self.view, |state| {
            if let Some(last) = state.messages.last_mut() {
                last.content = post_process(std::mem::take(&mut last.content));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use parley_common::Error;
    use crate::types::{ConversationState, Role};

    fn seeded_store() -> ViewStore {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));
        store
    }

    fn trailing_content(store: &ViewStore) -> String {
        store
            .snapshot("/chat")
            .unwrap()
            .messages
            .last()
            .unwrap()
            .content
            .clone()
    }

    #[test]
    fn test_strip_wrapper_markers() {
        let config = StreamConfig::default();
        assert_eq!(strip_wrapper_markers("plain", &config), "plain");
        assert_eq!(
            strip_wrapper_markers("<|im_start|>Hi<|im_end|>", &config),
            "Hi"
        );
        assert_eq!(
            strip_wrapper_markers("a<|im_start|>b<|im_start|>c", &config),
            "abc"
        );
    }

    #[test]
    fn test_begin_appends_user_and_placeholder() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);

        accumulator.begin("Hello", "modelA");

        let snapshot = store.snapshot("/chat").unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[1].role, Role::User);
        assert_eq!(snapshot.messages[1].content, "Hello");
        assert_eq!(snapshot.messages[1].model.as_deref(), Some("modelA"));
        assert_eq!(snapshot.messages[2].role, Role::Assistant);
        assert!(snapshot.messages[2].content.is_empty());
    }

    #[test]
    fn test_apply_accumulates_per_fragment() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);
        accumulator.begin("Hello", "modelA");

        let fragments = ["Hi", " there", "!"];
        let mut expected = String::new();
        for fragment in fragments {
            accumulator.apply(fragment);
            expected.push_str(fragment);
            // One mutation per fragment: the partial is observable after each.
            assert_eq!(trailing_content(&store), expected);
        }
    }

    #[test]
    fn test_apply_strips_marker_split_across_fragments() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);
        accumulator.begin("Hello", "modelA");

        accumulator.apply("<|im_");
        accumulator.apply("start|>Hi<|im_end|>");
        assert_eq!(trailing_content(&store), "Hi");
    }

    #[test]
    fn test_drain_concatenates_in_order() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);
        accumulator.begin("Hello", "modelA");

        let fragments: FragmentStream =
            Box::pin(stream::iter(vec![Ok("Hi".to_string()), Ok(" there".to_string())]));
        tokio_test::block_on(accumulator.drain(fragments)).unwrap();

        assert_eq!(trailing_content(&store), "Hi there");
    }

    #[test]
    fn test_drain_error_retains_partial() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);
        accumulator.begin("Hello", "modelA");

        let fragments: FragmentStream = Box::pin(stream::iter(vec![
            Ok("par".to_string()),
            Err(Error::Stream("connection reset".to_string())),
            Ok("never seen".to_string()),
        ]));
        let result = tokio_test::block_on(accumulator.drain(fragments));

        assert!(matches!(result, Err(Error::Stream(_))));
        assert_eq!(trailing_content(&store), "par");
    }

    #[test]
    fn test_finish_applies_post_processor_once() {
        let store = seeded_store();
        let config = StreamConfig::default();
        let accumulator = StreamAccumulator::new(&store, "/chat", &config);
        accumulator.begin("Hello", "modelA");
        accumulator.apply("  spaced  ");

        accumulator.finish(&|content: String| content.trim().to_string());
        assert_eq!(trailing_content(&store), "spaced");
    }
}
