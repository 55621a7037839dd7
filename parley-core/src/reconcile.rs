//! Message-identity reconciliation.
//!
//! After an exchange completes, every message still lacking an identity
//! gets one, plus a usecase tag derived from the view key. The newly
//! tagged messages are snapshotted and submitted as one batch; the
//! canonical records the server returns are merged back in by identity.

use parley_common::Result;
use uuid::Uuid;

use crate::store::ViewStore;
use crate::traits::Persistence;
use crate::types::Message;

/// Derive the usecase tag from a view key: the first path-like segment,
/// or the whole key when none is found.
pub(crate) fn usecase_tag(view: &str) -> String {
    view.split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(view)
        .to_string()
}

/// Assign identities and usecase tags to every ephemeral message in the
/// view. Returns owned snapshots of the newly tagged messages, so later
/// state mutations cannot alias the submitted batch.
pub(crate) fn tag_ephemeral(store: &ViewStore, view: &str) -> Vec<Message> {
    let tag = usecase_tag(view);
    store
        .mutate(view, |state| {
            let mut tagged = Vec::new();
            for message in state.messages.iter_mut().filter(|m| m.is_ephemeral()) {
                message.id = Some(Uuid::new_v4().to_string());
                message.usecase = Some(tag.clone());
                tagged.push(message.clone());
            }
            tagged
        })
        .unwrap_or_default()
}

/// Overwrite local messages with their canonical records, matched by
/// identity. First match wins, order-independent; unmatched locals are
/// left untouched.
pub(crate) fn merge_canonical(store: &ViewStore, view: &str, recorded: Vec<Message>) {
    store.mutate(view, |state| {
        for canonical in recorded {
            let Some(id) = canonical.id.clone() else {
                continue;
            };
            if let Some(local) = state
                .messages
                .iter_mut()
                .find(|m| m.id.as_deref() == Some(id.as_str()))
            {
                *local = canonical;
            }
        }
    });
}

/// Run the full reconciliation pass for a view against a durable chat.
///
/// Idempotent under replay: matching is by identity, not position, so
/// resubmitting already-identified messages neither duplicates nor
/// reorders anything.
pub(crate) async fn reconcile(
    store: &ViewStore,
    view: &str,
    chat_id: &str,
    persistence: &dyn Persistence,
) -> Result<()> {
    let tagged = tag_ephemeral(store, view);
    if tagged.is_empty() {
        return Ok(());
    }

    tracing::debug!(view, chat_id, count = tagged.len(), "recording exchange");
    let recorded = persistence.create_messages(chat_id, tagged).await?;
    merge_canonical(store, view, recorded);
    Ok(())
}
