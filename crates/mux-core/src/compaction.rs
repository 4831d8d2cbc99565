//! Compaction Controller: summarization rides on a normal stream (a user
//! message whose `muxMetadata` is `CompactionRequest`), and on that stream's
//! terminal event the controller atomically replaces the whole history with
//! a single synthesized summary message. Only the summary-and-recent-messages
//! strategy ships here, not a file-recovery variant.

use mux_ipc::WorkspaceBus;
use mux_protocol::IpcEvent;
use mux_protocol::Message;
use mux_protocol::MessageId;
use mux_protocol::MuxMetadata;
use mux_protocol::Part;
use mux_protocol::Role;
use mux_protocol::TokenUsage;
use mux_store::HistoryStore;
use std::sync::Arc;

/// A fixed point in target word count a summarization prompt aims for absent
/// an explicit `target_words` override: roughly one word per 1.3 output tokens.
const DEFAULT_WORD_TARGET_DIVISOR: f64 = 1.3;

/// Per-request bookkeeping carried alongside a `StartStreamRequest` when the
/// triggering user message asked for compaction.
#[derive(Clone)]
pub struct CompactionRequestContext {
    pub request_id: MessageId,
    /// The full history at the moment compaction was requested, including the
    /// triggering user message. All of it is discarded by `replaceAll`; its
    /// summed usage becomes the summary's `historicalUsage`.
    pub prior_messages: Vec<Message>,
    pub continue_message: Option<String>,
    pub resume_model: Option<String>,
}

/// Appends the summarization prompt to `transcript` and returns it alongside
/// the capped `max_output_tokens` a compaction stream should run with:
/// `target_words` forces `mode = compact` and caps the output budget. Called
/// by the Stream Manager while building the `StartStreamRequest` for a
/// compaction-triggered stream.
pub fn build_summarization_transcript(
    ctx: &CompactionRequestContext,
    target_words: Option<u32>,
    mut transcript: Vec<(Role, String)>,
) -> (Vec<(Role, String)>, u32) {
    let words = target_words.unwrap_or(800);
    let capped_tokens = ((words as f64) * DEFAULT_WORD_TARGET_DIVISOR).ceil() as u32;

    let mut prompt = format!(
        "Summarize the conversation so far in about {words} words, preserving any decisions, \
         open questions, and file paths mentioned."
    );
    if let Some(continue_message) = &ctx.continue_message {
        prompt.push_str("\n\nAfter the summary, address this follow-up: ");
        prompt.push_str(continue_message);
    }

    transcript.push((Role::User, prompt));
    (transcript, capped_tokens)
}

/// Natural completion: synthesize the summary message and atomically replace
/// the history with it.
pub async fn apply_compaction_result(
    ctx: CompactionRequestContext,
    mut summary: Message,
    history: &Arc<dyn HistoryStore>,
    bus: &Arc<WorkspaceBus>,
) {
    finish_summary(&ctx, &mut summary);
    if history.replace_all(vec![summary.clone()]).await.is_ok() {
        bus.publish(IpcEvent::Whole {
            message: Box::new(summary),
        })
        .await;
    }
}

/// Abort mid-summarization: the accept-early-on-abort rule appends a
/// truncation sentinel to whatever text had streamed so far and proceeds with
/// the replace, rather than discarding the (possibly large) partial summary.
pub async fn apply_compaction_abort(
    ctx: CompactionRequestContext,
    mut summary: Message,
    history: &Arc<dyn HistoryStore>,
    bus: &Arc<WorkspaceBus>,
) {
    append_truncated_sentinel(&mut summary);
    finish_summary(&ctx, &mut summary);
    if history.replace_all(vec![summary.clone()]).await.is_ok() {
        bus.publish(IpcEvent::Whole {
            message: Box::new(summary),
        })
        .await;
    }
}

fn finish_summary(ctx: &CompactionRequestContext, summary: &mut Message) {
    summary.partial = false;
    summary.compacted = true;
    summary.historical_usage = Some(TokenUsage::sum(
        ctx.prior_messages.iter().filter_map(|m| m.usage.as_ref()),
    ));
    summary.mux_metadata = None;
}

fn append_truncated_sentinel(summary: &mut Message) {
    match summary.parts.last_mut() {
        Some(Part::Text { text }) => text.push_str("\n\n[truncated]"),
        _ => summary.parts.push(Part::Text {
            text: "[truncated]".to_string(),
        }),
    }
}

/// True if a user message's options are asking for compaction.
pub fn is_compaction_request(mux_metadata: &Option<MuxMetadata>) -> bool {
    matches!(mux_metadata, Some(MuxMetadata::CompactionRequest { .. }))
}

/// Extracts `target_words` from a `CompactionRequest`, if present.
pub fn target_words(mux_metadata: &Option<MuxMetadata>) -> Option<u32> {
    match mux_metadata {
        Some(MuxMetadata::CompactionRequest { target_words, .. }) => *target_words,
        None => None,
    }
}
