//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Tool call arguments arrive as partial JSON fragments spread over several
//! chunks, keyed by the tool call index. [`PendingToolCalls`] accumulates
//! them and releases complete [`StreamEvent::ToolUseComplete`] events once a
//! finish reason arrives (or the stream ends without one).

use std::collections::BTreeMap;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};

use speedcal_types::llm::{LlmError, StopReason, StreamEvent, Usage};

#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    json_buffer: String,
}

/// Tool call fragments received so far, ordered by call index.
#[derive(Debug, Default)]
pub(crate) struct PendingToolCalls {
    calls: BTreeMap<u32, ToolCallAccumulator>,
}

impl PendingToolCalls {
    /// Merge one delta. The first delta of a call carries its id and name;
    /// later ones only carry argument text.
    pub(crate) fn push(&mut self, index: u32, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) {
        let acc = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            acc.id = id.to_string();
        }
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            acc.name = name.to_string();
        }
        if let Some(arguments) = arguments {
            acc.json_buffer.push_str(arguments);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Parse every accumulated call, in index order, and reset.
    pub(crate) fn drain(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        let calls = std::mem::take(&mut self.calls);
        calls
            .into_values()
            .map(|acc| {
                let input = parse_arguments(&acc.name, &acc.json_buffer)?;
                Ok(StreamEvent::ToolUseComplete {
                    id: acc.id,
                    name: acc.name,
                    input,
                })
            })
            .collect()
    }
}

/// Parse a tool call's argument string. Empty arguments mean `{}`.
pub(crate) fn parse_arguments(name: &str, raw: &str) -> Result<serde_json::Value, LlmError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| LlmError::Deserialization(format!("tool call JSON for '{name}': {e}")))
}

pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ToolCalls => StopReason::ToolUse,
        FinishReason::ContentFilter => StopReason::EndTurn,
        FinishReason::FunctionCall => StopReason::ToolUse,
    }
}

/// Map an async-openai [`ChatCompletionResponseStream`] to [`StreamEvent`]s.
///
/// Order: `Connected`, then `TextDelta`s, `ToolUseComplete`s and a
/// `MessageDelta` when the finish reason arrives, `Usage` whenever the server
/// reports it, and finally `Done`.
pub fn map_openai_stream(
    stream: ChatCompletionResponseStream,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut pending = PendingToolCalls::default();
        let mut stream = stream;

        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;

            // The final chunk carries usage with an empty choices array.
            if let Some(usage) = chunk.usage.as_ref() {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta {
                        index: choice.index,
                        text: text.clone(),
                    };
                }

                for tc in choice.delta.tool_calls.iter().flatten() {
                    let function = tc.function.as_ref();
                    pending.push(
                        tc.index,
                        tc.id.as_deref(),
                        function.and_then(|f| f.name.as_deref()),
                        function.and_then(|f| f.arguments.as_deref()),
                    );
                }

                if let Some(finish_reason) = choice.finish_reason.as_ref() {
                    // Some compatible servers finish tool rounds with "stop".
                    let mut stop_reason = map_finish_reason(finish_reason);
                    if !pending.is_empty() {
                        for event in pending.drain()? {
                            yield event;
                        }
                        stop_reason = StopReason::ToolUse;
                    }
                    yield StreamEvent::MessageDelta { stop_reason };
                }
            }
        }

        if !pending.is_empty() {
            tracing::debug!("stream ended without finish reason; flushing tool calls");
            for event in pending.drain()? {
                yield event;
            }
            yield StreamEvent::MessageDelta { stop_reason: StopReason::ToolUse };
        }

        yield StreamEvent::Done;
    })
}
