
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::indexer::FileIndexer;
use crate::llm::{AssistantReply, ChatMessage, LanguageModel, ToolCallRequest, ToolSpec};
use crate::tools::{
    DOCUMENT_SEARCH_TOOL_NAME, DocumentSearchTool, FILE_READER_TOOL_NAME, FileReaderTool, Tool,
};
use crate::{AgentError, Result};

/// System instructions enforcing the retrieval-grounded answer policy.
/// This is a prompting contract only; nothing in the loop structurally
/// prevents the model from answering directly.
const SYSTEM_PROMPT: &str = "\
You are an AI assistant that answers questions ONLY by using the provided tools.
You have access to these tools:
1. `document_search`: finds relevant document chunks for a search query.
2. `file_reader`: reads the full content of an indexed file by filename.

Follow this process for every question:
1. Use the `document_search` tool with the user's question as the query.
2. Review the results from the search tool.
3. Formulate your answer based ONLY on the information provided by the tools.
4. If the search results are empty, state that you could not find any information in the files.

Do not answer from your general knowledge. Your entire response must be based on the output of the tools.";

/// The tools the model may invoke. Dispatch is an exhaustive match over
/// this enum rather than an open-ended name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    DocumentSearch,
    FileReader,
}

impl ToolName {
    fn argument_key(self) -> &'static str {
        match self {
            Self::DocumentSearch => "query",
            Self::FileReader => "filename",
        }
    }
}

impl FromStr for ToolName {
    type Err = String;

    #[inline]
    fn from_str(name: &str) -> std::result::Result<Self, String> {
        match name {
            DOCUMENT_SEARCH_TOOL_NAME => Ok(Self::DocumentSearch),
            FILE_READER_TOOL_NAME => Ok(Self::FileReader),
            other => Err(format!(
                "Unknown tool '{}'. Available tools: {}, {}.",
                other, DOCUMENT_SEARCH_TOOL_NAME, FILE_READER_TOOL_NAME
            )),
        }
    }
}

/// The model's decision for one turn.
#[derive(Debug, Clone, PartialEq)]
enum AgentAction {
    FinalAnswer(String),
    ToolCall {
        name: ToolName,
        argument: String,
        call: ToolCallRequest,
    },
}

/// Mediates one query between the language model and the two tools.
///
/// Each query runs its own loop over a fresh transcript; model and tool
/// calls execute strictly sequentially.
pub struct Agent {
    model: Box<dyn LanguageModel>,
    search_tool: DocumentSearchTool,
    file_reader: FileReaderTool,
    max_turns: usize,
}

impl Agent {
    #[inline]
    pub fn new(
        model: Box<dyn LanguageModel>,
        indexer: Arc<RwLock<FileIndexer>>,
        max_turns: usize,
    ) -> Self {
        Self {
            model,
            search_tool: DocumentSearchTool::new(Arc::clone(&indexer)),
            file_reader: FileReaderTool::new(indexer),
            max_turns,
        }
    }

    /// Answer one question, letting the model call tools until it produces
    /// a final answer or the turn budget runs out.
    #[inline]
    pub async fn query(&self, question: &str) -> Result<String> {
        let tool_specs: Vec<ToolSpec> = vec![self.search_tool.spec(), self.file_reader.spec()];

        let mut transcript = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(question),
        ];

        for turn in 0..self.max_turns {
            let reply = self.model.complete(&transcript, &tool_specs)?;

            match parse_reply(&reply) {
                Ok(AgentAction::FinalAnswer(answer)) => {
                    debug!("Model produced a final answer on turn {}", turn + 1);
                    return Ok(answer);
                }
                Ok(AgentAction::ToolCall {
                    name,
                    argument,
                    call,
                }) => {
                    debug!("Turn {}: invoking {:?} with '{}'", turn + 1, name, argument);

                    let output = match name {
                        ToolName::DocumentSearch => self.search_tool.run(&argument).await,
                        ToolName::FileReader => self.file_reader.run(&argument).await,
                    };

                    let call_id = call.id.clone();
                    transcript.push(ChatMessage::assistant_tool_calls(vec![call]));
                    transcript.push(ChatMessage::tool_result(call_id, output));
                }
                Err(corrective) => {
                    warn!("Malformed model output on turn {}: {}", turn + 1, corrective);
                    push_corrective(&mut transcript, &reply, &corrective);
                }
            }
        }

        Err(AgentError::TurnBudgetExhausted(self.max_turns))
    }
}

/// Interpret one model reply as an action. The error side carries a
/// corrective message to feed back so the model can retry.
fn parse_reply(reply: &AssistantReply) -> std::result::Result<AgentAction, String> {
    if let Some(call) = reply.tool_calls.first() {
        if reply.tool_calls.len() > 1 {
            warn!(
                "Model requested {} tool calls, running only the first",
                reply.tool_calls.len()
            );
        }

        let name = ToolName::from_str(&call.function.name)?;
        let argument = parse_argument(name, &call.function.arguments)?;

        return Ok(AgentAction::ToolCall {
            name,
            argument,
            call: call.clone(),
        });
    }

    match reply.content.as_deref() {
        Some(content) if !content.trim().is_empty() => {
            Ok(AgentAction::FinalAnswer(content.to_string()))
        }
        _ => Err("Your last reply contained neither an answer nor a tool call. \
                  Respond with a final answer or a single tool call."
            .to_string()),
    }
}

/// Extract the tool's single string argument from the model-produced JSON.
/// A bare JSON string is accepted as the argument itself.
fn parse_argument(name: ToolName, arguments: &str) -> std::result::Result<String, String> {
    let key = name.argument_key();

    let value: Value = serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Could not parse the arguments for the tool call ({}). \
             Retry with a JSON object containing a '{}' string.",
            e, key
        )
    })?;

    match &value {
        Value::String(argument) => Ok(argument.clone()),
        Value::Object(fields) => fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                format!(
                    "The tool call is missing the required '{}' string argument. Retry.",
                    key
                )
            }),
        _ => Err(format!(
            "The tool call arguments must be a JSON object containing a '{}' string. Retry.",
            key
        )),
    }
}

/// Append a corrective entry for a malformed reply. When the model issued
/// tool calls they are echoed and each answered with the corrective text,
/// keeping the transcript consistent for the next completion.
fn push_corrective(transcript: &mut Vec<ChatMessage>, reply: &AssistantReply, corrective: &str) {
    if reply.tool_calls.is_empty() {
        transcript.push(ChatMessage::user(corrective));
        return;
    }

    transcript.push(ChatMessage::assistant_tool_calls(reply.tool_calls.clone()));
    for call in &reply.tool_calls {
        transcript.push(ChatMessage::tool_result(call.id.clone(), corrective));
    }
}
