//! Anthropic Messages 请求转换为 OpenAI Chat Completions 请求
//!
//! - 模型选择：不在白名单内的模型替换为默认模型
//! - system 提示：每个 system 块独立成一条 system 消息，末尾追加固定的操作指令
//! - 内容块扁平化为文本块
//! - 按模型家族协商 `temperature` 与 token 上限

use serde_json::{json, Map, Value};

use crate::capability::CapabilityProfile;
use crate::models::anthropic::{
    AnthropicMessage, AnthropicMessagesRequest, ContentPart, KnownContentPart,
    MessageContent as AnthropicContent, ToolDefinition,
};
use crate::models::openai::{
    ChatCompletionRequest, ChatMessage, FunctionDefinition, MessageContent, TextPart, Tool,
};
use crate::translator::traits::{RequestTranslator, TranslateError};

/// 工具描述的最大字符数
pub const MAX_TOOL_DESCRIPTION_CHARS: usize = 1024;

/// 固定 temperature 的模型家族前缀（推理模型）
pub const FIXED_TEMPERATURE_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

/// 追加在调用方 system 提示之后的固定指令，每条独立成一条 system 消息
pub const OPERATIONAL_INSTRUCTIONS: [&str; 2] = [
    "You are running inside an agentic command-line coding assistant. \
     The user works in a terminal and expects you to act on their local project.",
    "When a task requires reading or writing files or running commands, perform it by \
     calling the available tools instead of describing the steps or printing the commands.",
];

/// 模型白名单策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPolicy {
    pub allowed_models: Vec<String>,
    pub default_model: String,
}

/// 模型选择结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    /// 是否替换成了默认模型
    pub substituted: bool,
}

impl ModelPolicy {
    pub fn new(allowed_models: Vec<String>, default_model: impl Into<String>) -> Self {
        Self {
            allowed_models,
            default_model: default_model.into(),
        }
    }

    /// 白名单为空时只允许默认模型
    pub fn is_allowed(&self, model: &str) -> bool {
        if self.allowed_models.is_empty() {
            return model == self.default_model;
        }
        self.allowed_models.iter().any(|m| m == model)
    }

    /// 选择实际使用的模型（不记录日志）
    pub fn select(&self, requested: Option<&str>) -> ModelSelection {
        match requested {
            Some(model) if self.is_allowed(model) => ModelSelection {
                model: model.to_string(),
                substituted: false,
            },
            _ => ModelSelection {
                model: self.default_model.clone(),
                substituted: true,
            },
        }
    }
}

/// 转换结果
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub request: ChatCompletionRequest,
    /// 转换过程中产生的告警（模型替换、token 截断）
    pub warnings: Vec<String>,
}

/// 是否属于固定 temperature 的模型家族
pub fn is_fixed_temperature_model(model: &str) -> bool {
    FIXED_TEMPERATURE_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

/// Anthropic → OpenAI 请求转换器
///
/// 每个请求构造一次，持有该请求的模型能力。
#[derive(Debug, Clone)]
pub struct MessagesTranslator<'a> {
    policy: &'a ModelPolicy,
    profile: CapabilityProfile,
}

impl<'a> MessagesTranslator<'a> {
    pub fn new(policy: &'a ModelPolicy, profile: CapabilityProfile) -> Self {
        Self { policy, profile }
    }
}

impl RequestTranslator for MessagesTranslator<'_> {
    type Input = AnthropicMessagesRequest;
    type Output = Translation;
    type Error = TranslateError;

    fn translate_request(&self, request: Self::Input) -> Result<Self::Output, Self::Error> {
        translate_request(&request, self.profile, self.policy)
    }
}

/// 校验请求，不依赖模型能力，可以在查询上游之前调用
pub fn validate_request(request: &AnthropicMessagesRequest) -> Result<(), TranslateError> {
    if request.messages.is_empty() {
        return Err(TranslateError::EmptyMessages);
    }
    Ok(())
}

/// 转换请求
pub fn translate_request(
    request: &AnthropicMessagesRequest,
    profile: CapabilityProfile,
    policy: &ModelPolicy,
) -> Result<Translation, TranslateError> {
    validate_request(request)?;

    let mut warnings = Vec::new();

    let selection = policy.select(request.model.as_deref());
    if selection.substituted {
        let warning = format!(
            "模型 {} 不在允许列表中，已替换为 {}",
            request.model.as_deref().unwrap_or("<none>"),
            selection.model
        );
        tracing::warn!("[TRANSLATE] {}", warning);
        warnings.push(warning);
    }
    let model = selection.model;

    let mut messages = Vec::with_capacity(request.messages.len() + 4);
    if let Some(system) = &request.system {
        messages.extend(system.blocks().into_iter().map(ChatMessage::system));
    }
    messages.extend(OPERATIONAL_INSTRUCTIONS.iter().map(|text| ChatMessage::system(text)));
    messages.extend(request.messages.iter().map(flatten_message));

    let (temperature, max_tokens, max_completion_tokens) = if is_fixed_temperature_model(&model)
    {
        let requested = request.max_completion_tokens.or(request.max_tokens);
        let limit = profile.max_completion_tokens;
        let negotiated = requested.map(|tokens| {
            if tokens > limit {
                let warning = format!(
                    "请求的 token 数 {} 超过模型 {} 的上限 {}，已截断",
                    tokens, model, limit
                );
                tracing::warn!("[TRANSLATE] {}", warning);
                warnings.push(warning);
                limit
            } else {
                tokens
            }
        });
        (Some(1.0), None, negotiated)
    } else {
        (request.temperature, request.max_tokens, None)
    };

    let tools = request
        .tools
        .as_ref()
        .map(|tools| tools.iter().map(convert_tool).collect());

    Ok(Translation {
        request: ChatCompletionRequest {
            model,
            messages,
            tools,
            temperature,
            max_tokens,
            max_completion_tokens,
            stream: true,
        },
        warnings,
    })
}

/// 扁平化单条消息；纯文本内容原样保留
pub fn flatten_message(message: &AnthropicMessage) -> ChatMessage {
    let content = match &message.content {
        AnthropicContent::Text(text) => MessageContent::Text(text.clone()),
        AnthropicContent::Parts(parts) => {
            MessageContent::Parts(parts.iter().map(flatten_part).collect())
        }
    };
    ChatMessage {
        role: message.role.clone(),
        content,
    }
}

fn flatten_part(part: &ContentPart) -> TextPart {
    match part {
        ContentPart::Known(KnownContentPart::Text { text }) => TextPart::new(text.clone()),
        ContentPart::Known(KnownContentPart::ToolUse { id, name, input }) => {
            TextPart::new(json!({ "id": id, "name": name, "input": input }).to_string())
        }
        ContentPart::Known(KnownContentPart::ToolResult { content, .. }) => match content {
            Value::String(text) => TextPart::new(text.clone()),
            other => TextPart::new(other.to_string()),
        },
        ContentPart::Other(fields) => flatten_unknown(fields),
    }
}

/// 未知类型：保留所有字段，类型改为 text；没有文本时用原始 JSON 作为文本
fn flatten_unknown(fields: &Map<String, Value>) -> TextPart {
    let text = match fields.get("text") {
        Some(Value::String(text)) => text.clone(),
        _ => Value::Object(fields.clone()).to_string(),
    };

    let mut extra = fields.clone();
    extra.remove("type");
    extra.remove("text");

    TextPart {
        part_type: "text".to_string(),
        text,
        extra,
    }
}

/// 工具定义转换为 function 工具，描述按字符截断
pub fn convert_tool(tool: &ToolDefinition) -> Tool {
    let description = tool.description.as_ref().map(|d| {
        if d.chars().count() > MAX_TOOL_DESCRIPTION_CHARS {
            d.chars().take(MAX_TOOL_DESCRIPTION_CHARS).collect()
        } else {
            d.clone()
        }
    });

    Tool {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description,
            parameters: tool.input_schema.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::anthropic::{SystemBlock, SystemPrompt};

    fn policy() -> ModelPolicy {
        ModelPolicy::new(
            vec!["gpt-4o".to_string(), "o3-mini".to_string(), "gpt-4".to_string()],
            "gpt-4o",
        )
    }

    fn profile(limit: u32) -> CapabilityProfile {
        CapabilityProfile {
            max_completion_tokens: limit,
        }
    }

    fn request(model: &str, text: &str) -> AnthropicMessagesRequest {
        AnthropicMessagesRequest {
            model: Some(model.to_string()),
            messages: vec![AnthropicMessage::text("user", text)],
            ..Default::default()
        }
    }

    #[test]
    fn test_reasoning_model_scenario() {
        let translation =
            translate_request(&request("o3-mini", "list files"), profile(100_000), &policy())
                .unwrap();
        let upstream = translation.request;

        assert_eq!(upstream.model, "o3-mini");
        assert_eq!(upstream.messages.len(), 3);
        assert_eq!(upstream.messages[0].role, "system");
        assert_eq!(upstream.messages[1].role, "system");
        assert_eq!(upstream.messages[2].role, "user");
        assert_eq!(
            upstream.messages[2].content,
            MessageContent::Text("list files".to_string())
        );
        assert_eq!(upstream.temperature, Some(1.0));
        assert_eq!(upstream.max_completion_tokens, None);
        assert_eq!(upstream.max_tokens, None);
        assert!(upstream.stream);
        assert!(translation.warnings.is_empty());
    }

    #[test]
    fn test_system_blocks_come_before_instructions() {
        let mut req = request("gpt-4o", "hi");
        req.system = Some(SystemPrompt::Blocks(vec![
            SystemBlock {
                block_type: "text".to_string(),
                text: "one".to_string(),
            },
            SystemBlock {
                block_type: "text".to_string(),
                text: "two".to_string(),
            },
        ]));

        let upstream = translate_request(&req, profile(16_384), &policy())
            .unwrap()
            .request;
        let texts: Vec<&MessageContent> = upstream.messages.iter().map(|m| &m.content).collect();
        assert_eq!(texts[0], &MessageContent::Text("one".to_string()));
        assert_eq!(texts[1], &MessageContent::Text("two".to_string()));
        assert_eq!(
            texts[2],
            &MessageContent::Text(OPERATIONAL_INSTRUCTIONS[0].to_string())
        );
        assert_eq!(
            texts[3],
            &MessageContent::Text(OPERATIONAL_INSTRUCTIONS[1].to_string())
        );
        assert_eq!(upstream.messages[4].role, "user");
    }

    #[test]
    fn test_unknown_model_substituted_once() {
        let translation =
            translate_request(&request("claude-3-opus", "hi"), profile(16_384), &policy())
                .unwrap();
        assert_eq!(translation.request.model, "gpt-4o");
        assert_eq!(translation.warnings.len(), 1);
        assert!(translation.warnings[0].contains("claude-3-opus"));
    }

    #[test]
    fn test_missing_model_uses_default() {
        let mut req = request("gpt-4o", "hi");
        req.model = None;
        let translation = translate_request(&req, profile(16_384), &policy()).unwrap();
        assert_eq!(translation.request.model, "gpt-4o");
        assert_eq!(translation.warnings.len(), 1);
    }

    #[test]
    fn test_empty_allow_list_only_allows_default() {
        let policy = ModelPolicy::new(Vec::new(), "gpt-4o-mini");
        assert!(policy.is_allowed("gpt-4o-mini"));
        assert!(!policy.is_allowed("gpt-4o"));
        assert_eq!(policy.select(Some("gpt-4o")).model, "gpt-4o-mini");
        assert!(!policy.select(Some("gpt-4o-mini")).substituted);
    }

    #[test]
    fn test_reasoning_tokens_clamped() {
        let mut req = request("o3-mini", "hi");
        req.max_tokens = Some(500);
        req.max_completion_tokens = Some(200_000);
        req.temperature = Some(0.2);

        let translation = translate_request(&req, profile(100_000), &policy()).unwrap();
        assert_eq!(translation.request.max_completion_tokens, Some(100_000));
        assert_eq!(translation.request.max_tokens, None);
        assert_eq!(translation.request.temperature, Some(1.0));
        assert_eq!(translation.warnings.len(), 1);
    }

    #[test]
    fn test_reasoning_falls_back_to_max_tokens() {
        let mut req = request("o3-mini", "hi");
        req.max_tokens = Some(2048);
        let upstream = translate_request(&req, profile(100_000), &policy())
            .unwrap()
            .request;
        assert_eq!(upstream.max_completion_tokens, Some(2048));
    }

    #[test]
    fn test_legacy_passes_parameters_through() {
        let mut req = request("gpt-4", "hi");
        req.temperature = Some(0.3);
        req.max_tokens = Some(10_000);

        let translation = translate_request(&req, profile(4_096), &policy()).unwrap();
        assert_eq!(translation.request.temperature, Some(0.3));
        assert_eq!(translation.request.max_tokens, Some(10_000));
        assert_eq!(translation.request.max_completion_tokens, None);
        assert!(translation.warnings.is_empty());
    }

    #[test]
    fn test_empty_messages_rejected() {
        let req = AnthropicMessagesRequest {
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        assert_eq!(
            translate_request(&req, profile(16_384), &policy()),
            Err(TranslateError::EmptyMessages)
        );
    }

    #[test]
    fn test_flatten_parts() {
        let message: AnthropicMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "tool_use", "id": "toolu_1", "name": "bash", "input": {"cmd": "ls"}},
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"},
                {"type": "tool_result", "tool_use_id": "toolu_2", "content": [{"type": "text", "text": "b"}]},
                {"type": "image", "source": {"type": "base64", "data": "xx"}},
                {"type": "document", "text": "doc body", "title": "notes"}
            ]
        }))
        .unwrap();

        let MessageContent::Parts(parts) = flatten_message(&message).content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 6);
        assert!(parts.iter().all(|p| p.part_type == "text"));
        assert_eq!(parts[0].text, "hello");

        let tool_use: Value = serde_json::from_str(&parts[1].text).unwrap();
        assert_eq!(tool_use, json!({"id": "toolu_1", "name": "bash", "input": {"cmd": "ls"}}));

        assert_eq!(parts[2].text, "a.txt");
        assert_eq!(parts[3].text, r#"[{"text":"b","type":"text"}]"#);

        let image: Value = serde_json::from_str(&parts[4].text).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(parts[4].extra["source"]["data"], "xx");

        assert_eq!(parts[5].text, "doc body");
        assert_eq!(parts[5].extra["title"], "notes");

        let wire = serde_json::to_value(&parts[4]).unwrap();
        assert_eq!(wire["type"], "text");
        assert!(wire.get("source").is_some());
    }

    #[test]
    fn test_tool_conversion() {
        let tool = ToolDefinition {
            name: "bash".to_string(),
            description: Some("é".repeat(2000)),
            input_schema: json!({"type": "object"}),
        };
        let converted = convert_tool(&tool);
        assert_eq!(converted.tool_type, "function");
        assert_eq!(converted.function.name, "bash");
        assert_eq!(
            converted.function.description.unwrap().chars().count(),
            MAX_TOOL_DESCRIPTION_CHARS
        );
        assert_eq!(converted.function.parameters, json!({"type": "object"}));
    }

    #[test]
    fn test_trait_translator() {
        let policy = policy();
        let translator = MessagesTranslator::new(&policy, profile(16_384));
        let translation = translator
            .translate_request(request("gpt-4o", "hi"))
            .unwrap();
        assert_eq!(translation.request.model, "gpt-4o");
    }
}
