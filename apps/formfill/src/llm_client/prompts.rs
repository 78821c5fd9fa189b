// Shared prompt fragments.
// Each feature that calls the LLM keeps its own prompts.rs alongside it;
// this file holds the cross-cutting pieces.

/// Appended to every prompt that may produce field values.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
严格依据【个人信息】中明确出现的内容作答，不得编造、推测或补全。\
无法确定的内容一律返回空字符串 \"\"，不要输出“未知”“未提供”之类的说明文字。";

/// Appended to every prompt whose answer is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "\
只返回 JSON 本身，不要使用 Markdown 代码块，不要附加任何解释。";

/// Label used for a placeholder without a header.
pub const NO_HEADER: &str = "无";
