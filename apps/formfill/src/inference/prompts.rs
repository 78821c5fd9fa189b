// LLM prompt templates for the inference stages.
// Reuses cross-cutting fragments from llm_client::prompts.
// Tokens in braces are replaced before sending; placeholder tags such as
// {1} are literal text the model is expected to echo back.

/// Fill prompt. Replace `{no_fabrication}`, `{json_only}`, `{placeholders}`,
/// `{markdown}` and `{profile}`.
pub const FILL_PROMPT_TEMPLATE: &str = r#"你是一个专业的表单填写助手。下面的 Markdown 表格来自一份待填写的模板，空白单元格已被替换为占位符（如 {1}、{2}）。请根据个人信息，给出每个占位符应填写的内容。

要求：
1. {no_fabrication}
2. 结合占位符所在的行、列以及表头判断其含义。
3. 标注为“照片区域”的占位符不需要文字内容，返回空字符串。
4. 值必须是简洁的字段值，不要包含解释、原因或多余的前后缀。
5. 以单个 JSON 对象作答，键为占位符，值为字符串，例如：{"{1}": "张三", "{2}": ""}。{json_only}

占位符清单：
{placeholders}

Markdown 表格：
{markdown}

个人信息：
{profile}
"#;

/// Missing-field scan prompt. Replace `{json_only}`, `{placeholders}` and
/// `{profile}`.
pub const MISSING_FIELDS_PROMPT_TEMPLATE: &str = r#"你是一个表单字段分析助手。请逐个检查模板中的空白字段，判断个人信息里是否明确给出了对应的值。

规则：
- 只有个人信息中明确写出的内容才算已提供；需要推理或猜测才能得到的字段一律视为缺失。
- 照片、签名等无法用文字提供的字段同样视为缺失。
- 用字段名称表示缺失项；没有表头的字段请根据位置给出合适的名称。

模板空白字段：
{placeholders}

个人信息：
{profile}

以 JSON 字符串数组作答，只列出缺失字段的名称，例如：["近期免冠照片", "家庭成员联系电话"]。{json_only}
"#;

/// Audit prompt. Replace `{json_only}`, `{placeholders}`, `{markdown}` and
/// `{profile}`.
pub const AUDIT_PROMPT_TEMPLATE: &str = r#"你是一个表单匹配审核助手。请检查模板中每个占位符能否在个人信息中找到对应的值。

步骤：
1. 根据表头和位置确定每个占位符的含义，作为 label。
2. 在个人信息中查找对应的值；找到则 isMatched 为 true，value 为该值。
3. 找不到则 isMatched 为 false，value 为空字符串。不得编造。

占位符信息：
{placeholders}

Markdown 表格：
{markdown}

个人信息：
{profile}

以 JSON 对象作答，格式如下：
{"items": [{"key": "{1}", "label": "姓名", "value": "张三", "isMatched": true}, {"key": "{2}", "label": "期望薪资", "value": "", "isMatched": false}]}
{json_only}
"#;

/// Field naming prompt for placeholders without a header. Replace
/// `{json_only}`, `{positions}`, `{markdown}` and `{profile}`.
pub const FIELD_NAMES_PROMPT_TEMPLATE: &str = r#"你是一个表单字段分析助手。表格中有一些空白单元格没有表头，请根据表格结构和上下文推断每个单元格应填写的字段名称（如“身高”“毕业院校”）。

Markdown 表格：
{markdown}

需要命名的占位符（按顺序）：
{positions}

个人信息：
{profile}

以 JSON 字符串数组作答，数量和顺序与上面的占位符一致，例如：["身高(cm)", "体重(kg)"]。实在无法判断时使用“信息”等通用名称。{json_only}
"#;
