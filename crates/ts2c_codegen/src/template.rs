//! Declarative C templates.
//!
//! Every translated construct is a [`Renderable`]: a template string plus a
//! set of named fields. The template language is small:
//!
//! - `{field}` inserts a field. Nested renderables are rendered first, lists
//!   are rendered item after item. Multi-line values are re-indented to the
//!   leading whitespace of the template line that holds the placeholder.
//! - `{#if field}` ... `{#else}` ... `{/if}` picks a branch on the field's
//!   truthiness; `{#if !field}` negates it.
//! - `{list {sep}=> item}` renders `item` once per list element and joins the
//!   results with `sep`. Inside `item`, `{this}` is the element itself.
//!
//! Layout rules keep templates readable: a directive alone on its line takes
//! the whole line with it, block bodies lose one indentation level, and a
//! placeholder alone on its line that renders to nothing removes the line.

use std::borrow::Cow;

use thiserror::Error;

/// Indentation removed from block bodies per nesting level.
const INDENT: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("`{object}` has no template field `{field}`")]
    UndefinedField { object: &'static str, field: String },

    #[error("field `{field}` of `{object}` is a flag and cannot be inserted as text")]
    FlagAsText { object: &'static str, field: String },

    #[error("malformed template for `{object}`: {detail}")]
    Malformed { object: &'static str, detail: String },
}

/// A field value handed to the renderer.
#[derive(Clone)]
pub enum Value<'a> {
    Text(Cow<'a, str>),
    Flag(bool),
    Node(&'a dyn Renderable),
    List(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn text(text: impl Into<Cow<'a, str>>) -> Self {
        Value::Text(text.into())
    }

    /// A list of boxed renderables, in order.
    pub fn nodes(items: &'a [Box<dyn Renderable>]) -> Self {
        Value::List(items.iter().map(|item| Value::Node(item.as_ref())).collect())
    }

    /// A list of concrete renderables, in order.
    pub fn list<T: Renderable>(items: &'a [T]) -> Self {
        Value::List(items.iter().map(|item| Value::Node(item as &dyn Renderable)).collect())
    }

    /// A list of plain strings, in order.
    pub fn texts(items: &'a [String]) -> Self {
        Value::List(items.iter().map(|item| Value::Text(Cow::Borrowed(item.as_str()))).collect())
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Text(text) => !text.is_empty(),
            Value::Flag(flag) => *flag,
            Value::Node(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }
}

/// Something with a template and the fields that fill it.
pub trait Renderable {
    /// Name used in error messages.
    fn name(&self) -> &'static str;

    fn template(&self) -> &'static str;

    /// Value of a template field, `None` if the object has no such field.
    fn field(&self, name: &str) -> Option<Value<'_>>;
}

/// Render an object through its own template.
pub fn render(object: &dyn Renderable) -> Result<String, TemplateError> {
    let nodes = parse(object.name(), object.template())?;
    let env = Env {
        name: object.name(),
        object: Some(object),
        this: None,
    };
    let mut writer = Writer::default();
    render_nodes(&nodes, &env, &mut writer)?;
    Ok(writer.finish())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    If {
        field: String,
        negated: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    List {
        field: String,
        separator: String,
        item: Vec<Node>,
    },
}

fn parse(object: &'static str, template: &str) -> Result<Vec<Node>, TemplateError> {
    let source = layout(template);
    let mut parser = Parser {
        object,
        src: &source,
        pos: 0,
    };
    let (nodes, end) = parser.parse_nodes(false)?;
    match end {
        End::Eof => Ok(nodes),
        other => Err(parser.malformed(format!("unexpected {other:?}"))),
    }
}

fn is_directive(line: &str) -> bool {
    line == "{#else}"
        || line == "{/if}"
        || (line.starts_with("{#if ") && line.ends_with('}') && line.matches('}').count() == 1)
}

/// Apply the line rules: standalone directives swallow their line and block
/// bodies are dedented by one level per enclosing directive.
fn layout(template: &str) -> String {
    let lines: Vec<&str> = template.split('\n').collect();
    let last = lines.len() - 1;
    let mut out = String::with_capacity(template.len());
    let mut depth = 0usize;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if is_directive(trimmed) {
            if trimmed == "{/if}" {
                depth = depth.saturating_sub(1);
            }
            out.push_str(trimmed);
            if trimmed.starts_with("{#if ") {
                depth += 1;
            }
            continue;
        }
        let leading = line.len() - line.trim_start_matches(' ').len();
        out.push_str(&line[leading.min(depth * INDENT)..]);
        if i != last {
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum End {
    Eof,
    Else,
    EndIf,
    CloseBrace,
}

struct Parser<'s> {
    object: &'static str,
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn malformed(&self, detail: String) -> TemplateError {
        TemplateError::Malformed {
            object: self.object,
            detail: format!("{detail} at byte {}", self.pos),
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    /// Parse until end of input, `{#else}`, `{/if}`, or (inside a list item
    /// template) an unmatched `}`.
    fn parse_nodes(&mut self, in_item: bool) -> Result<(Vec<Node>, End), TemplateError> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        loop {
            let rest = self.rest();
            let next = if in_item {
                rest.find(['{', '}'])
            } else {
                rest.find('{')
            };
            let Some(offset) = next else {
                text.push_str(rest);
                self.pos = self.src.len();
                flush(&mut nodes, &mut text);
                return Ok((nodes, End::Eof));
            };
            text.push_str(&rest[..offset]);
            self.pos += offset;
            let rest = self.rest();

            if rest.starts_with('}') {
                self.pos += 1;
                flush(&mut nodes, &mut text);
                return Ok((nodes, End::CloseBrace));
            }
            if rest.starts_with("{#else}") {
                self.pos += "{#else}".len();
                flush(&mut nodes, &mut text);
                return Ok((nodes, End::Else));
            }
            if rest.starts_with("{/if}") {
                self.pos += "{/if}".len();
                flush(&mut nodes, &mut text);
                return Ok((nodes, End::EndIf));
            }
            if rest.starts_with("{#if ") {
                flush(&mut nodes, &mut text);
                nodes.push(self.parse_if(in_item)?);
                continue;
            }

            let name_len = identifier_len(&rest[1..]);
            if name_len > 0 {
                let name = &rest[1..1 + name_len];
                let after = &rest[1 + name_len..];
                if after.starts_with('}') {
                    flush(&mut nodes, &mut text);
                    nodes.push(Node::Field(name.to_string()));
                    self.pos += name_len + 2;
                    continue;
                }
                if after.starts_with(" {") {
                    flush(&mut nodes, &mut text);
                    self.pos += name_len + 3;
                    nodes.push(self.parse_list(name)?);
                    continue;
                }
            }

            // A literal brace of the emitted C.
            text.push('{');
            self.pos += 1;
        }
    }

    fn parse_if(&mut self, in_item: bool) -> Result<Node, TemplateError> {
        self.pos += "{#if ".len();
        let rest = self.rest();
        let close = rest
            .find('}')
            .ok_or_else(|| self.malformed("unterminated `{#if`".to_string()))?;
        let condition = rest[..close].trim();
        self.pos += close + 1;
        let (negated, field) = match condition.strip_prefix('!') {
            Some(field) => (true, field.trim()),
            None => (false, condition),
        };
        if identifier_len(field) != field.len() || field.is_empty() {
            return Err(self.malformed(format!("bad condition `{condition}`")));
        }

        let (then, end) = self.parse_nodes(in_item)?;
        let otherwise = match end {
            End::EndIf => Vec::new(),
            End::Else => {
                let (otherwise, end) = self.parse_nodes(in_item)?;
                if end != End::EndIf {
                    return Err(self.malformed(format!("`{{#if {condition}}}` not closed")));
                }
                otherwise
            }
            _ => return Err(self.malformed(format!("`{{#if {condition}}}` not closed"))),
        };
        Ok(Node::If {
            field: field.to_string(),
            negated,
            then,
            otherwise,
        })
    }

    fn parse_list(&mut self, field: &str) -> Result<Node, TemplateError> {
        let rest = self.rest();
        let arrow = rest
            .find("}=> ")
            .ok_or_else(|| self.malformed(format!("list `{field}` has no `}}=> `")))?;
        let separator = rest[..arrow].to_string();
        self.pos += arrow + "}=> ".len();
        let (item, end) = self.parse_nodes(true)?;
        if end != End::CloseBrace {
            return Err(self.malformed(format!("list `{field}` not closed")));
        }
        Ok(Node::List {
            field: field.to_string(),
            separator,
            item,
        })
    }
}

fn flush(nodes: &mut Vec<Node>, text: &mut String) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Where field names are looked up.
struct Env<'v> {
    name: &'static str,
    object: Option<&'v dyn Renderable>,
    this: Option<&'v Value<'v>>,
}

impl<'v> Env<'v> {
    fn lookup(&self, field: &str) -> Result<Value<'v>, TemplateError> {
        if field == "this" {
            if let Some(this) = self.this {
                return Ok(this.clone());
            }
        }
        self.object
            .and_then(|object| object.field(field))
            .ok_or_else(|| TemplateError::UndefinedField {
                object: self.name,
                field: field.to_string(),
            })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Pending {
    #[default]
    Nothing,
    /// The last value ended in a newline that was held back.
    Newline,
    /// The current line only holds indentation and an empty value.
    BlankLine { line_start: usize },
}

#[derive(Default)]
struct Writer {
    out: String,
    pending: Pending,
}

impl Writer {
    fn text(&mut self, text: &str) {
        let mut text = text;
        match self.pending {
            Pending::Nothing => {}
            Pending::Newline => {
                if !text.starts_with('\n') {
                    self.out.push('\n');
                }
            }
            Pending::BlankLine { line_start } => {
                if let Some(stripped) = text.strip_prefix('\n') {
                    self.out.truncate(line_start);
                    text = stripped;
                }
            }
        }
        self.pending = Pending::Nothing;
        self.out.push_str(text);
    }

    fn value(&mut self, value: &str) {
        if self.pending == Pending::Newline {
            self.out.push('\n');
        }
        self.pending = Pending::Nothing;

        let line_start = self.out.rfind('\n').map_or(0, |i| i + 1);
        let line = &self.out[line_start..];
        if value.is_empty() {
            if line.trim().is_empty() {
                self.pending = Pending::BlankLine { line_start };
            }
            return;
        }
        let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();

        let (body, trailing_newline) = match value.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (value, false),
        };
        for (i, part) in body.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
                if !part.is_empty() {
                    self.out.push_str(&indent);
                }
            }
            self.out.push_str(part);
        }
        if trailing_newline {
            self.pending = Pending::Newline;
        }
    }

    fn finish(mut self) -> String {
        match self.pending {
            Pending::Nothing => {}
            Pending::Newline => self.out.push('\n'),
            Pending::BlankLine { line_start } => self.out.truncate(line_start),
        }
        self.out
    }
}

fn render_nodes(nodes: &[Node], env: &Env<'_>, writer: &mut Writer) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => writer.text(text),
            Node::Field(field) => {
                let value = env.lookup(field)?;
                let text = value_text(&value, env.name, field)?;
                writer.value(&text);
            }
            Node::If {
                field,
                negated,
                then,
                otherwise,
            } => {
                let truthy = env.lookup(field)?.is_truthy();
                let branch = if truthy != *negated { then } else { otherwise };
                render_nodes(branch, env, writer)?;
            }
            Node::List {
                field,
                separator,
                item,
            } => {
                let value = env.lookup(field)?;
                let items = match &value {
                    Value::List(items) => items.as_slice(),
                    other => std::slice::from_ref(other),
                };
                let mut rendered = Vec::with_capacity(items.len());
                for element in items {
                    let item_env = Env {
                        name: env.name,
                        object: match element {
                            Value::Node(node) => Some(*node),
                            _ => None,
                        },
                        this: Some(element),
                    };
                    let mut item_writer = Writer::default();
                    render_nodes(item, &item_env, &mut item_writer)?;
                    rendered.push(item_writer.finish());
                }
                writer.value(&rendered.join(separator));
            }
        }
    }
    Ok(())
}

fn value_text(value: &Value<'_>, object: &'static str, field: &str) -> Result<String, TemplateError> {
    match value {
        Value::Text(text) => Ok(text.to_string()),
        Value::Flag(_) => Err(TemplateError::FlagAsText {
            object,
            field: field.to_string(),
        }),
        Value::Node(node) => render(*node),
        Value::List(items) => {
            let mut out = String::new();
            for item in items {
                out.push_str(&value_text(item, object, field)?);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line(&'static str);

    impl Renderable for Line {
        fn name(&self) -> &'static str {
            "Line"
        }
        fn template(&self) -> &'static str {
            "{text}\n"
        }
        fn field(&self, name: &str) -> Option<Value<'_>> {
            match name {
                "text" => Some(Value::text(self.0)),
                _ => None,
            }
        }
    }

    struct Wrapper {
        template: &'static str,
        flag: bool,
        lines: Vec<Line>,
        words: Vec<String>,
    }

    impl Renderable for Wrapper {
        fn name(&self) -> &'static str {
            "Wrapper"
        }
        fn template(&self) -> &'static str {
            self.template
        }
        fn field(&self, name: &str) -> Option<Value<'_>> {
            match name {
                "flag" => Some(Value::Flag(self.flag)),
                "lines" => Some(Value::list(&self.lines)),
                "words" => Some(Value::texts(&self.words)),
                "head" => Some(Value::text("head")),
                "empty" => Some(Value::text("")),
                _ => None,
            }
        }
    }

    fn wrapper(template: &'static str) -> Wrapper {
        Wrapper {
            template,
            flag: true,
            lines: vec![Line("a;"), Line("b;")],
            words: vec!["x".to_string(), "y".to_string(), "z".to_string()],
        }
    }

    #[test]
    fn test_literal_text_is_verbatim() {
        let w = wrapper("int main(void)\n{\n    return 0;\n}\n");
        assert_eq!(render(&w).unwrap(), "int main(void)\n{\n    return 0;\n}\n");
    }

    #[test]
    fn test_nested_values_take_line_indentation() {
        let w = wrapper("{\n    {lines {}=> {this}}\n}\n");
        assert_eq!(render(&w).unwrap(), "{\n    a;\n    b;\n}\n");
    }

    #[test]
    fn test_list_separator_and_item_template() {
        let w = wrapper("f({words {, }=> \"{this}\"});\n");
        assert_eq!(render(&w).unwrap(), "f(\"x\", \"y\", \"z\");\n");
    }

    #[test]
    fn test_if_else_branches_and_dedent() {
        let mut w = wrapper("{#if flag}\n    yes\n{#else}\n    no\n{/if}\nend\n");
        assert_eq!(render(&w).unwrap(), "yes\nend\n");
        w.flag = false;
        assert_eq!(render(&w).unwrap(), "no\nend\n");
    }

    #[test]
    fn test_negated_condition_without_else() {
        let mut w = wrapper("{#if !flag}\n    shown\n{/if}\nafter\n");
        assert_eq!(render(&w).unwrap(), "after\n");
        w.flag = false;
        assert_eq!(render(&w).unwrap(), "shown\nafter\n");
    }

    #[test]
    fn test_empty_placeholder_line_is_removed() {
        let w = wrapper("{\n    {empty}\n    {head}\n}\n");
        assert_eq!(render(&w).unwrap(), "{\n    head\n}\n");
    }

    #[test]
    fn test_undefined_field_fails_loudly() {
        let w = wrapper("{missing}\n");
        let err = render(&w).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UndefinedField {
                object: "Wrapper",
                field: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_unclosed_if_is_malformed() {
        let w = wrapper("{#if flag}\nyes\n");
        assert!(matches!(render(&w), Err(TemplateError::Malformed { .. })));
    }

    #[test]
    fn test_flag_cannot_be_inserted_as_text() {
        let w = wrapper("{flag}\n");
        assert!(matches!(render(&w), Err(TemplateError::FlagAsText { .. })));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let w = wrapper("{#if flag}\n    {lines {}=> {this}}\n{/if}\n");
        assert_eq!(render(&w).unwrap(), render(&w).unwrap());
    }
}
