//! Expression translation.
//!
//! The statement translators only depend on the [`ExprTranslator`] trait;
//! [`CExprTranslator`] is the implementation used by the driver.

use crate::error::CodegenError;
use crate::scope::ScopeId;
use crate::types::CType;
use crate::{AssignOp, BinaryOp, Expr, ExprKind, LogicalOp, Translator, UnaryOp, UpdateOp};

/// Output of assignment lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredAssignment {
    pub text: String,
    /// The text already ends in `;` (possibly spanning several statements)
    /// and must not get another terminator.
    pub complete_statement: bool,
}

impl LoweredAssignment {
    fn expression(text: String) -> Self {
        Self {
            text,
            complete_statement: false,
        }
    }

    fn statements(lines: Vec<String>) -> Self {
        Self {
            text: lines.join("\n"),
            complete_statement: true,
        }
    }
}

pub trait ExprTranslator {
    fn translate(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError>;

    /// Translate `expr` for use as a C condition.
    fn coerce_to_boolean(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError>;

    /// Lower `target = value`, where `target` is already translated.
    fn lower_assignment(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        target: &str,
        target_type: Option<&CType>,
        value: &Expr,
    ) -> Result<LoweredAssignment, CodegenError>;

    /// Translate an lvalue.
    fn lower_access(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError>;
}

/// Expression translation targeting the ARRAY/DICT runtime of
/// [`program`](crate::program).
#[derive(Debug, Default, Clone, Copy)]
pub struct CExprTranslator;

impl CExprTranslator {
    /// Type from the oracle, falling back to what the expression's shape says.
    fn type_of(&self, tr: &Translator<'_>, expr: &Expr) -> CType {
        match tr.oracle().type_of(expr.id) {
            Some(CType::Unknown) | None => {}
            Some(ty) => return ty,
        }
        match &expr.kind {
            ExprKind::Number(_) | ExprKind::Update { .. } => CType::Number,
            ExprKind::Str(_) => CType::String,
            ExprKind::Bool(_) | ExprKind::Logical { .. } => CType::Boolean,
            ExprKind::Paren(inner) => self.type_of(tr, inner),
            ExprKind::Unary { op: UnaryOp::Not, .. } => CType::Boolean,
            ExprKind::Unary { .. } => CType::Number,
            ExprKind::Binary { op, .. } if is_comparison(*op) => CType::Boolean,
            ExprKind::Binary { .. } => CType::Number,
            ExprKind::Conditional { consequent, .. } => self.type_of(tr, consequent),
            ExprKind::Assign { value, .. } => self.type_of(tr, value),
            ExprKind::Member { object, property } => {
                let object_type = self.type_of(tr, object);
                match object_type {
                    CType::Array(_) | CType::String if property == "length" => CType::Number,
                    CType::Dict(dict) => dict.element_type,
                    _ => CType::Unknown,
                }
            }
            ExprKind::Index { object, .. } => match self.type_of(tr, object) {
                CType::Array(array) => array.element_type,
                CType::Dict(dict) => dict.element_type,
                _ => CType::Unknown,
            },
            _ => CType::Unknown,
        }
    }

    fn translate_member(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
        object: &Expr,
        property: &str,
    ) -> Result<String, CodegenError> {
        let object_type = self.type_of(tr, object);
        let target = self.translate(tr, scope, object)?;
        match object_type {
            CType::Array(array) if property == "length" => Ok(if array.is_dynamic {
                format!("{target}->size")
            } else {
                array.capacity.to_string()
            }),
            CType::String if property == "length" => {
                tr.includes.register("string");
                Ok(format!("strlen({target})"))
            }
            CType::Struct { .. } => Ok(format!("{target}->{property}")),
            CType::Dict(_) => Ok(format!("DICT_GET({target}, {})", c_string(property))),
            other => Err(CodegenError::unsupported(
                expr.span,
                "member access",
                format!("`.{property}` on a value of type {other}"),
            )),
        }
    }

    fn translate_index(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
        object: &Expr,
        index: &Expr,
    ) -> Result<String, CodegenError> {
        let object_type = self.type_of(tr, object);
        let target = self.translate(tr, scope, object)?;
        let key = self.translate(tr, scope, index)?;
        match object_type {
            CType::Array(array) if array.is_dynamic => Ok(format!("{target}->data[{key}]")),
            CType::Array(_) => Ok(format!("{target}[{key}]")),
            CType::Dict(_) => Ok(format!("DICT_GET({target}, {key})")),
            CType::Struct { .. } => match &index.kind {
                ExprKind::Str(field) => Ok(format!("{target}->{field}")),
                _ => Err(CodegenError::unsupported(
                    expr.span,
                    "element access",
                    "struct fields must be indexed by a string literal",
                )),
            },
            other => Err(CodegenError::unsupported(
                expr.span,
                "element access",
                format!("indexing a value of type {other}"),
            )),
        }
    }

    fn translate_call(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
    ) -> Result<String, CodegenError> {
        if let ExprKind::Member { object, property } = &callee.kind {
            if object.as_ident() == Some("console") && property == "log" {
                return self.translate_console_log(tr, scope, args);
            }
            let object_type = self.type_of(tr, object);
            if object_type.is_dynamic_array() {
                let target = self.translate(tr, scope, object)?;
                match (property.as_str(), args) {
                    ("push", [value]) => {
                        let value = self.translate(tr, scope, value)?;
                        return Ok(format!("ARRAY_PUSH({target}, {value})"));
                    }
                    ("pop", []) => return Ok(format!("ARRAY_POP({target})")),
                    _ => {}
                }
            }
            return Err(CodegenError::unsupported(
                expr.span,
                "call",
                format!("method `{property}` on a value of type {object_type}"),
            ));
        }

        let Some(name) = callee.as_ident() else {
            return Err(CodegenError::unsupported(
                callee.span,
                "call",
                "only named functions can be called",
            ));
        };
        let mut translated = Vec::with_capacity(args.len());
        for arg in args {
            translated.push(self.translate(tr, scope, arg)?);
        }
        Ok(format!("{name}({})", translated.join(", ")))
    }

    fn translate_console_log(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        args: &[Expr],
    ) -> Result<String, CodegenError> {
        tr.includes.register("stdio");
        let mut formats = Vec::with_capacity(args.len());
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let text = self.translate(tr, scope, arg)?;
            match self.type_of(tr, arg) {
                CType::Number => {
                    formats.push("%d");
                    values.push(text);
                }
                CType::String => {
                    formats.push("%s");
                    values.push(text);
                }
                CType::Boolean => {
                    formats.push("%s");
                    values.push(format!("{text} ? \"true\" : \"false\""));
                }
                other => {
                    return Err(CodegenError::unsupported(
                        arg.span,
                        "console.log argument",
                        format!("cannot print a value of type {other}"),
                    ));
                }
            }
        }
        let format = format!("\"{}\\n\"", formats.join(" "));
        if values.is_empty() {
            Ok(format!("printf({format})"))
        } else {
            Ok(format!("printf({format}, {})", values.join(", ")))
        }
    }

    fn translate_binary(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<String, CodegenError> {
        let lhs_is_string = self.type_of(tr, lhs).is_string();
        let rhs_is_string = self.type_of(tr, rhs).is_string();
        let left = self.translate(tr, scope, lhs)?;
        let right = self.translate(tr, scope, rhs)?;
        if lhs_is_string || rhs_is_string {
            return match op {
                BinaryOp::Eq | BinaryOp::Ne => {
                    tr.includes.register("string");
                    Ok(format!("strcmp({left}, {right}) {} 0", op.as_c()))
                }
                _ => Err(CodegenError::unsupported(
                    expr.span,
                    "string operator",
                    format!("`{}` on strings", op.as_c()),
                )),
            };
        }
        Ok(format!("{left} {} {right}", op.as_c()))
    }
}

impl ExprTranslator for CExprTranslator {
    fn translate(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError> {
        match &expr.kind {
            ExprKind::Number(text) => Ok(text.clone()),
            ExprKind::Str(text) => Ok(c_string(text)),
            ExprKind::Bool(value) => Ok(if *value { "1" } else { "0" }.to_string()),
            ExprKind::Null => {
                tr.includes.register("stdlib");
                Ok("NULL".to_string())
            }
            ExprKind::Ident(name) => Ok(name.clone()),
            ExprKind::Paren(inner) => Ok(format!("({})", self.translate(tr, scope, inner)?)),
            ExprKind::Array(_) => Err(CodegenError::unsupported(
                expr.span,
                "array literal",
                "array literals are only supported as initializers",
            )),
            ExprKind::Object(_) => Err(CodegenError::unsupported(
                expr.span,
                "object literal",
                "object literals are only supported as initializers",
            )),
            ExprKind::Member { object, property } => {
                self.translate_member(tr, scope, expr, object, property)
            }
            ExprKind::Index { object, index } => {
                self.translate_index(tr, scope, expr, object, index)
            }
            ExprKind::Call { callee, args } => self.translate_call(tr, scope, expr, callee, args),
            ExprKind::Unary { op, arg } => Ok(match op {
                UnaryOp::Neg => format!("-{}", self.translate(tr, scope, arg)?),
                UnaryOp::Plus => format!("+{}", self.translate(tr, scope, arg)?),
                UnaryOp::BitNot => format!("~{}", self.translate(tr, scope, arg)?),
                UnaryOp::Not => format!("!{}", self.coerce_to_boolean(tr, scope, arg)?),
            }),
            ExprKind::Update { op, prefix, arg } => {
                let target = self.lower_access(tr, scope, arg)?;
                let op = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                Ok(if *prefix {
                    format!("{op}{target}")
                } else {
                    format!("{target}{op}")
                })
            }
            ExprKind::Binary { op, lhs, rhs } => self.translate_binary(tr, scope, expr, *op, lhs, rhs),
            ExprKind::Logical { op, lhs, rhs } => {
                let left = self.coerce_to_boolean(tr, scope, lhs)?;
                let right = self.coerce_to_boolean(tr, scope, rhs)?;
                let op = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                Ok(format!("{left} {op} {right}"))
            }
            ExprKind::Assign { op, target, value } => {
                let target = self.lower_access(tr, scope, target)?;
                let value = self.translate(tr, scope, value)?;
                Ok(match op {
                    AssignOp::Assign => format!("{target} = {value}"),
                    AssignOp::Compound(op) => format!("{target} {}= {value}", op.as_c()),
                })
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.coerce_to_boolean(tr, scope, test)?;
                let consequent = self.translate(tr, scope, consequent)?;
                let alternate = self.translate(tr, scope, alternate)?;
                Ok(format!("{test} ? {consequent} : {alternate}"))
            }
        }
    }

    fn coerce_to_boolean(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError> {
        let text = self.translate(tr, scope, expr)?;
        if self.type_of(tr, expr).is_string() {
            // An empty string is falsy: test its first character.
            return Ok(match expr.as_ident() {
                Some(_) => format!("*{text}"),
                None => format!("*({text})"),
            });
        }
        Ok(text)
    }

    fn lower_assignment(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        target: &str,
        target_type: Option<&CType>,
        value: &Expr,
    ) -> Result<LoweredAssignment, CodegenError> {
        match (&value.kind, target_type) {
            (ExprKind::Array(elements), Some(CType::Array(array))) => {
                if !array.is_dynamic && elements.len() > array.capacity {
                    return Err(CodegenError::unsupported(
                        value.span,
                        "initializer",
                        format!(
                            "{} elements do not fit a fixed array of {}",
                            elements.len(),
                            array.capacity
                        ),
                    ));
                }
                let mut lines = Vec::with_capacity(elements.len() + 1);
                if array.is_dynamic {
                    let capacity = elements.len().max(2);
                    lines.push(format!(
                        "ARRAY_CREATE({target}, {capacity}, {});",
                        elements.len()
                    ));
                }
                let cast = if array.element_type.as_array().is_some() {
                    "(void *)"
                } else {
                    ""
                };
                for (i, element) in elements.iter().enumerate() {
                    let element = self.translate(tr, scope, element)?;
                    if array.is_dynamic {
                        lines.push(format!("{target}->data[{i}] = {cast}{element};"));
                    } else {
                        lines.push(format!("{target}[{i}] = {cast}{element};"));
                    }
                }
                Ok(LoweredAssignment::statements(lines))
            }
            (ExprKind::Object(properties), Some(CType::Dict(_))) => {
                let capacity = properties.len().max(4);
                let mut lines = vec![format!("DICT_CREATE({target}, {capacity});")];
                for (key, element) in properties {
                    let element = self.translate(tr, scope, element)?;
                    lines.push(format!("DICT_SET({target}, {}, {element});", c_string(key)));
                }
                Ok(LoweredAssignment::statements(lines))
            }
            (ExprKind::Array(_), other) | (ExprKind::Object(_), other) => {
                Err(CodegenError::unsupported(
                    value.span,
                    "initializer",
                    match other {
                        Some(ty) => format!("literal cannot initialize a value of type {ty}"),
                        None => "literal assigned to a target of unknown type".to_string(),
                    },
                ))
            }
            _ => {
                let value = self.translate(tr, scope, value)?;
                Ok(LoweredAssignment::expression(format!("{target} = {value}")))
            }
        }
    }

    fn lower_access(
        &self,
        tr: &mut Translator<'_>,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError> {
        match &expr.kind {
            ExprKind::Ident(name) => Ok(name.clone()),
            ExprKind::Paren(inner) => self.lower_access(tr, scope, inner),
            ExprKind::Member { .. } | ExprKind::Index { .. } => self.translate(tr, scope, expr),
            _ => Err(CodegenError::unsupported(
                expr.span,
                "assignment target",
                "expected a variable, field or element",
            )),
        }
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
    )
}

/// Quote `text` as a C string literal.
pub fn c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Builder;
    use crate::types::TypeTable;

    #[test]
    fn test_console_log_formats_by_type() {
        let b = Builder::new();
        let n = b.ident("n");
        let call = b.call(b.member(b.ident("console"), "log"), vec![b.string("n ="), n.clone()]);
        let mut table = TypeTable::new();
        table.insert(n.id, CType::Number);

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();
        assert_eq!(
            tr.translate_expr(scope, &call).unwrap(),
            "printf(\"%s %d\\n\", \"n =\", n)"
        );
        assert!(tr.includes.contains("stdio"));
    }

    #[test]
    fn test_string_equality_uses_strcmp() {
        let b = Builder::new();
        let s = b.ident("s");
        let eq = b.binary(BinaryOp::Eq, s.clone(), b.string("on"));
        let mut table = TypeTable::new();
        table.insert(s.id, CType::String);

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();
        assert_eq!(tr.translate_expr(scope, &eq).unwrap(), "strcmp(s, \"on\") == 0");
        assert!(tr.includes.contains("string"));
    }

    #[test]
    fn test_string_condition_tests_first_character() {
        let b = Builder::new();
        let s = b.ident("s");
        let mut table = TypeTable::new();
        table.insert(s.id, CType::String);

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();
        assert_eq!(tr.translate_condition(scope, &s).unwrap(), "*s");
    }

    #[test]
    fn test_array_access_and_push() {
        let b = Builder::new();
        let dynamic = b.ident("xs");
        let fixed = b.ident("ys");
        let index = b.index(dynamic.clone(), b.number("0"));
        let length = b.member(fixed.clone(), "length");
        let push = b.call(b.member(dynamic.clone(), "push"), vec![b.number("4")]);
        let mut table = TypeTable::new();
        table.insert(dynamic.id, CType::dynamic_array(CType::Number));
        table.insert(fixed.id, CType::fixed_array(CType::Number, 3));

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();
        assert_eq!(tr.translate_expr(scope, &index).unwrap(), "xs->data[0]");
        assert_eq!(tr.translate_expr(scope, &length).unwrap(), "3");
        assert_eq!(tr.translate_expr(scope, &push).unwrap(), "ARRAY_PUSH(xs, 4)");
    }

    #[test]
    fn test_array_literal_fills_dynamic_array() {
        let b = Builder::new();
        let literal = b.array(vec![b.number("1"), b.number("2"), b.number("3")]);
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();

        let ty = CType::dynamic_array(CType::Number);
        let lowered = tr.lower_assignment(scope, "xs", Some(&ty), &literal).unwrap();
        assert!(lowered.complete_statement);
        assert_eq!(
            lowered.text,
            "ARRAY_CREATE(xs, 3, 3);\nxs->data[0] = 1;\nxs->data[1] = 2;\nxs->data[2] = 3;"
        );
    }

    #[test]
    fn test_array_literal_overflowing_fixed_array_is_rejected() {
        let b = Builder::new();
        let literal = b.array(vec![b.number("1"), b.number("2"), b.number("3")]);
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();

        let ty = CType::fixed_array(CType::Number, 2);
        let err = tr.lower_assignment(scope, "xs", Some(&ty), &literal).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Unsupported { construct: "initializer", .. }
        ));

        let fits = CType::fixed_array(CType::Number, 3);
        let lowered = tr.lower_assignment(scope, "xs", Some(&fits), &literal).unwrap();
        assert_eq!(lowered.text, "xs[0] = 1;\nxs[1] = 2;\nxs[2] = 3;");
    }

    #[test]
    fn test_object_literal_fills_dict() {
        let b = Builder::new();
        let literal = b.object(vec![("a", b.number("1")), ("b", b.number("2"))]);
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();

        let ty = CType::dict(CType::Number);
        let lowered = tr.lower_assignment(scope, "d", Some(&ty), &literal).unwrap();
        assert_eq!(
            lowered.text,
            "DICT_CREATE(d, 4);\nDICT_SET(d, \"a\", 1);\nDICT_SET(d, \"b\", 2);"
        );
    }

    #[test]
    fn test_plain_assignment_needs_terminator() {
        let b = Builder::new();
        let value = b.binary(BinaryOp::Add, b.ident("a"), b.number("1"));
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();

        let lowered = tr.lower_assignment(scope, "x", Some(&CType::Number), &value).unwrap();
        assert_eq!(lowered.text, "x = a + 1");
        assert!(!lowered.complete_statement);
    }

    #[test]
    fn test_literal_outside_initializer_is_unsupported() {
        let b = Builder::new();
        let literal = b.array(vec![]);
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let scope = tr.scopes.new_function_scope();
        let err = tr.translate_expr(scope, &literal).unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { construct: "array literal", .. }));
    }

    #[test]
    fn test_c_string_escapes() {
        assert_eq!(c_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }
}
