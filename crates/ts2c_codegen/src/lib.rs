pub mod error;
pub mod expr;
pub mod memory;
pub mod program;
pub mod scope;
pub mod stmt;
pub mod symbols;
pub mod template;
pub mod types;

#[cfg(test)]
mod testing;

use std::fmt;

use log::trace;

use crate::expr::ExprTranslator;
use crate::scope::{ScopeId, ScopeTree};
use crate::symbols::{IncludeRegistry, SymbolTable};
use crate::template::Renderable;
use crate::types::{CType, TypeOracle};

pub use crate::error::CodegenError;

/// Identity of an IR node, unique across one program.
///
/// The type oracle and the symbol allocator are keyed by it, which is what
/// makes repeated queries for the same node return the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Byte range of a node in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Statement IR: the closed set of statement shapes the translator accepts.
///
/// The driver lowers the oxc AST into these nodes; every node carries an id
/// and a span so errors can point back at the source.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `;`
    Empty,
    /// `return expr;` or `return;`
    Return(Option<Expr>),
    /// `if (test) consequent else alternate`
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    /// `switch (discriminant) { case ...: ... default: ... }`
    Switch {
        discriminant: Expr,
        clauses: Vec<SwitchClause>,
    },
    /// `while (test) body`
    While { test: Expr, body: Box<Stmt> },
    /// `do body while (test);`
    DoWhile { body: Box<Stmt>, test: Expr },
    /// `for (init; test; update) body`
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `for (left of right) body`
    ForOf {
        left: ForBinding,
        right: Expr,
        body: Box<Stmt>,
    },
    /// `for (left in right) body`
    ForIn {
        left: ForBinding,
        right: Expr,
        body: Box<Stmt>,
    },
    /// Expression evaluated for its side effects.
    Expr(Expr),
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `import ... from "source";`
    Import { source: String },
    /// `let a = 1, b;`
    VarDecl(Vec<VarDeclarator>),
}

impl StmtKind {
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Empty => "empty statement",
            StmtKind::Return(_) => "return",
            StmtKind::If { .. } => "if",
            StmtKind::Switch { .. } => "switch",
            StmtKind::While { .. } => "while",
            StmtKind::DoWhile { .. } => "do-while",
            StmtKind::For { .. } => "for",
            StmtKind::ForOf { .. } => "for-of",
            StmtKind::ForIn { .. } => "for-in",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::Block(_) => "block",
            StmtKind::Import { .. } => "import",
            StmtKind::VarDecl(_) => "variable declaration",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchClause {
    pub span: Span,
    /// `None` for the `default:` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

impl SwitchClause {
    pub fn is_default(&self) -> bool {
        self.test.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum ForInit {
    VarDecl(Vec<VarDeclarator>),
    Expr(Expr),
}

/// Left-hand side of `for..of` / `for..in`.
#[derive(Debug, Clone)]
pub enum ForBinding {
    /// `for (const x of ...)` introduces a new local.
    Decl(VarDeclarator),
    /// `for (x of ...)` assigns to an existing lvalue.
    Target(Expr),
}

#[derive(Debug, Clone)]
pub struct VarDeclarator {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub init: Option<Expr>,
}

/// Expression IR. Expression translation lives behind [`ExprTranslator`];
/// the statement translator only needs ids, spans and a few shapes.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Numeric literal, kept as the text to emit.
    Number(String),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Paren(Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// `object.property`
    Member { object: Box<Expr>, property: String },
    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Update { op: UpdateOp, prefix: bool, arg: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Logical { op: LogicalOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
}

impl Expr {
    /// The identifier name when this is a bare (possibly parenthesized) identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Paren(inner) => inner.as_ident(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn as_c(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// `=` or a compound assignment; compound forms carry their binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

/// A function in the IR: signature plus body statements.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub params: Vec<Param>,
    pub ret_type: CType,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub name: String,
    pub ty: CType,
}

/// One translation unit: the declared functions plus the top-level
/// statements that end up in `main`.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub top_level: Vec<Stmt>,
}

/// Codegen settings the driver forwards from the command line.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Import specifiers starting with this prefix become `#include`s.
    pub include_marker: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            include_marker: "ts2c-target".to_string(),
        }
    }
}

/// The statement translator and the program-wide state it mutates.
///
/// Owns the scope arena, the symbol allocator and the include registry;
/// borrows the type oracle and the expression translator. Every scope in the
/// arena belongs to this one translator, which plays the role of the
/// program root.
pub struct Translator<'a> {
    pub scopes: ScopeTree,
    pub symbols: SymbolTable,
    pub includes: IncludeRegistry,
    pub options: CodegenOptions,
    oracle: &'a dyn TypeOracle,
    exprs: &'a dyn ExprTranslator,
}

impl<'a> Translator<'a> {
    pub fn new(oracle: &'a dyn TypeOracle, exprs: &'a dyn ExprTranslator) -> Self {
        Self::with_options(oracle, exprs, CodegenOptions::default())
    }

    pub fn with_options(
        oracle: &'a dyn TypeOracle,
        exprs: &'a dyn ExprTranslator,
        options: CodegenOptions,
    ) -> Self {
        Self {
            scopes: ScopeTree::new(),
            symbols: SymbolTable::new(),
            includes: IncludeRegistry::new(),
            options,
            oracle,
            exprs,
        }
    }

    pub fn oracle(&self) -> &'a dyn TypeOracle {
        self.oracle
    }

    /// Type of a node, or a contract error naming what was asked for.
    pub fn type_of(&self, id: NodeId, span: Span, what: &str) -> Result<CType, CodegenError> {
        self.oracle.type_of(id).ok_or_else(|| CodegenError::MissingType {
            span,
            what: what.to_string(),
        })
    }

    /// Translate one statement within `scope`.
    ///
    /// This is the single dispatch point: every construct that contains
    /// statements calls back in here for its children.
    pub fn translate_stmt(
        &mut self,
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<Box<dyn Renderable>, CodegenError> {
        trace!("translate {} at {} in {scope:?}", stmt.kind.name(), stmt.span);
        let node: Box<dyn Renderable> = match &stmt.kind {
            StmtKind::Break => Box::new(stmt::CBreak),
            StmtKind::Continue => Box::new(stmt::CContinue),
            StmtKind::Empty => Box::new(stmt::CEmpty),
            StmtKind::Return(value) => Box::new(stmt::CReturn::new(self, scope, value.as_ref())?),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => Box::new(stmt::CIf::new(self, scope, test, consequent, alternate.as_deref())?),
            StmtKind::Switch {
                discriminant,
                clauses,
            } => Box::new(stmt::CSwitch::new(self, scope, stmt.id, discriminant, clauses)?),
            StmtKind::While { test, body } => Box::new(stmt::CWhile::new(self, scope, test, body)?),
            StmtKind::DoWhile { body, test } => {
                Box::new(stmt::CDoWhile::new(self, scope, body, test)?)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => Box::new(stmt::CFor::new(
                self,
                scope,
                init.as_ref(),
                test.as_ref(),
                update.as_ref(),
                body,
            )?),
            StmtKind::ForOf { left, right, body } => {
                Box::new(stmt::CForOf::new(self, scope, stmt, left, right, body)?)
            }
            StmtKind::ForIn { left, right, body } => {
                Box::new(stmt::CForIn::new(self, scope, stmt, left, right, body)?)
            }
            StmtKind::Expr(expr) => Box::new(stmt::CExpressionStatement::new(self, scope, expr)?),
            StmtKind::Block(_) => Box::new(stmt::CBlock::new(self, scope, stmt)?),
            StmtKind::Import { source } => Box::new(stmt::CImport::new(self, source)),
            StmtKind::VarDecl(decls) => {
                Box::new(stmt::CVariableDeclaration::new(self, scope, decls)?)
            }
        };
        Ok(node)
    }

    /// Translate an expression through the expression collaborator.
    pub fn translate_expr(&mut self, scope: ScopeId, expr: &Expr) -> Result<String, CodegenError> {
        let exprs = self.exprs;
        exprs.translate(self, scope, expr)
    }

    /// Translate a condition, coercing source truthiness to a C boolean.
    pub fn translate_condition(
        &mut self,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<String, CodegenError> {
        let exprs = self.exprs;
        exprs.coerce_to_boolean(self, scope, expr)
    }

    /// Translate an lvalue or iterated container access.
    pub fn translate_access(&mut self, scope: ScopeId, expr: &Expr) -> Result<String, CodegenError> {
        let exprs = self.exprs;
        exprs.lower_access(self, scope, expr)
    }

    /// Lower `target = value` through the assignment collaborator.
    pub fn lower_assignment(
        &mut self,
        scope: ScopeId,
        target: &str,
        target_type: Option<&CType>,
        value: &Expr,
    ) -> Result<expr::LoweredAssignment, CodegenError> {
        let exprs = self.exprs;
        exprs.lower_assignment(self, scope, target, target_type, value)
    }
}
