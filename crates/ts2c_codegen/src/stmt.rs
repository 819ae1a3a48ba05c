//! Statement translators.
//!
//! Each statement kind has a renderable built by [`Translator::translate_stmt`].
//! Constructors do all the work (scopes, symbols, child statements);
//! rendering afterwards is a pure function of the stored fields.

use log::debug;

use crate::error::CodegenError;
use crate::expr::LoweredAssignment;
use crate::memory::{DestructorPlan, Release};
use crate::scope::{CVariable, ScopeId};
use crate::template::{Renderable, Value};
use crate::types::CType;
use crate::{
    AssignOp, Expr, ExprKind, ForBinding, ForInit, NodeId, Stmt, StmtKind, SwitchClause,
    Translator, VarDeclarator,
};

pub(crate) type Statements = Vec<Box<dyn Renderable>>;

pub(crate) fn translate_all(
    tr: &mut Translator<'_>,
    scope: ScopeId,
    stmts: &[Stmt],
) -> Result<Statements, CodegenError> {
    stmts.iter().map(|stmt| tr.translate_stmt(scope, stmt)).collect()
}

/// Move everything declared in `from` into `to`.
fn hoist_variables(tr: &mut Translator<'_>, from: ScopeId, to: ScopeId) -> Result<(), CodegenError> {
    let drained = tr.scopes.drain_variables(from)?;
    tr.scopes.extend_variables(to, drained)
}

// ---------------------------------------------------------------------------
// break / continue / empty
// ---------------------------------------------------------------------------

pub struct CBreak;

impl Renderable for CBreak {
    fn name(&self) -> &'static str {
        "CBreak"
    }
    fn template(&self) -> &'static str {
        "break;\n"
    }
    fn field(&self, _name: &str) -> Option<Value<'_>> {
        None
    }
}

pub struct CContinue;

impl Renderable for CContinue {
    fn name(&self) -> &'static str {
        "CContinue"
    }
    fn template(&self) -> &'static str {
        "continue;\n"
    }
    fn field(&self, _name: &str) -> Option<Value<'_>> {
        None
    }
}

pub struct CEmpty;

impl Renderable for CEmpty {
    fn name(&self) -> &'static str {
        "CEmpty"
    }
    fn template(&self) -> &'static str {
        ";\n"
    }
    fn field(&self, _name: &str) -> Option<Value<'_>> {
        None
    }
}

// ---------------------------------------------------------------------------
// return
// ---------------------------------------------------------------------------

pub struct CReturn {
    expression: Option<String>,
    destructors: Vec<Release>,
}

impl CReturn {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        value: Option<&Expr>,
    ) -> Result<Self, CodegenError> {
        // The returned expression may still read locals, so it is translated
        // before anything is released.
        let expression = value.map(|v| tr.translate_expr(scope, v)).transpose()?;
        let returned = value.and_then(Expr::as_ident);
        let plan = DestructorPlan::build(&tr.scopes, scope, returned)?;
        Ok(Self {
            expression,
            destructors: plan.into_releases(),
        })
    }
}

impl Renderable for CReturn {
    fn name(&self) -> &'static str {
        "CReturn"
    }

    fn template(&self) -> &'static str {
        r#"{destructors {}=> {this}}
{#if expression}
    return {expression};
{#else}
    return;
{/if}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "destructors" => Some(Value::list(&self.destructors)),
            "expression" => Some(Value::text(self.expression.as_deref().unwrap_or(""))),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// if
// ---------------------------------------------------------------------------

pub struct CIf {
    condition: String,
    then_block: CBlock,
    else_block: Option<CBlock>,
}

impl CIf {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        test: &Expr,
        consequent: &Stmt,
        alternate: Option<&Stmt>,
    ) -> Result<Self, CodegenError> {
        let condition = tr.translate_condition(scope, test)?;
        let mut then_block = CBlock::new(tr, scope, consequent)?;
        let else_block = alternate
            .map(|stmt| CBlock::new(tr, scope, stmt))
            .transpose()?;
        // An unbraced then-branch ending in an else-less `if` would capture
        // our `else` in C.
        if else_block.is_some() && ends_with_open_if(consequent) {
            then_block.force_braces = true;
        }
        Ok(Self {
            condition,
            then_block,
            else_block,
        })
    }
}

/// Whether `stmt`, printed without braces, ends in an `if` with no `else`.
fn ends_with_open_if(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::If { alternate: None, .. } => true,
        StmtKind::If {
            alternate: Some(alternate),
            ..
        } => ends_with_open_if(alternate),
        StmtKind::While { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::ForOf { body, .. }
        | StmtKind::ForIn { body, .. } => ends_with_open_if(body),
        StmtKind::Block(stmts) => matches!(stmts.as_slice(), [only] if ends_with_open_if(only)),
        _ => false,
    }
}

impl Renderable for CIf {
    fn name(&self) -> &'static str {
        "CIf"
    }

    fn template(&self) -> &'static str {
        r#"if ({condition})
{then_block}
{#if has_else}
    else
    {else_block}
{/if}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "condition" => Some(Value::text(self.condition.as_str())),
            "then_block" => Some(Value::Node(&self.then_block)),
            "has_else" => Some(Value::Flag(self.else_block.is_some())),
            "else_block" => Some(match &self.else_block {
                Some(block) => Value::Node(block),
                None => Value::text(""),
            }),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// switch
// ---------------------------------------------------------------------------

/// A `switch`. Only numbers switch natively in C; any other discriminant is
/// first mapped to its clause index by a `strcmp` chain stored in a
/// temporary, and the native switch then runs over that index.
pub struct CSwitch {
    switch: String,
    non_integral: bool,
    values: Vec<String>,
    cases: Vec<CSwitchCase>,
}

impl CSwitch {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        node: NodeId,
        discriminant: &Expr,
        clauses: &[SwitchClause],
    ) -> Result<Self, CodegenError> {
        let discriminant_type = tr.oracle().type_of(discriminant.id).unwrap_or(CType::Unknown);
        let subject = tr.translate_expr(scope, discriminant)?;
        let non_integral = !discriminant_type.is_number();

        let switch = if non_integral {
            let tmp = tr.symbols.fresh_temporary(node, "tmp_switch");
            tr.scopes
                .add_variable(scope, CVariable::new(tmp.as_str(), CType::Number))?;
            tr.includes.register("string");
            debug!("switch over {discriminant_type} emulated through `{tmp}`");
            tmp
        } else {
            subject.clone()
        };

        let mut values = Vec::new();
        let mut cases = Vec::with_capacity(clauses.len());
        for (index, clause) in clauses.iter().enumerate() {
            let value = match &clause.test {
                None => String::new(),
                Some(test) => {
                    let value = tr.translate_expr(scope, test)?;
                    if non_integral {
                        values.push(format!("!strcmp({subject}, {value}) ? {index}"));
                        index.to_string()
                    } else {
                        value
                    }
                }
            };
            cases.push(CSwitchCase::new(tr, scope, clause, value)?);
        }

        Ok(Self {
            switch,
            non_integral,
            values,
            cases,
        })
    }
}

impl Renderable for CSwitch {
    fn name(&self) -> &'static str {
        "CSwitch"
    }

    fn template(&self) -> &'static str {
        r#"{#if non_integral}
    {switch} = {values {}=> {this}
        : }-1;
{/if}
switch ({switch}) {
    {cases {}=> {this}}
}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "switch" => Some(Value::text(self.switch.as_str())),
            "non_integral" => Some(Value::Flag(self.non_integral)),
            "values" => Some(Value::texts(&self.values)),
            "cases" => Some(Value::list(&self.cases)),
            _ => None,
        }
    }
}

pub struct CSwitchCase {
    is_default: bool,
    value: String,
    statements: Statements,
}

impl CSwitchCase {
    fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        clause: &SwitchClause,
        value: String,
    ) -> Result<Self, CodegenError> {
        let clause_scope = tr.scopes.new_child(scope)?;
        let statements = translate_all(tr, clause_scope, &clause.body)?;
        // C has no declarations right after a case label.
        hoist_variables(tr, clause_scope, scope)?;
        Ok(Self {
            is_default: clause.is_default(),
            value,
            statements,
        })
    }
}

impl Renderable for CSwitchCase {
    fn name(&self) -> &'static str {
        "CSwitchCase"
    }

    fn template(&self) -> &'static str {
        r#"{#if is_default}
    default:
{#else}
    case {value}:
{/if}
    {statements {}=> {this}}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "is_default" => Some(Value::Flag(self.is_default)),
            "value" => Some(Value::text(self.value.as_str())),
            "statements" => Some(Value::nodes(&self.statements)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// while / do-while / for
// ---------------------------------------------------------------------------

pub struct CWhile {
    condition: String,
    block: CBlock,
}

impl CWhile {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        test: &Expr,
        body: &Stmt,
    ) -> Result<Self, CodegenError> {
        let condition = tr.translate_condition(scope, test)?;
        let block = CBlock::new(tr, scope, body)?;
        Ok(Self { condition, block })
    }
}

impl Renderable for CWhile {
    fn name(&self) -> &'static str {
        "CWhile"
    }
    fn template(&self) -> &'static str {
        "while ({condition})\n{block}\n"
    }
    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "condition" => Some(Value::text(self.condition.as_str())),
            "block" => Some(Value::Node(&self.block)),
            _ => None,
        }
    }
}

pub struct CDoWhile {
    block: CBlock,
    condition: String,
}

impl CDoWhile {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        body: &Stmt,
        test: &Expr,
    ) -> Result<Self, CodegenError> {
        let block = CBlock::new(tr, scope, body)?;
        let condition = tr.translate_condition(scope, test)?;
        Ok(Self { block, condition })
    }
}

impl Renderable for CDoWhile {
    fn name(&self) -> &'static str {
        "CDoWhile"
    }
    fn template(&self) -> &'static str {
        "do\n{block}\nwhile ({condition});\n"
    }
    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "condition" => Some(Value::text(self.condition.as_str())),
            "block" => Some(Value::Node(&self.block)),
            _ => None,
        }
    }
}

/// A `for` loop. A declaration in the init clause is hoisted: its variables
/// join the enclosing scope and its initializers run just before the loop.
pub struct CFor {
    var_decl: Option<CVariableDeclaration>,
    init: String,
    condition: String,
    increment: String,
    block: CBlock,
}

impl CFor {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Self, CodegenError> {
        let (var_decl, init) = match init {
            Some(ForInit::VarDecl(decls)) => {
                (Some(CVariableDeclaration::new(tr, scope, decls)?), String::new())
            }
            Some(ForInit::Expr(expr)) => (None, tr.translate_expr(scope, expr)?),
            None => (None, String::new()),
        };
        let condition = test
            .map(|test| tr.translate_condition(scope, test))
            .transpose()?
            .unwrap_or_default();
        let increment = update
            .map(|update| tr.translate_expr(scope, update))
            .transpose()?
            .unwrap_or_default();
        let block = CBlock::new(tr, scope, body)?;
        Ok(Self {
            var_decl,
            init,
            condition,
            increment,
            block,
        })
    }
}

impl Renderable for CFor {
    fn name(&self) -> &'static str {
        "CFor"
    }

    fn template(&self) -> &'static str {
        r#"{var_decl}
for ({init}; {condition}; {increment})
{block}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "var_decl" => Some(match &self.var_decl {
                Some(decl) => Value::Node(decl),
                None => Value::text(""),
            }),
            "init" => Some(Value::text(self.init.as_str())),
            "condition" => Some(Value::text(self.condition.as_str())),
            "increment" => Some(Value::text(self.increment.as_str())),
            "block" => Some(Value::Node(&self.block)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// for-of / for-in
// ---------------------------------------------------------------------------

/// Declare or resolve the loop binding; returns the lvalue to assign each
/// element to.
fn bind_loop_variable(
    tr: &mut Translator<'_>,
    scope: ScopeId,
    left: &ForBinding,
) -> Result<String, CodegenError> {
    match left {
        ForBinding::Decl(decl) => {
            let ty = tr.type_of(decl.id, decl.span, &format!("loop variable `{}`", decl.name))?;
            tr.scopes
                .add_variable(scope, CVariable::new(decl.name.as_str(), ty))?;
            Ok(decl.name.clone())
        }
        ForBinding::Target(target) => tr.translate_access(scope, target),
    }
}

/// `for (x of array)`: an index loop over a fixed or dynamic array.
pub struct CForOf {
    iterator: String,
    is_dynamic: bool,
    capacity: usize,
    array: String,
    cast: &'static str,
    init: String,
    statements: Statements,
}

impl CForOf {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        stmt: &Stmt,
        left: &ForBinding,
        right: &Expr,
        body: &Stmt,
    ) -> Result<Self, CodegenError> {
        let iterated = tr.type_of(right.id, right.span, "iterated expression")?;
        let Some(array) = iterated.as_array() else {
            return Err(CodegenError::unsupported(
                right.span,
                "for-of",
                format!("cannot iterate over a value of type {iterated}"),
            ));
        };
        let (is_dynamic, capacity) = (array.is_dynamic, array.capacity);
        let cast = if array.element_type.is_dynamic_array() {
            "(void *)"
        } else {
            ""
        };

        let iterator = tr.symbols.fresh_iterator(stmt.id);
        tr.scopes
            .add_variable(scope, CVariable::new(iterator.as_str(), CType::Number))?;
        let array = tr.translate_expr(scope, right)?;
        let init = bind_loop_variable(tr, scope, left)?;

        let loop_scope = tr.scopes.new_child(scope)?;
        let statements = vec![tr.translate_stmt(loop_scope, body)?];
        hoist_variables(tr, loop_scope, scope)?;

        Ok(Self {
            iterator,
            is_dynamic,
            capacity,
            array,
            cast,
            init,
            statements,
        })
    }
}

impl Renderable for CForOf {
    fn name(&self) -> &'static str {
        "CForOf"
    }

    fn template(&self) -> &'static str {
        r#"{#if is_dynamic}
    for ({iterator} = 0; {iterator} < {array}->size; {iterator}++)
{#else}
    for ({iterator} = 0; {iterator} < {capacity}; {iterator}++)
{/if}
{
    {#if is_dynamic}
        {init} = {cast}{array}->data[{iterator}];
    {#else}
        {init} = {cast}{array}[{iterator}];
    {/if}
    {statements {}=> {this}}
}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "iterator" => Some(Value::text(self.iterator.as_str())),
            "is_dynamic" => Some(Value::Flag(self.is_dynamic)),
            "capacity" => Some(Value::text(self.capacity.to_string())),
            "array" => Some(Value::text(self.array.as_str())),
            "cast" => Some(Value::text(self.cast)),
            "init" => Some(Value::text(self.init.as_str())),
            "statements" => Some(Value::nodes(&self.statements)),
            _ => None,
        }
    }
}

/// `for (k in dict)`: walks the dictionary's key index in order.
pub struct CForIn {
    iterator: String,
    dict: String,
    init: String,
    statements: Statements,
}

impl CForIn {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        stmt: &Stmt,
        left: &ForBinding,
        right: &Expr,
        body: &Stmt,
    ) -> Result<Self, CodegenError> {
        let iterated = tr.type_of(right.id, right.span, "iterated expression")?;
        if iterated.as_dict().is_none() {
            return Err(CodegenError::unsupported(
                right.span,
                "for-in",
                format!("cannot enumerate keys of a value of type {iterated}"),
            ));
        }

        let iterator = tr.symbols.fresh_iterator(stmt.id);
        tr.scopes
            .add_variable(scope, CVariable::new(iterator.as_str(), CType::Number))?;
        let dict = tr.translate_expr(scope, right)?;
        let init = bind_loop_variable(tr, scope, left)?;

        let loop_scope = tr.scopes.new_child(scope)?;
        // One level of block is unwrapped into the loop's own braces.
        let statements = match &body.kind {
            StmtKind::Block(stmts) => translate_all(tr, loop_scope, stmts)?,
            _ => vec![tr.translate_stmt(loop_scope, body)?],
        };
        hoist_variables(tr, loop_scope, scope)?;

        Ok(Self {
            iterator,
            dict,
            init,
            statements,
        })
    }
}

impl Renderable for CForIn {
    fn name(&self) -> &'static str {
        "CForIn"
    }

    fn template(&self) -> &'static str {
        r#"for ({iterator} = 0; {iterator} < {dict}->index->size; {iterator}++)
{
    {init} = {dict}->index->data[{iterator}];
    {statements {}=> {this}}
}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "iterator" => Some(Value::text(self.iterator.as_str())),
            "dict" => Some(Value::text(self.dict.as_str())),
            "init" => Some(Value::text(self.init.as_str())),
            "statements" => Some(Value::nodes(&self.statements)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// expression statement
// ---------------------------------------------------------------------------

pub struct CExpressionStatement {
    expression: String,
    terminator: &'static str,
}

impl CExpressionStatement {
    pub fn new(tr: &mut Translator<'_>, scope: ScopeId, expr: &Expr) -> Result<Self, CodegenError> {
        if let ExprKind::Assign {
            op: AssignOp::Assign,
            target,
            value,
        } = &expr.kind
        {
            let target_type = tr.oracle().type_of(target.id);
            let target = tr.translate_access(scope, target)?;
            let lowered = tr.lower_assignment(scope, &target, target_type.as_ref(), value)?;
            return Ok(Self::from_lowered(lowered));
        }
        Ok(Self {
            expression: tr.translate_expr(scope, expr)?,
            terminator: ";",
        })
    }

    fn from_lowered(lowered: LoweredAssignment) -> Self {
        Self {
            terminator: if lowered.complete_statement { "" } else { ";" },
            expression: lowered.text,
        }
    }
}

impl Renderable for CExpressionStatement {
    fn name(&self) -> &'static str {
        "CExpressionStatement"
    }
    fn template(&self) -> &'static str {
        "{expression}{terminator}\n"
    }
    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "expression" => Some(Value::text(self.expression.as_str())),
            "terminator" => Some(Value::text(self.terminator)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// block
// ---------------------------------------------------------------------------

/// A nested block with its own scope.
///
/// Renders braced when it declares locals or holds several statements, as a
/// lone indented statement when it holds exactly one, and as an explicit
/// no-op when it holds nothing.
pub struct CBlock {
    variables: Vec<CVariable>,
    statements: Statements,
    force_braces: bool,
}

impl CBlock {
    /// Translate `body` in a new child scope of `scope`. A block statement
    /// contributes its statements; any other statement becomes the only one.
    pub fn new(tr: &mut Translator<'_>, scope: ScopeId, body: &Stmt) -> Result<Self, CodegenError> {
        let inner = tr.scopes.new_child(scope)?;
        let stmts = match &body.kind {
            StmtKind::Block(stmts) => stmts.as_slice(),
            _ => std::slice::from_ref(body),
        };
        let statements = translate_all(tr, inner, stmts)?;
        let variables = tr.scopes.variables(inner)?.to_vec();
        Ok(Self {
            variables,
            statements,
            force_braces: false,
        })
    }

    fn is_braced(&self) -> bool {
        self.force_braces || self.statements.len() > 1 || !self.variables.is_empty()
    }
}

impl Renderable for CBlock {
    fn name(&self) -> &'static str {
        "CBlock"
    }

    fn template(&self) -> &'static str {
        r#"{#if braced}
    {
        {variables {}=> {this}}
        {statements {}=> {this}}
    }
{/if}
{#if single}
        {statements}
{/if}
{#if empty}
        /* no statements */;
{/if}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "braced" => Some(Value::Flag(self.is_braced())),
            "single" => Some(Value::Flag(!self.is_braced() && self.statements.len() == 1)),
            "empty" => Some(Value::Flag(self.statements.is_empty() && self.variables.is_empty())),
            "variables" => Some(Value::list(&self.variables)),
            "statements" => Some(Value::nodes(&self.statements)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// import
// ---------------------------------------------------------------------------

/// Imports produce no code. Those naming the external target register a
/// header instead.
pub struct CImport;

impl CImport {
    pub fn new(tr: &mut Translator<'_>, source: &str) -> Self {
        if let Some(header) = external_header(&tr.options.include_marker, source) {
            if tr.includes.register(header.as_str()) {
                debug!("import \"{source}\" includes <{header}.h>");
            }
        }
        CImport
    }
}

/// `ts2c-target/arduino/index` -> `arduino`.
fn external_header(marker: &str, source: &str) -> Option<String> {
    if !source.starts_with(marker) {
        return None;
    }
    let (_, rest) = source.split_once('/')?;
    let rest = rest.strip_suffix("/index").unwrap_or(rest);
    (!rest.is_empty()).then(|| rest.to_string())
}

impl Renderable for CImport {
    fn name(&self) -> &'static str {
        "CImport"
    }
    fn template(&self) -> &'static str {
        ""
    }
    fn field(&self, _name: &str) -> Option<Value<'_>> {
        None
    }
}

// ---------------------------------------------------------------------------
// variable declaration
// ---------------------------------------------------------------------------

/// `let`/`const`/`var`. The variables are declared at the top of the
/// enclosing scope; only the initializing assignments render here.
pub struct CVariableDeclaration {
    assignments: Vec<CExpressionStatement>,
}

impl CVariableDeclaration {
    pub fn new(
        tr: &mut Translator<'_>,
        scope: ScopeId,
        decls: &[VarDeclarator],
    ) -> Result<Self, CodegenError> {
        let mut assignments = Vec::new();
        for decl in decls {
            let ty = tr.type_of(decl.id, decl.span, &format!("variable `{}`", decl.name))?;
            tr.scopes
                .add_variable(scope, CVariable::new(decl.name.as_str(), ty.clone()))?;
            if let Some(init) = &decl.init {
                let lowered = tr.lower_assignment(scope, &decl.name, Some(&ty), init)?;
                assignments.push(CExpressionStatement::from_lowered(lowered));
            }
        }
        Ok(Self { assignments })
    }
}

impl Renderable for CVariableDeclaration {
    fn name(&self) -> &'static str {
        "CVariableDeclaration"
    }
    fn template(&self) -> &'static str {
        "{assignments {}=> {this}}\n"
    }
    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "assignments" => Some(Value::list(&self.assignments)),
            _ => None,
        }
    }
}
