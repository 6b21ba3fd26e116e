// check.rs — Sanity-check passes over the AST
//
// A pre-resolution pass validates the overall module structure straight
// after parsing; after name resolution a family of passes checks event
// functions, duplicate names, types and bounds, graph invariants, and
// pre/post increment collisions.
//
// Preconditions: `run_pre_resolution` needs only a parsed AST;
//                `run_post_resolution` assumes the resolver's contract
//                (type positions resolved as types, value positions as
//                values, calls and processor targets concrete).
// Postconditions: Ok(()) means the unit passed every check; passes are
//                 read-only, so re-running them is idempotent.
// Failure modes: the first violation aborts the pass with a `Diagnostic`.
// Side effects: none (lazy struct layouts may be materialised).

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::*;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::ops::{
    compare_bounded_type_with_constant, compare_constant_with_bounded_type, ComparisonOutcome,
};
use crate::types::{description_of_type_list, Type, TypeEqualityOptions, MAX_PACKED_OBJECT_SIZE};
use crate::value::Value;

pub type CheckResult = Result<(), Diagnostic>;

// ── Public entry points ──────────────────────────────────────────────────

/// High-level structure checks, run after parsing and before name
/// resolution.
pub fn run_pre_resolution(ast: &Ast, module: ModuleId) -> CheckResult {
    debug!(module = %ast.module(module).name, "pre-resolution structure check");
    check_overall_structure(ast, module)
}

/// The full post-resolution check family, in order: event functions,
/// duplicate names, semantic checks (with graph invariants), inc/dec
/// collisions.
pub fn run_post_resolution(ast: &Ast, module: ModuleId) -> CheckResult {
    debug!(module = %ast.module(module).name, "post-resolution sanity checks");
    run_event_function_checker(ast, module)?;
    run_duplicate_name_checker(ast, module)?;
    PostResolutionChecks::new(ast).visit_module(module)?;
    IncDecChecker { ast }.check_module(module)?;
    Ok(())
}

pub fn run_event_function_checker(ast: &Ast, module: ModuleId) -> CheckResult {
    EventFunctionChecker { ast }.check_module(module)
}

pub fn run_duplicate_name_checker(ast: &Ast, module: ModuleId) -> CheckResult {
    DuplicateNameChecker { ast }.check_module(module)
}

// ── Diagnostics with specialisation frames ───────────────────────────────

/// Build an error at a context. When the context sits inside a generic
/// specialisation, "instantiated from" frames are chained for the
/// originating call sites.
fn error_at(ast: &Ast, context: &Context, code: DiagCode, message: impl Into<String>) -> Diagnostic {
    let mut d = Diagnostic::error(code, context.location, message);

    let mut scope = context.scope;
    let mut frames = 0;
    while let Some(s) = scope {
        if frames >= crate::diag::MAX_CAUSE_FRAMES {
            break;
        }
        if let ScopeRef::Function(f) = s {
            let function = ast.function(f);
            if let Some(call) = function.specialisation_call {
                let generic_name = function
                    .original_generic
                    .map(|g| ast.function(g).name.clone())
                    .unwrap_or_else(|| function.name.clone());
                let call_context = ast.expr(call).context;
                d = d.with_cause(
                    format!("instantiated from a call to generic function '{generic_name}'"),
                    Some(call_context.location),
                );
                frames += 1;
                scope = call_context.scope;
                continue;
            }
        }
        scope = ast.parent_scope(s);
    }
    d
}

// ── Shared helpers ───────────────────────────────────────────────────────

/// Require a resolved value-position expression.
fn throw_if_not_readable_value(ast: &Ast, e: ExprId) -> CheckResult {
    if ast.is_resolved_as_value(e) {
        return Ok(());
    }
    let context = &ast.expr(e).context;
    match &ast.expr(e).kind {
        ExprKind::OutputEndpointRef(_) | ExprKind::WriteToEndpoint { .. } => Err(error_at(
            ast,
            context,
            codes::E0701,
            "cannot read from an output endpoint",
        )),
        ExprKind::ProcessorRef(_) => Err(error_at(
            ast,
            context,
            codes::E0702,
            "cannot use a processor name as a value",
        )),
        _ => Err(error_at(ast, context, codes::E0311, "expected a value")),
    }
}

/// Require a resolved type-position expression.
fn throw_if_not_readable_type(ast: &Ast, e: ExprId) -> CheckResult {
    if ast.is_resolved_as_type(e) {
        return Ok(());
    }
    let context = &ast.expr(e).context;
    match &ast.expr(e).kind {
        ExprKind::ProcessorRef(_) => Err(error_at(
            ast,
            context,
            codes::E0703,
            "cannot use a processor name as a type",
        )),
        _ => Err(error_at(ast, context, codes::E0312, "expected a type")),
    }
}

/// Fixed-size aggregates take exactly as many initialiser elements as they
/// have members.
fn throw_if_wrong_number_of_elements(
    ast: &Ast,
    context: &Context,
    target: &Type,
    available: usize,
) -> CheckResult {
    if target.is_fixed_size_aggregate()
        && target.num_aggregate_elements() != Some(available as u64)
    {
        return Err(error_at(
            ast,
            context,
            codes::E0305,
            format!(
                "wrong number of elements for an aggregate of type '{}'",
                target.description()
            ),
        ));
    }
    Ok(())
}

/// Check that `source` can be silently coerced to `target`. Comma lists are
/// matched element-wise; a single-element list reduces against a scalar
/// target.
pub fn expect_silent_cast_possible(
    ast: &Ast,
    context: &Context,
    target: &Type,
    source: ExprId,
) -> CheckResult {
    if let ExprKind::CommaList(items) = &ast.expr(source).kind {
        if target.is_array_or_vector() {
            throw_if_wrong_number_of_elements(ast, context, target, items.len())?;
            let element = match target.element_type() {
                Some(e) => e,
                None => {
                    return Err(error_at(
                        ast,
                        context,
                        codes::E0304,
                        format!(
                            "cannot create a value of type '{}' from an initialiser list",
                            target.description()
                        ),
                    ))
                }
            };
            for &item in items {
                expect_silent_cast_possible(ast, &ast.expr(item).context, &element, item)?;
            }
            return Ok(());
        }

        if let Some(s) = target.struct_ref() {
            throw_if_wrong_number_of_elements(ast, context, target, items.len())?;
            for (i, &item) in items.iter().enumerate() {
                expect_silent_cast_possible(
                    ast,
                    &ast.expr(item).context,
                    s.member_type(i),
                    item,
                )?;
            }
            return Ok(());
        }

        // A single-element list reduces against a scalar target.
        if items.len() == 1 {
            return expect_silent_cast_possible(ast, context, target, items[0]);
        }

        return Err(error_at(
            ast,
            context,
            codes::E0304,
            format!(
                "cannot create a value of type '{}' from an initialiser list",
                target.description()
            ),
        ));
    }

    if ast.can_silently_cast_to(source, target) {
        return Ok(());
    }

    // Distinguish "this value does not fit" from "these types do not match".
    if let Some(constant) = ast.as_constant(source) {
        if constant.ty().is_primitive() {
            return Err(error_at(
                ast,
                context,
                codes::E0301,
                format!(
                    "cannot implicitly convert the value {} of type '{}' to '{}'",
                    constant.description(),
                    constant.ty().description(),
                    target.description()
                ),
            ));
        }
    }

    let source_desc = ast
        .result_type(source)
        .map(|t| t.description())
        .unwrap_or_else(|| "<unresolved>".to_string());
    Err(error_at(
        ast,
        context,
        codes::E0302,
        format!(
            "cannot implicitly convert '{}' to '{}'",
            source_desc,
            target.description()
        ),
    ))
}

/// Match a source expression against a list of candidate target types. An
/// exact match (modulo 1-lane vectors) always wins; otherwise exactly one
/// candidate must accept silently.
pub fn expect_silent_cast_possible_to_one_of(
    ast: &Ast,
    context: &Context,
    targets: &[Type],
    source: ExprId,
) -> CheckResult {
    let source_type = match ast.result_type(source) {
        Some(t) => t,
        None => return throw_if_not_readable_value(ast, source),
    };

    let mut matches = 0;
    for target in targets {
        if source_type.is_equal(
            target,
            TypeEqualityOptions {
                ignore_vector_size1: true,
                ..Default::default()
            },
        ) {
            return Ok(());
        }
        if ast.can_silently_cast_to(source, target) {
            matches += 1;
        }
    }

    if matches == 0 {
        return Err(error_at(
            ast,
            context,
            codes::E0302,
            format!(
                "cannot implicitly convert '{}' to {}",
                source_type.description(),
                description_of_type_list(targets)
            ),
        ));
    }

    if matches > 1 {
        return Err(error_at(
            ast,
            context,
            codes::E0303,
            format!(
                "ambiguous implicit conversion from '{}' to {}",
                source_type.description(),
                description_of_type_list(targets)
            ),
        ));
    }

    Ok(())
}

/// Reject arrays of arrays, directly or through struct members.
fn throw_if_multidimensional(ast: &Ast, context: &Context, ty: &Type) -> CheckResult {
    if ty.is_array() {
        if let Some(element) = ty.element_type() {
            if element.is_array() {
                return Err(error_at(
                    ast,
                    context,
                    codes::E0308,
                    "multi-dimensional arrays are not yet implemented",
                ));
            }
            throw_if_multidimensional(ast, context, &element)?;
        }
    }

    if let Some(s) = ty.struct_ref() {
        for m in s.members() {
            throw_if_multidimensional(ast, context, &m.ty)?;
        }
    }

    Ok(())
}

/// Validate a constant delay-line length and return it.
pub fn check_delay_line_length(ast: &Ast, context: &Context, v: &Value) -> Result<i64, Diagnostic> {
    if !v.ty().is_primitive_integer() {
        return Err(error_at(
            ast,
            context,
            codes::E0601,
            "a delay line length must be an integer",
        ));
    }

    let length = v.get_as_i64().unwrap_or(0);

    if length < 1 {
        return Err(error_at(
            ast,
            context,
            codes::E0602,
            "a delay line must have a length of at least 1",
        ));
    }

    if length > MAX_DELAY_LINE_LENGTH {
        return Err(error_at(
            ast,
            context,
            codes::E0603,
            format!("the maximum delay line length is {MAX_DELAY_LINE_LENGTH} samples"),
        ));
    }

    Ok(length)
}

fn check_identifier_length(ast: &Ast, context: &Context, name: &str) -> CheckResult {
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(error_at(
            ast,
            context,
            codes::E0205,
            format!("identifier is too long (the maximum length is {MAX_IDENTIFIER_LENGTH} characters)"),
        ));
    }
    Ok(())
}

/// Children of an expression, in source order.
fn child_exprs(ast: &Ast, id: ExprId) -> Vec<ExprId> {
    match &ast.expr(id).kind {
        ExprKind::Constant(_)
        | ExprKind::ConcreteType(_)
        | ExprKind::QualifiedIdentifier(_)
        | ExprKind::StructRef(_)
        | ExprKind::UsingRef(_)
        | ExprKind::VariableRef(_)
        | ExprKind::InputEndpointRef(_)
        | ExprKind::OutputEndpointRef(_)
        | ExprKind::ProcessorRef(_)
        | ExprKind::AdvanceClock
        | ExprKind::ProcessorProperty(_) => Vec::new(),

        ExprKind::Dot { lhs, .. } => vec![*lhs],
        ExprKind::SubscriptBracket { lhs, index } => {
            let mut v = vec![*lhs];
            v.extend(index);
            v
        }
        ExprKind::SubscriptChevron { lhs, size } => vec![*lhs, *size],
        ExprKind::TypeMeta { source, .. } => vec![*source],
        ExprKind::Unary { source, .. } => vec![*source],
        ExprKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
        ExprKind::Ternary {
            condition,
            true_branch,
            false_branch,
        } => vec![*condition, *true_branch, *false_branch],
        ExprKind::Assignment { target, new_value } => vec![*target, *new_value],
        ExprKind::IncDec { target, .. } => vec![*target],
        ExprKind::CallOrCast {
            target, arguments, ..
        } => {
            let mut v = vec![*target];
            v.extend(arguments);
            v
        }
        ExprKind::FunctionCall { arguments, .. } => arguments.clone(),
        ExprKind::TypeCast { source, .. } => vec![*source],
        ExprKind::ArrayElement {
            object,
            start_index,
            end_index,
            ..
        } => {
            let mut v = vec![*object];
            v.extend(start_index);
            v.extend(end_index);
            v
        }
        ExprKind::StructMember { object, .. } => vec![*object],
        ExprKind::CommaList(items) => items.clone(),
        ExprKind::WriteToEndpoint { target, value } => vec![*target, *value],
        ExprKind::StaticAssertion { condition, .. } => vec![*condition],
    }
}

/// The endpoint an output expression ultimately names. Chained writes
/// (`out << a << b`) trace through the inner write.
fn find_output_endpoint(ast: &Ast, id: ExprId) -> Option<EndpointId> {
    match &ast.expr(id).kind {
        ExprKind::OutputEndpointRef(e) => Some(*e),
        ExprKind::ArrayElement { object, .. } => find_output_endpoint(ast, *object),
        ExprKind::WriteToEndpoint { target, .. } => find_output_endpoint(ast, *target),
        _ => None,
    }
}

// ── Pre-resolution structure check ───────────────────────────────────────

fn check_overall_structure(ast: &Ast, m: ModuleId) -> CheckResult {
    let module = ast.module(m);

    check_identifier_length(ast, &module.context, &module.name)?;
    for &e in &module.endpoints {
        check_identifier_length(ast, &ast.endpoint(e).context, &ast.endpoint(e).name)?;
    }
    for &f in &module.functions {
        check_identifier_length(ast, &ast.function(f).context, &ast.function(f).name)?;
    }
    for &v in &module.state_variables {
        check_identifier_length(ast, &ast.variable(v).context, &ast.variable(v).name)?;
    }
    for &s in &module.structs {
        check_identifier_length(ast, &ast.struct_decl(s).context, &ast.struct_decl(s).name)?;
    }
    for &u in &module.usings {
        check_identifier_length(ast, &ast.using_decl(u).context, &ast.using_decl(u).name)?;
    }

    if module.is_processor_or_graph() && !module.endpoints.iter().any(|&e| !ast.endpoint(e).is_input)
    {
        return Err(error_at(
            ast,
            &module.context,
            codes::E0101,
            "a processor must declare at least one output endpoint",
        ));
    }

    if module.is_processor() {
        let mut num_run_functions = 0;

        for &f in &module.functions {
            let function = ast.function(f);

            if function.is_run_function() || function.is_user_init_function() {
                if let Some(rt) = function.return_type {
                    if ast.resolve_as_type(rt).is_some_and(|t| !t.is_void()) {
                        return Err(error_at(
                            ast,
                            &function.context,
                            codes::E0103,
                            format!("the {}() function must return 'void'", function.name),
                        ));
                    }
                }

                if !function.parameters.is_empty() {
                    return Err(error_at(
                        ast,
                        &function.context,
                        codes::E0104,
                        format!("the {}() function must not declare parameters", function.name),
                    ));
                }

                if function.is_run_function() {
                    num_run_functions += 1;
                }
            }
        }

        if num_run_functions == 0
            && module
                .endpoints
                .iter()
                .any(|&e| !ast.endpoint(e).kind.is_event())
        {
            return Err(error_at(
                ast,
                &module.context,
                codes::E0105,
                "a processor with stream or value endpoints must have a run() function",
            ));
        }

        if num_run_functions > 1 {
            return Err(error_at(
                ast,
                &module.context,
                codes::E0102,
                "a processor cannot have more than one run() function",
            ));
        }
    }

    for &sub in &module.sub_modules {
        check_overall_structure(ast, sub)?;
    }

    Ok(())
}

// ── Event-function checker ───────────────────────────────────────────────

struct EventFunctionChecker<'a> {
    ast: &'a Ast,
}

impl EventFunctionChecker<'_> {
    fn check_module(&self, m: ModuleId) -> CheckResult {
        let ast = self.ast;
        let module = ast.module(m);

        if module.is_processor() {
            for &f in &module.functions {
                if ast.function(f).is_event_function {
                    self.check_event_function(module, f)?;
                }
            }
        }

        for &sub in &module.sub_modules {
            self.check_module(sub)?;
        }
        Ok(())
    }

    fn check_event_function(&self, module: &Module, f: FunctionId) -> CheckResult {
        let ast = self.ast;
        let function = ast.function(f);
        let mut name_found = false;

        for &e in &module.endpoints {
            let endpoint = ast.endpoint(e);
            if !endpoint.is_input || endpoint.name != function.name {
                continue;
            }
            name_found = true;

            let accepted = ast.endpoint_resolved_data_types(e);

            match (endpoint.array_size.is_some(), function.parameters.len()) {
                (false, 1) => {
                    self.check_payload_type(f, function.parameters[0], &accepted)?;
                }
                (true, 2) => {
                    let index_type = self.parameter_type(function.parameters[0])?;
                    if !index_type.is_integer() {
                        return Err(error_at(
                            ast,
                            &function.context,
                            codes::E0502,
                            "the index parameter of an event function on an endpoint array must be an integer",
                        ));
                    }
                    self.check_payload_type(f, function.parameters[1], &accepted)?;
                }
                _ => {
                    return Err(error_at(
                        ast,
                        &function.context,
                        codes::E0503,
                        format!(
                            "wrong number of arguments for the event function '{}'",
                            function.name
                        ),
                    ));
                }
            }
        }

        if !name_found {
            return Err(error_at(
                ast,
                &function.context,
                codes::E0504,
                format!("no input event endpoint named '{}' was found", function.name),
            ));
        }
        Ok(())
    }

    fn parameter_type(&self, p: VariableId) -> Result<Type, Diagnostic> {
        let ast = self.ast;
        match ast.variable_type(p) {
            Some(t) => Ok(t.with_const_and_ref_flags(false, false)),
            None => Err(error_at(
                ast,
                &ast.variable(p).context,
                codes::E0312,
                "expected a type",
            )),
        }
    }

    fn check_payload_type(&self, f: FunctionId, p: VariableId, accepted: &[Type]) -> CheckResult {
        let ast = self.ast;
        let payload = self.parameter_type(p)?;
        if !payload.is_present_in(accepted) {
            let function = ast.function(f);
            return Err(error_at(
                ast,
                &function.context,
                codes::E0501,
                format!(
                    "the event function '{}' takes a '{}', which this endpoint does not accept",
                    function.name,
                    payload.description()
                ),
            ));
        }
        Ok(())
    }
}

// ── Duplicate-name checker ───────────────────────────────────────────────

struct NameTable {
    seen: IndexMap<String, CodeLocation>,
}

impl NameTable {
    fn new() -> Self {
        NameTable {
            seen: IndexMap::new(),
        }
    }

    fn check(&mut self, ast: &Ast, name: &str, context: &Context) -> CheckResult {
        self.check_without_adding(ast, name, context)?;
        self.seen.insert(name.to_string(), context.location);
        Ok(())
    }

    fn check_without_adding(&self, ast: &Ast, name: &str, context: &Context) -> CheckResult {
        if let Some(first) = self.seen.get(name) {
            return Err(error_at(
                ast,
                context,
                codes::E0201,
                format!("the name '{name}' is already in use"),
            )
            .with_related(*first, "first declared here"));
        }
        Ok(())
    }
}

struct DuplicateNameChecker<'a> {
    ast: &'a Ast,
}

impl DuplicateNameChecker<'_> {
    fn check_module(&self, m: ModuleId) -> CheckResult {
        let ast = self.ast;
        let module = ast.module(m);
        let mut names = NameTable::new();

        for &e in &module.endpoints {
            names.check(ast, &ast.endpoint(e).name, &ast.endpoint(e).context)?;
            self.check_annotation_names(&ast.endpoint(e).annotation)?;
        }
        for &v in &module.state_variables {
            names.check(ast, &ast.variable(v).name, &ast.variable(v).context)?;
            self.check_annotation_names(&ast.variable(v).annotation)?;
        }
        for &s in &module.structs {
            names.check(ast, &ast.struct_decl(s).name, &ast.struct_decl(s).context)?;
            self.check_struct_members(s)?;
        }
        for &u in &module.usings {
            names.check(ast, &ast.using_decl(u).name, &ast.using_decl(u).context)?;
        }
        for &sub in &module.sub_modules {
            names.check(ast, &ast.module(sub).name, &ast.module(sub).context)?;
        }

        // Functions are scanned last: overloads may share a name with each
        // other, but not with anything else in the scope.
        for &f in &module.functions {
            let function = ast.function(f);
            if !function.is_event_function {
                let name_context = Context::new(function.name_location, function.context.scope);
                names.check_without_adding(ast, &function.name, &name_context)?;
            }
            self.check_function(f)?;
        }

        self.check_annotation_names(&module.annotation)?;

        for &sub in &module.sub_modules {
            self.check_module(sub)?;
        }
        Ok(())
    }

    fn check_function(&self, f: FunctionId) -> CheckResult {
        let ast = self.ast;
        let function = ast.function(f);
        let mut params = NameTable::new();

        for &p in &function.parameters {
            params.check(ast, &ast.variable(p).name, &ast.variable(p).context)?;
        }
        self.check_annotation_names(&function.annotation)?;

        if let Some(block) = function.block {
            self.check_block(block)?;
        }
        Ok(())
    }

    fn check_block(&self, b: BlockId) -> CheckResult {
        let ast = self.ast;
        let mut locals = NameTable::new();

        for &s in &ast.block(b).statements {
            if let StmtKind::VariableDeclaration(v) = ast.stmt(s).kind {
                locals.check(ast, &ast.variable(v).name, &ast.variable(v).context)?;
            }
            self.check_nested_blocks(s)?;
        }
        Ok(())
    }

    fn check_nested_blocks(&self, s: StmtId) -> CheckResult {
        match &self.ast.stmt(s).kind {
            StmtKind::Block(b) => self.check_block(*b),
            StmtKind::If {
                true_branch,
                false_branch,
                ..
            } => {
                self.check_nested_blocks(*true_branch)?;
                if let Some(f) = false_branch {
                    self.check_nested_blocks(*f)?;
                }
                Ok(())
            }
            StmtKind::Loop { iterator, body, .. } => {
                if let Some(i) = iterator {
                    self.check_nested_blocks(*i)?;
                }
                if let Some(b) = body {
                    self.check_nested_blocks(*b)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_struct_members(&self, s: StructId) -> CheckResult {
        let ast = self.ast;
        let decl = ast.struct_decl(s);
        let mut members = NameTable::new();
        for m in &decl.members {
            members.check(ast, &m.name, &decl.context)?;
        }
        Ok(())
    }

    fn check_annotation_names(&self, annotation: &Annotation) -> CheckResult {
        let ast = self.ast;
        let mut names = NameTable::new();
        for p in &annotation.properties {
            let context = Context::new(p.name_location, None);
            names.check(ast, &p.name, &context)?;
        }
        Ok(())
    }
}

// ── Post-resolution semantic checks ──────────────────────────────────────

/// A struct or using declaration on the recursion-detection stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeDeclRef {
    Struct(StructId),
    Using(UsingId),
}

impl TypeDeclRef {
    fn name(self, ast: &Ast) -> String {
        match self {
            TypeDeclRef::Struct(s) => ast.struct_decl(s).name.clone(),
            TypeDeclRef::Using(u) => ast.using_decl(u).name.clone(),
        }
    }

    fn context(self, ast: &Ast) -> Context {
        match self {
            TypeDeclRef::Struct(s) => ast.struct_decl(s).context,
            TypeDeclRef::Using(u) => ast.using_decl(u).context,
        }
    }
}

struct PostResolutionChecks<'a> {
    ast: &'a Ast,
    type_decl_stack: Vec<TypeDeclRef>,
}

impl<'a> PostResolutionChecks<'a> {
    fn new(ast: &'a Ast) -> Self {
        PostResolutionChecks {
            ast,
            type_decl_stack: Vec::new(),
        }
    }

    fn visit_module(&mut self, m: ModuleId) -> CheckResult {
        let ast = self.ast;
        let module = ast.module(m);
        trace!(module = %module.name, "checking module");

        // Type declarations first, so recursive types are reported before
        // anything asks for their layout.
        for &s in &module.structs {
            self.visit_struct_decl(s)?;
        }
        for &u in &module.usings {
            self.visit_using_decl(u)?;
        }
        for &e in &module.endpoints {
            self.visit_endpoint(e)?;
        }

        self.check_annotation_values(&module.annotation)?;

        self.check_duplicate_function_signatures(&module.functions)?;

        for &v in &module.state_variables {
            self.visit_variable(v)?;

            let variable = ast.variable(v);
            if module.is_processor() {
                if let Some(initial) = variable.initial_value {
                    if !ast.is_compile_time_constant(initial) {
                        return Err(error_at(
                            ast,
                            &ast.expr(initial).context,
                            codes::E0313,
                            "expected a compile-time constant",
                        ));
                    }
                }
            }
            if module.is_namespace() && !ast.variable_is_compile_time_constant(v) {
                return Err(error_at(
                    ast,
                    &variable.context,
                    codes::E0314,
                    "namespace-level variables must be compile-time constants",
                ));
            }
        }

        for &f in &module.functions {
            self.visit_function(f)?;
        }

        if module.is_graph() {
            for &i in &module.processor_instances {
                self.visit_instance(i)?;
            }
            for &c in &module.connections {
                self.visit_connection(c)?;
            }
            check_graph_recursion(ast, m, &mut Vec::new())?;
            check_graph_cycles(ast, m)?;
        }

        for &sub in &module.sub_modules {
            self.visit_module(sub)?;
        }
        Ok(())
    }

    // ── Type declarations and recursion detection ───────────────────────

    fn push_type_decl(&mut self, decl: TypeDeclRef) -> CheckResult {
        let ast = self.ast;
        if self.type_decl_stack.contains(&decl) {
            let context = decl.context(ast);
            if self.type_decl_stack.last() == Some(&decl) {
                return Err(error_at(
                    ast,
                    &context,
                    codes::E0401,
                    format!("the type '{}' contains itself", decl.name(ast)),
                ));
            }
            let other = self.type_decl_stack.last().copied();
            return Err(error_at(
                ast,
                &context,
                codes::E0402,
                format!(
                    "the types '{}' and '{}' refer to each other recursively",
                    decl.name(ast),
                    other.map(|o| o.name(ast)).unwrap_or_default()
                ),
            ));
        }
        self.type_decl_stack.push(decl);
        Ok(())
    }

    fn visit_struct_decl(&mut self, s: StructId) -> CheckResult {
        let ast = self.ast;
        self.push_type_decl(TypeDeclRef::Struct(s))?;

        for member in &ast.struct_decl(s).members {
            self.visit_type_ref(member.ty)?;
        }
        self.type_decl_stack.pop();

        for member in &ast.struct_decl(s).members {
            if ast.constness(member.ty) == Constness::DefinitelyConst {
                return Err(error_at(
                    ast,
                    &ast.expr(member.ty).context,
                    codes::E0310,
                    "struct members cannot be declared const",
                ));
            }
        }
        Ok(())
    }

    fn visit_using_decl(&mut self, u: UsingId) -> CheckResult {
        self.push_type_decl(TypeDeclRef::Using(u))?;
        if let Some(target) = self.ast.using_decl(u).target {
            self.visit_type_ref(target)?;
        }
        self.type_decl_stack.pop();
        Ok(())
    }

    /// Follow a type-position expression into the declarations it names, so
    /// the recursion stack sees every struct/using reachable from it.
    fn visit_type_ref(&mut self, e: ExprId) -> CheckResult {
        match &self.ast.expr(e).kind {
            ExprKind::StructRef(s) => self.visit_struct_decl(*s),
            ExprKind::UsingRef(u) => self.visit_using_decl(*u),
            ExprKind::TypeMeta { source, .. } => self.visit_type_ref(*source),
            ExprKind::SubscriptBracket { lhs, .. } => self.visit_type_ref(*lhs),
            ExprKind::SubscriptChevron { lhs, .. } => self.visit_type_ref(*lhs),
            _ => Ok(()),
        }
    }

    // ── Declarations ────────────────────────────────────────────────────

    fn visit_variable(&mut self, v: VariableId) -> CheckResult {
        let ast = self.ast;
        let variable = ast.variable(v);

        if let Some(declared) = variable.declared_type {
            throw_if_not_readable_type(ast, declared)?;
            self.visit_type_ref(declared)?;
        } else if let Some(initial) = variable.initial_value {
            throw_if_not_readable_value(ast, initial)?;
        }

        if let Some(initial) = variable.initial_value {
            self.visit_expr(initial)?;
        }

        let context = variable
            .declared_type
            .map(|t| ast.expr(t).context)
            .unwrap_or(variable.context);

        let ty = match ast.variable_type(v) {
            Some(t) => t,
            None => return Err(error_at(ast, &context, codes::E0312, "expected a type")),
        };

        if ty.is_void() {
            return Err(error_at(
                ast,
                &context,
                codes::E0306,
                "a variable cannot have the type 'void'",
            ));
        }

        if ty.is_packed_size_too_big() {
            return Err(error_at(
                ast,
                &context,
                codes::E0307,
                format!(
                    "the type '{}' is too big ({} bytes; the limit is {} bytes)",
                    ty.description(),
                    ty.packed_size_in_bytes(),
                    MAX_PACKED_OBJECT_SIZE
                ),
            ));
        }

        throw_if_multidimensional(ast, &context, &ty)?;

        // With both a declared type and an initialiser, the initialiser must
        // coerce silently.
        if let (Some(_), Some(initial)) = (variable.declared_type, variable.initial_value) {
            expect_silent_cast_possible(ast, &ast.expr(initial).context, &ty, initial)?;
        }

        self.check_annotation_values(&variable.annotation)?;
        Ok(())
    }

    fn visit_function(&mut self, f: FunctionId) -> CheckResult {
        let ast = self.ast;
        let function = ast.function(f);

        // Generic functions are skipped until they are specialised.
        if function.is_generic() {
            return Ok(());
        }

        for &p in &function.parameters {
            if ast.variable_type(p).is_some_and(|t| t.is_void()) {
                return Err(error_at(
                    ast,
                    &ast.variable(p).context,
                    codes::E0317,
                    "function parameters cannot be void",
                ));
            }
            self.visit_variable(p)?;
        }

        if let Some(rt) = function.return_type {
            self.visit_type_ref(rt)?;
        }

        self.check_annotation_values(&function.annotation)?;

        if let Some(block) = function.block {
            self.visit_block(block)?;
        }
        Ok(())
    }

    fn check_duplicate_function_signatures(&self, functions: &[FunctionId]) -> CheckResult {
        let ast = self.ast;
        let mut signatures: Vec<String> = Vec::new();

        for &f in functions {
            if ast.function(f).is_generic() {
                continue;
            }
            let sig = ast.function_signature_id(f);
            if signatures.contains(&sig) {
                return Err(error_at(
                    ast,
                    &ast.function(f).context,
                    codes::E0202,
                    format!(
                        "a function matching '{}' has already been defined",
                        ast.function_description(f)
                    ),
                ));
            }
            signatures.push(sig);
        }
        Ok(())
    }

    fn visit_endpoint(&mut self, e: EndpointId) -> CheckResult {
        let ast = self.ast;
        let endpoint = ast.endpoint(e);

        for &t in &endpoint.data_types {
            self.visit_type_ref(t)?;
        }

        let resolved = ast.endpoint_resolved_data_types(e);

        if endpoint.kind.is_stream() {
            if let Some(first) = resolved.first() {
                if !(first.is_primitive() || first.is_vector()) {
                    return Err(error_at(
                        ast,
                        &endpoint.context,
                        codes::E0315,
                        format!(
                            "the type '{}' cannot be used for a stream endpoint",
                            first.description()
                        ),
                    ));
                }
            }
        }

        if !endpoint.kind.is_event() && endpoint.data_types.len() > 1 {
            return Err(error_at(
                ast,
                &endpoint.context,
                codes::E0315,
                "only event endpoints can declare multiple data types",
            ));
        }

        // All declared types must be distinct.
        for (i, a) in resolved.iter().enumerate() {
            for b in &resolved[..i] {
                if a.is_equal(
                    b,
                    TypeEqualityOptions {
                        ignore_vector_size1: true,
                        ..Default::default()
                    },
                ) {
                    return Err(error_at(
                        ast,
                        &endpoint.context,
                        codes::E0316,
                        format!(
                            "the type '{}' appears more than once in this endpoint's type list",
                            a.description()
                        ),
                    ));
                }
            }
        }

        if endpoint.array_size.is_some() {
            self.check_array_size(e, MAX_ENDPOINT_ARRAY_SIZE)?;
        }

        self.check_annotation_values(&endpoint.annotation)?;
        Ok(())
    }

    fn check_array_size(&self, e: EndpointId, max_size: i64) -> CheckResult {
        let ast = self.ast;
        let size_expr = match ast.endpoint(e).array_size {
            Some(s) => s,
            None => return Ok(()),
        };
        self.check_array_size_expr(size_expr, max_size)
    }

    fn check_array_size_expr(&self, size_expr: ExprId, max_size: i64) -> CheckResult {
        let ast = self.ast;
        let context = &ast.expr(size_expr).context;

        let constant = match ast.as_constant(size_expr) {
            Some(c) => c,
            None => {
                return Err(error_at(
                    ast,
                    context,
                    codes::E0608,
                    "an array size must be a compile-time constant",
                ))
            }
        };

        if !constant.ty().is_integer() {
            return Err(error_at(
                ast,
                context,
                codes::E0605,
                "an array size must be an integer",
            ));
        }

        let size = constant.get_as_i64().unwrap_or(0);
        if size < 1 || size > max_size {
            return Err(error_at(
                ast,
                context,
                codes::E0604,
                format!("the array size must be between 1 and {max_size}"),
            ));
        }
        Ok(())
    }

    fn visit_instance(&mut self, i: InstanceId) -> CheckResult {
        let instance = self.ast.instance(i);
        if let Some(size) = instance.array_size {
            self.check_array_size_expr(size, MAX_PROCESSOR_ARRAY_SIZE)?;
        }
        Ok(())
    }

    fn visit_connection(&mut self, c: ConnectionId) -> CheckResult {
        let ast = self.ast;
        let connection = ast.connection(c);

        if let Some(delay) = connection.delay_length {
            throw_if_not_readable_value(ast, delay)?;
            if let Some(constant) = ast.as_constant(delay) {
                check_delay_line_length(ast, &ast.expr(delay).context, &constant)?;
            }
        }
        Ok(())
    }

    fn check_annotation_values(&self, annotation: &Annotation) -> CheckResult {
        let ast = self.ast;
        for p in &annotation.properties {
            if !ast.is_compile_time_constant(p.value) {
                return Err(error_at(
                    ast,
                    &ast.expr(p.value).context,
                    codes::E0704,
                    format!("the annotation property '{}' must be a compile-time constant", p.name),
                ));
            }
        }
        Ok(())
    }

    // ── Statements and expressions ──────────────────────────────────────

    fn visit_block(&mut self, b: BlockId) -> CheckResult {
        let ast = self.ast;
        for &s in &ast.block(b).statements {
            self.visit_stmt(s)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, s: StmtId) -> CheckResult {
        match &self.ast.stmt(s).kind {
            StmtKind::Block(b) => self.visit_block(*b),
            StmtKind::If {
                condition,
                true_branch,
                false_branch,
            } => {
                self.visit_expr(*condition)?;
                self.visit_stmt(*true_branch)?;
                if let Some(f) = false_branch {
                    self.visit_stmt(*f)?;
                }
                Ok(())
            }
            StmtKind::Loop {
                num_iterations,
                condition,
                iterator,
                body,
                ..
            } => {
                if let Some(n) = num_iterations {
                    self.visit_expr(*n)?;
                }
                if let Some(c) = condition {
                    self.visit_expr(*c)?;
                }
                if let Some(i) = iterator {
                    self.visit_stmt(*i)?;
                }
                if let Some(b) = body {
                    self.visit_stmt(*b)?;
                }
                Ok(())
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.visit_expr(*v)?;
                }
                Ok(())
            }
            StmtKind::VariableDeclaration(v) => self.visit_variable(*v),
            StmtKind::Expr(e) => self.visit_expr(*e),
            StmtKind::Break | StmtKind::Continue | StmtKind::Noop => Ok(()),
        }
    }

    fn visit_expr(&mut self, id: ExprId) -> CheckResult {
        let ast = self.ast;

        for child in child_exprs(ast, id) {
            self.visit_expr(child)?;
        }

        match &ast.expr(id).kind {
            ExprKind::Unary { op, source } => {
                if let Some(t) = ast.result_type(*source) {
                    if !op.is_type_suitable(&t) {
                        return Err(error_at(
                            ast,
                            &ast.expr(*source).context,
                            codes::E0309,
                            format!(
                                "the type '{}' is not suitable for the unary '{}' operator",
                                t.description(),
                                op.symbol()
                            ),
                        ));
                    }
                }
                Ok(())
            }

            ExprKind::Binary { op, lhs, rhs, .. } if op.is_comparison() => {
                let lhs_const = ast.as_constant(*lhs);
                let rhs_const = ast.as_constant(*rhs);

                let outcome = match (&lhs_const, &rhs_const) {
                    (Some(c), None) => match ast.result_type(*rhs) {
                        Some(t) => compare_constant_with_bounded_type(*op, c, &t),
                        None => ComparisonOutcome::Unknown,
                    },
                    (None, Some(c)) => match ast.result_type(*lhs) {
                        Some(t) => compare_bounded_type_with_constant(*op, &t, c),
                        None => ComparisonOutcome::Unknown,
                    },
                    _ => ComparisonOutcome::Unknown,
                };

                match outcome {
                    ComparisonOutcome::AlwaysTrue => Err(error_at(
                        ast,
                        &ast.expr(id).context,
                        codes::E0606,
                        "this comparison is always true",
                    )),
                    ComparisonOutcome::AlwaysFalse => Err(error_at(
                        ast,
                        &ast.expr(id).context,
                        codes::E0607,
                        "this comparison is always false",
                    )),
                    ComparisonOutcome::Unknown => Ok(()),
                }
            }

            ExprKind::CommaList(items) => {
                if items.len() > MAX_INITIALISER_LIST_LENGTH {
                    return Err(error_at(
                        ast,
                        &ast.expr(id).context,
                        codes::E0318,
                        format!(
                            "initialiser list is too long (the maximum is {MAX_INITIALISER_LIST_LENGTH} elements)"
                        ),
                    ));
                }
                Ok(())
            }

            ExprKind::WriteToEndpoint { target, value } => {
                throw_if_not_readable_value(ast, *value)?;

                if let Some(e) = find_output_endpoint(ast, *target) {
                    if ast.endpoint_is_resolved(e) {
                        let sample_types = ast.endpoint_sample_array_types(e);
                        expect_silent_cast_possible_to_one_of(
                            ast,
                            &ast.expr(*value).context,
                            &sample_types,
                            *value,
                        )?;
                    }
                }
                Ok(())
            }

            ExprKind::StaticAssertion { condition, message } => {
                if let Some(c) = ast.as_constant(*condition) {
                    if c.get_as_bool() == Some(false) {
                        let text = match message {
                            Some(m) => format!("static assertion failed: {m}"),
                            None => "static assertion failed".to_string(),
                        };
                        return Err(error_at(ast, &ast.expr(id).context, codes::E0705, text));
                    }
                }
                Ok(())
            }

            ExprKind::StructMember {
                structure, member, ..
            } => {
                if structure.member_with_name(member).is_none() {
                    return Err(error_at(
                        ast,
                        &ast.expr(id).context,
                        codes::E0203,
                        format!(
                            "the struct '{}' has no member called '{}'",
                            structure.name(),
                            member
                        ),
                    ));
                }
                Ok(())
            }

            ExprKind::TypeMeta { op, source } => {
                let source_type = if ast.is_resolved_as_type(*source) {
                    ast.resolve_as_type(*source)
                } else if ast.is_resolved_as_value(*source) {
                    ast.result_type(*source)
                } else {
                    None
                };

                if let Some(t) = source_type {
                    if !op.check_source_type(&t) {
                        let context = &ast.expr(id).context;
                        return Err(match op {
                            TypeMetaOp::Size => error_at(
                                ast,
                                &ast.expr(*source).context,
                                codes::E0320,
                                format!("cannot take the size of the type '{}'", t.description()),
                            ),
                            TypeMetaOp::MakeConst => error_at(
                                ast,
                                context,
                                codes::E0321,
                                "the type is already const",
                            ),
                            TypeMetaOp::ElementType => error_at(
                                ast,
                                context,
                                codes::E0322,
                                "elementType can only be applied to arrays and vectors",
                            ),
                            TypeMetaOp::PrimitiveType => error_at(
                                ast,
                                context,
                                codes::E0323,
                                "primitiveType cannot be applied to array or struct types",
                            ),
                            _ => error_at(ast, context, codes::E0312, "expected a type"),
                        });
                    }
                }
                Ok(())
            }

            _ => Ok(()),
        }
    }
}

// ── Graph invariants ─────────────────────────────────────────────────────

/// The concrete module a processor instance points at, if it is known.
fn instance_target_module(ast: &Ast, graph: ModuleId, i: InstanceId) -> Option<ModuleId> {
    let target = ast.instance(i).target?;
    match &ast.expr(target).kind {
        ExprKind::ProcessorRef(m) => Some(*m),
        ExprKind::QualifiedIdentifier(path) => {
            let found = ast.find_matching_sub_modules(ScopeRef::Module(graph), path);
            if found.len() == 1 {
                Some(found[0])
            } else {
                None
            }
        }
        _ => None,
    }
}

/// No graph may transitively contain an instance of itself.
fn check_graph_recursion(ast: &Ast, g: ModuleId, stack: &mut Vec<ModuleId>) -> CheckResult {
    if stack.contains(&g) {
        return Err(error_at(
            ast,
            &ast.module(g).context,
            codes::E0403,
            format!(
                "the graph '{}' contains itself recursively",
                ast.fully_qualified_module_path(g)
            ),
        ));
    }

    stack.push(g);
    for &i in &ast.module(g).processor_instances {
        if let Some(target) = instance_target_module(ast, g, i) {
            if ast.module(target).is_graph() {
                check_graph_recursion(ast, target, stack)?;
            }
        }
    }
    stack.pop();
    Ok(())
}

/// Directed cycle detection over processor instances, following only
/// connections without a delay element. A cycle is reported as an ordered
/// trace beginning and ending at the same node.
fn check_graph_cycles(ast: &Ast, g: ModuleId) -> CheckResult {
    let module = ast.module(g);

    let mut node_names: Vec<String> = Vec::new();
    let mut node_index: IndexMap<String, usize> = IndexMap::new();
    for &i in &module.processor_instances {
        let name = ast.instance(i).instance_name.to_string();
        node_index.insert(name.clone(), node_names.len());
        node_names.push(name);
    }

    // source-node → (dest-node, connection) for every zero-delay edge
    let mut adjacency: Vec<Vec<(usize, ConnectionId)>> = vec![Vec::new(); node_names.len()];

    for &c in &module.connections {
        let connection = ast.connection(c);
        if connection.delay_length.is_some() {
            continue;
        }

        let lookup = |end: &ConnectionEnd| -> Result<Option<usize>, Diagnostic> {
            if end.processor_name.is_empty() {
                return Ok(None); // the graph's own endpoint
            }
            match node_index.get(&end.processor_name.to_string()) {
                Some(&n) => Ok(Some(n)),
                None => Err(error_at(
                    ast,
                    &connection.context,
                    codes::E0206,
                    format!("cannot find processor instance '{}'", end.processor_name),
                )),
            }
        };

        if let (Some(src), Some(dst)) = (lookup(&connection.source)?, lookup(&connection.dest)?) {
            adjacency[src].push((dst, c));
        }
    }

    // DFS with a path stack; a back edge closes a cycle and the trace is
    // the path slice from the first occurrence.
    let mut state = vec![0u8; node_names.len()]; // 0 unvisited, 1 in progress, 2 done
    let mut path: Vec<usize> = Vec::new();

    fn dfs(
        ast: &Ast,
        node: usize,
        adjacency: &[Vec<(usize, ConnectionId)>],
        state: &mut [u8],
        path: &mut Vec<usize>,
        names: &[String],
    ) -> CheckResult {
        state[node] = 1;
        path.push(node);

        for &(next, connection) in &adjacency[node] {
            match state[next] {
                0 => dfs(ast, next, adjacency, state, path, names)?,
                1 => {
                    let pos = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut trace: Vec<&str> =
                        path[pos..].iter().map(|&n| names[n].as_str()).collect();
                    trace.push(names[next].as_str());
                    return Err(error_at(
                        ast,
                        &ast.connection(connection).context,
                        codes::E0404,
                        format!("feedback cycle in graph: {}", trace.join(" -> ")),
                    ));
                }
                _ => {}
            }
        }

        path.pop();
        state[node] = 2;
        Ok(())
    }

    for node in 0..node_names.len() {
        if state[node] == 0 {
            dfs(ast, node, &adjacency, &mut state, &mut path, &node_names)?;
        }
    }
    Ok(())
}

// ── Pre/post increment collision check ───────────────────────────────────

struct IncDecChecker<'a> {
    ast: &'a Ast,
}

impl IncDecChecker<'_> {
    fn check_module(&self, m: ModuleId) -> CheckResult {
        let ast = self.ast;
        let module = ast.module(m);

        for &v in &module.state_variables {
            if let Some(initial) = ast.variable(v).initial_value {
                self.check_statement_expr(initial)?;
            }
        }

        for &f in &module.functions {
            if let Some(block) = ast.function(f).block {
                self.check_block(block)?;
            }
        }

        for &sub in &module.sub_modules {
            self.check_module(sub)?;
        }
        Ok(())
    }

    fn check_block(&self, b: BlockId) -> CheckResult {
        for &s in &self.ast.block(b).statements {
            self.check_stmt(s)?;
        }
        Ok(())
    }

    /// Every statement gets its own read/modified tracking sets; nested
    /// statements start fresh.
    fn check_stmt(&self, s: StmtId) -> CheckResult {
        match &self.ast.stmt(s).kind {
            StmtKind::Block(b) => self.check_block(*b),

            StmtKind::If {
                condition,
                true_branch,
                false_branch,
            } => {
                self.check_statement_expr(*condition)?;
                self.check_stmt(*true_branch)?;
                if let Some(f) = false_branch {
                    self.check_stmt(*f)?;
                }
                Ok(())
            }

            StmtKind::Loop {
                num_iterations,
                condition,
                iterator,
                body,
                ..
            } => {
                if let Some(n) = num_iterations {
                    self.check_statement_expr(*n)?;
                }
                if let Some(c) = condition {
                    self.check_statement_expr(*c)?;
                }
                if let Some(i) = iterator {
                    self.check_stmt(*i)?;
                }
                if let Some(b) = body {
                    self.check_stmt(*b)?;
                }
                Ok(())
            }

            StmtKind::Return(Some(e)) | StmtKind::Expr(e) => self.check_statement_expr(*e),

            StmtKind::VariableDeclaration(v) => {
                if let Some(initial) = self.ast.variable(*v).initial_value {
                    self.check_statement_expr(initial)?;
                }
                Ok(())
            }

            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Noop => Ok(()),
        }
    }

    fn check_statement_expr(&self, e: ExprId) -> CheckResult {
        let mut modified = Vec::new();
        let mut referenced = Vec::new();
        self.visit_expr(e, &mut modified, &mut referenced)
    }

    fn visit_expr(
        &self,
        id: ExprId,
        modified: &mut Vec<VariableId>,
        referenced: &mut Vec<VariableId>,
    ) -> CheckResult {
        let ast = self.ast;

        match &ast.expr(id).kind {
            ExprKind::VariableRef(v) => {
                if modified.contains(v) {
                    return Err(self.collision(id));
                }
                referenced.push(*v);
                Ok(())
            }

            ExprKind::IncDec { target, .. } => {
                if let ExprKind::VariableRef(v) = &ast.expr(*target).kind {
                    if referenced.contains(v) {
                        return Err(self.collision(*target));
                    }
                    modified.push(*v);
                    referenced.push(*v);
                    return Ok(());
                }
                self.visit_expr(*target, modified, referenced)
            }

            _ => {
                for child in child_exprs(ast, id) {
                    self.visit_expr(child, modified, referenced)?;
                }
                Ok(())
            }
        }
    }

    fn collision(&self, id: ExprId) -> Diagnostic {
        error_at(
            self.ast,
            &self.ast.expr(id).context,
            codes::E0706,
            "a variable cannot be both incremented/decremented and read elsewhere in the same statement",
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use std::cell::OnceCell;

    fn loc() -> CodeLocation {
        CodeLocation::none()
    }

    fn root(ast: &mut Ast, kind: ModuleKind, name: &str) -> ModuleId {
        ast.add_module(Module::new(Context::new(loc(), None), kind, name))
    }

    fn module_ctx(m: ModuleId) -> Context {
        Context::new(loc(), Some(ScopeRef::Module(m)))
    }

    fn concrete_type(ast: &mut Ast, c: Context, ty: Type) -> ExprId {
        ast.add_expr(c, ExprKind::ConcreteType(ty))
    }

    fn constant(ast: &mut Ast, c: Context, v: Value) -> ExprId {
        ast.add_expr(c, ExprKind::Constant(v))
    }

    fn add_output_stream(ast: &mut Ast, m: ModuleId, name: &str, ty: Type) -> EndpointId {
        let c = module_ctx(m);
        let t = concrete_type(ast, c, ty);
        let mut e = Endpoint::new(c, name, false, EndpointKind::Stream);
        e.data_types.push(t);
        let e = ast.add_endpoint(e);
        ast.module_mut(m).endpoints.push(e);
        e
    }

    fn add_void_function(ast: &mut Ast, m: ModuleId, name: &str) -> FunctionId {
        let c = module_ctx(m);
        let rt = concrete_type(ast, c, Type::void());
        let mut f = Function::new(c, name);
        f.return_type = Some(rt);
        let f = ast.add_function(f);
        ast.module_mut(m).functions.push(f);
        f
    }

    #[test]
    fn processor_without_outputs_is_rejected() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        add_void_function(&mut ast, p, "run");

        let err = run_pre_resolution(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0101);
    }

    #[test]
    fn two_run_functions_are_rejected() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        add_output_stream(&mut ast, p, "out", Type::float32());
        add_void_function(&mut ast, p, "run");
        add_void_function(&mut ast, p, "run");

        let err = run_pre_resolution(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0102);
    }

    #[test]
    fn run_function_must_be_void_and_parameterless() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        add_output_stream(&mut ast, p, "out", Type::float32());

        let c = module_ctx(p);
        let rt = concrete_type(&mut ast, c, Type::int32());
        let mut f = Function::new(c, "run");
        f.return_type = Some(rt);
        let f = ast.add_function(f);
        ast.module_mut(p).functions.push(f);

        let err = run_pre_resolution(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0103);
    }

    #[test]
    fn processor_with_streams_needs_a_run_function() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        add_output_stream(&mut ast, p, "out", Type::float32());

        let err = run_pre_resolution(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0105);
    }

    #[test]
    fn duplicate_names_in_scope() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        add_output_stream(&mut ast, p, "out", Type::float32());
        add_output_stream(&mut ast, p, "out", Type::float32());
        add_void_function(&mut ast, p, "run");

        let err = run_duplicate_name_checker(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0201);
        assert_eq!(err.related.len(), 1);
    }

    #[test]
    fn duplicate_function_signatures() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        for _ in 0..2 {
            let rt = concrete_type(&mut ast, c, Type::void());
            let pt = concrete_type(&mut ast, c, Type::float32());
            let mut param = Variable::new(c, "x", VariableRole::Parameter);
            param.declared_type = Some(pt);
            let param = ast.add_variable(param);

            let mut f = Function::new(c, "emit");
            f.return_type = Some(rt);
            f.parameters.push(param);
            let f = ast.add_function(f);
            ast.module_mut(n).functions.push(f);
        }

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0202);
    }

    #[test]
    fn void_variables_are_rejected() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let t = concrete_type(&mut ast, c, Type::void());
        let mut v = Variable::new(c, "x", VariableRole::Constant);
        v.declared_type = Some(t);
        let v = ast.add_variable(v);
        ast.module_mut(n).state_variables.push(v);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0306);
    }

    #[test]
    fn multidimensional_arrays_are_rejected() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let t = concrete_type(&mut ast, c, Type::int32().array_of(3).array_of(2));
        let init = constant(&mut ast, c, Value::from_i32(0));
        let mut v = Variable::new(c, "m", VariableRole::Constant);
        v.declared_type = Some(t);
        let _ = init;
        let v = ast.add_variable(v);
        ast.module_mut(n).state_variables.push(v);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0308);
    }

    #[test]
    fn const_struct_members_are_rejected() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let member_ty = concrete_type(&mut ast, c, Type::int32().with_const());
        let mut s = StructDecl::new(c, "S");
        s.add_member(member_ty, "x");
        let s = ast.add_struct(s);
        ast.module_mut(n).structs.push(s);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0310);
    }

    #[test]
    fn self_referential_struct_is_reported() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let sid = StructId(0);
        let self_ref = ast.add_expr(c, ExprKind::StructRef(sid));
        let mut s = StructDecl::new(c, "S");
        s.add_member(self_ref, "s");
        let added = ast.add_struct(s);
        assert_eq!(added, sid);
        ast.module_mut(n).structs.push(added);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0401);
    }

    #[test]
    fn self_referential_using_is_reported() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let u_id = UsingId(0);
        let self_ref = ast.add_expr(c, ExprKind::UsingRef(u_id));
        let added = ast.add_using(UsingDecl::new(c, "Alias", Some(self_ref)));
        assert_eq!(added, u_id);
        ast.module_mut(n).usings.push(added);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0401);
    }

    #[test]
    fn mutually_recursive_structs_are_reported() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let a_id = StructId(0);
        let b_id = StructId(1);

        let b_ref = ast.add_expr(c, ExprKind::StructRef(b_id));
        let mut a = StructDecl::new(c, "A");
        a.add_member(b_ref, "b");
        assert_eq!(ast.add_struct(a), a_id);

        let a_ref = ast.add_expr(c, ExprKind::StructRef(a_id));
        let mut b = StructDecl::new(c, "B");
        b.add_member(a_ref, "a");
        assert_eq!(ast.add_struct(b), b_id);

        ast.module_mut(n).structs.push(a_id);
        ast.module_mut(n).structs.push(b_id);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0402);
    }

    #[test]
    fn delay_length_bounds() {
        let ast = Ast::new();
        let c = Context::new(loc(), None);

        let too_short = Value::from_i32(0);
        let err = check_delay_line_length(&ast, &c, &too_short).unwrap_err();
        assert_eq!(err.code, codes::E0602);

        let too_long = Value::from_i32(300_000);
        let err = check_delay_line_length(&ast, &c, &too_long).unwrap_err();
        assert_eq!(err.code, codes::E0603);

        let not_int = Value::from_f32(1.5);
        let err = check_delay_line_length(&ast, &c, &not_int).unwrap_err();
        assert_eq!(err.code, codes::E0601);

        assert_eq!(
            check_delay_line_length(&ast, &c, &Value::from_i32(64)).unwrap(),
            64
        );
    }

    #[test]
    fn silent_cast_list_arity() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let items = vec![
            constant(&mut ast, c, Value::from_i32(1)),
            constant(&mut ast, c, Value::from_i32(2)),
        ];
        let list = ast.add_expr(c, ExprKind::CommaList(items));

        // Two elements into int32[2]: fine.
        expect_silent_cast_possible(&ast, &c, &Type::int32().array_of(2), list).unwrap();

        // Two elements into int32[3]: arity error.
        let err =
            expect_silent_cast_possible(&ast, &c, &Type::int32().array_of(3), list).unwrap_err();
        assert_eq!(err.code, codes::E0305);

        // A list cannot initialise a plain scalar.
        let err = expect_silent_cast_possible(&ast, &c, &Type::int32(), list).unwrap_err();
        assert_eq!(err.code, codes::E0304);
    }

    #[test]
    fn initialiser_that_does_not_fit_names_the_value() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        // const wrap<10> ok = 7 passes; const wrap<10> bad = 15 names the
        // offending value in its diagnostic.
        let ok_ty = concrete_type(&mut ast, c, Type::wrapped_int(10));
        let ok_init = constant(&mut ast, c, Value::from_i32(7));
        let mut ok = Variable::new(c, "ok", VariableRole::Constant);
        ok.declared_type = Some(ok_ty);
        ok.initial_value = Some(ok_init);
        let ok = ast.add_variable(ok);
        ast.module_mut(n).state_variables.push(ok);

        PostResolutionChecks::new(&ast).visit_module(n).unwrap();

        let bad_ty = concrete_type(&mut ast, c, Type::wrapped_int(10));
        let bad_init = constant(&mut ast, c, Value::from_i32(15));
        let mut bad = Variable::new(c, "bad", VariableRole::Constant);
        bad.declared_type = Some(bad_ty);
        bad.initial_value = Some(bad_init);
        let bad = ast.add_variable(bad);
        ast.module_mut(n).state_variables.push(bad);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0301);
        assert!(err.message.contains("15"), "message: {}", err.message);
    }

    #[test]
    fn silent_cast_single_element_list_reduces_to_scalar() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let one = vec![constant(&mut ast, c, Value::from_i32(7))];
        let list = ast.add_expr(c, ExprKind::CommaList(one));

        expect_silent_cast_possible(&ast, &c, &Type::int64(), list).unwrap();
    }

    #[test]
    fn candidate_list_tie_breaks() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let source = constant(&mut ast, c, Value::from_i32(5));

        // Exact match wins no matter how many others would accept.
        expect_silent_cast_possible_to_one_of(
            &ast,
            &c,
            &[Type::int32(), Type::int64(), Type::float64()],
            source,
        )
        .unwrap();

        // One silent match: accepted.
        let bool_source = constant(&mut ast, c, Value::from_bool(true));
        expect_silent_cast_possible_to_one_of(
            &ast,
            &c,
            &[Type::string_literal(), Type::int32()],
            bool_source,
        )
        .unwrap();

        // Two silent matches: ambiguous.
        let err = expect_silent_cast_possible_to_one_of(
            &ast,
            &c,
            &[Type::int64(), Type::float64()],
            bool_source,
        )
        .unwrap_err();
        assert_eq!(err.code, codes::E0303);

        // No match at all.
        let mut s = crate::types::Structure::new("S");
        s.add_member(Type::int32(), "x");
        let struct_ty = Type::structure(std::rc::Rc::new(s));
        let err =
            expect_silent_cast_possible_to_one_of(&ast, &c, &[struct_ty], bool_source).unwrap_err();
        assert_eq!(err.code, codes::E0302);
    }

    #[test]
    fn comparison_against_bounded_range_is_flagged() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        // A value of type wrap<10>, compared with the constant 12.
        let bounded = constant(
            &mut ast,
            c,
            Value::from_raw_data(Type::wrapped_int(10), &3i32.to_le_bytes()),
        );
        // Strip its constant-ness by viewing it through a non-constant
        // variable, so only one side folds.
        let mut v = Variable::new(c, "i", VariableRole::State);
        v.initial_value = Some(bounded);
        let v = ast.add_variable(v);
        let var_ref = ast.add_expr(c, ExprKind::VariableRef(v));

        let twelve = constant(&mut ast, c, Value::from_i32(12));
        let cmp = ast.add_expr(
            c,
            ExprKind::Binary {
                op: crate::ops::BinaryOp::LessThan,
                lhs: var_ref,
                rhs: twelve,
                cached_types: OnceCell::new(),
            },
        );

        let err = PostResolutionChecks::new(&ast).visit_expr(cmp).unwrap_err();
        assert_eq!(err.code, codes::E0606);
    }

    #[test]
    fn inc_dec_collision_cases() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let init = constant(&mut ast, c, Value::from_i32(0));
        let mut v = Variable::new(c, "i", VariableRole::State);
        v.initial_value = Some(init);
        let v = ast.add_variable(v);

        // i = i++ + i → collision
        let target = ast.add_expr(c, ExprKind::VariableRef(v));
        let inc_target = ast.add_expr(c, ExprKind::VariableRef(v));
        let inc = ast.add_expr(
            c,
            ExprKind::IncDec {
                target: inc_target,
                is_increment: true,
                is_post: true,
            },
        );
        let read = ast.add_expr(c, ExprKind::VariableRef(v));
        let sum = ast.add_expr(
            c,
            ExprKind::Binary {
                op: crate::ops::BinaryOp::Add,
                lhs: inc,
                rhs: read,
                cached_types: OnceCell::new(),
            },
        );
        let assign = ast.add_expr(
            c,
            ExprKind::Assignment {
                target,
                new_value: sum,
            },
        );

        // A lone i++ is fine, and so is reading i in a different statement.
        let lone_target = ast.add_expr(c, ExprKind::VariableRef(v));
        let lone = ast.add_expr(
            c,
            ExprKind::IncDec {
                target: lone_target,
                is_increment: true,
                is_post: true,
            },
        );
        let separate_read = ast.add_expr(c, ExprKind::VariableRef(v));

        let checker = IncDecChecker { ast: &ast };
        let err = checker.check_statement_expr(assign).unwrap_err();
        assert_eq!(err.code, codes::E0706);
        checker.check_statement_expr(lone).unwrap();
        checker.check_statement_expr(separate_read).unwrap();
    }

    #[test]
    fn namespace_variables_must_be_constant() {
        let mut ast = Ast::new();
        let n = root(&mut ast, ModuleKind::Namespace, "lib");
        let c = module_ctx(n);

        let init = constant(&mut ast, c, Value::from_i32(1));
        let mut v = Variable::new(c, "x", VariableRole::State);
        v.initial_value = Some(init);
        let v = ast.add_variable(v);
        ast.module_mut(n).state_variables.push(v);

        let err = PostResolutionChecks::new(&ast).visit_module(n).unwrap_err();
        assert_eq!(err.code, codes::E0314);
    }

    #[test]
    fn endpoint_array_size_bounds() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        let c = module_ctx(p);

        let t = concrete_type(&mut ast, c, Type::float32());
        let size = constant(&mut ast, c, Value::from_i32(300));
        let mut e = Endpoint::new(c, "out", false, EndpointKind::Stream);
        e.data_types.push(t);
        e.array_size = Some(size);
        let e = ast.add_endpoint(e);
        ast.module_mut(p).endpoints.push(e);

        let err = PostResolutionChecks::new(&ast).visit_module(p).unwrap_err();
        assert_eq!(err.code, codes::E0604);
    }

    #[test]
    fn event_endpoint_type_mismatch() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        let c = module_ctx(p);

        // in event { int32, float32 } ev
        let int_t = concrete_type(&mut ast, c, Type::int32());
        let float_t = concrete_type(&mut ast, c, Type::float32());
        let mut e = Endpoint::new(c, "ev", true, EndpointKind::Event);
        e.data_types.push(int_t);
        e.data_types.push(float_t);
        let e = ast.add_endpoint(e);
        ast.module_mut(p).endpoints.push(e);

        // void ev (bool x)
        let bool_t = concrete_type(&mut ast, c, Type::bool_type());
        let mut param = Variable::new(c, "x", VariableRole::Parameter);
        param.declared_type = Some(bool_t);
        let param = ast.add_variable(param);

        let rt = concrete_type(&mut ast, c, Type::void());
        let mut f = Function::new(c, "ev");
        f.return_type = Some(rt);
        f.parameters.push(param);
        f.is_event_function = true;
        let f = ast.add_function(f);
        ast.module_mut(p).functions.push(f);

        let err = run_event_function_checker(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0501);
    }

    #[test]
    fn event_function_without_endpoint() {
        let mut ast = Ast::new();
        let p = root(&mut ast, ModuleKind::Processor, "P");
        let c = module_ctx(p);

        let rt = concrete_type(&mut ast, c, Type::void());
        let mut f = Function::new(c, "missing");
        f.return_type = Some(rt);
        f.is_event_function = true;
        let f = ast.add_function(f);
        ast.module_mut(p).functions.push(f);

        let err = run_event_function_checker(&ast, p).unwrap_err();
        assert_eq!(err.code, codes::E0504);
    }
}
