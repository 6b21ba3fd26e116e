// ast.rs — AST node universe for Chime compilation units
//
// Arena-allocated nodes covering modules (processor / graph / namespace),
// declarations, statements, expressions, endpoints, and connections, with
// scope-aware name lookup and per-expression resolution state. The parser
// populates the arena, the resolver rewrites nodes in place, and the
// sanity-check passes in `check` validate the result.
//
// Preconditions: ids handed to accessors come from this arena.
// Postconditions: nodes live until the compilation unit is dropped.
// Failure modes: queries that need resolution state return None/false when
//                the node is still unresolved.
// Side effects: none.

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::Rc;

use chumsky::span::SimpleSpan;

use crate::ops::{BinaryOp, UnaryOp};
use crate::strings::{ConstantTable, StringDictionary};
use crate::type_rules::{self, BinaryOperatorTypes};
use crate::types::{Structure, Type};
use crate::value::Value;

// ── Limits ───────────────────────────────────────────────────────────────

pub const MAX_IDENTIFIER_LENGTH: usize = 128;
pub const MAX_INITIALISER_LIST_LENGTH: usize = 1024 * 64;
pub const MAX_ENDPOINT_ARRAY_SIZE: i64 = 256;
pub const MAX_PROCESSOR_ARRAY_SIZE: i64 = 256;
pub const MAX_DELAY_LINE_LENGTH: i64 = 1024 * 256;

/// The reserved per-sample function name of a processor.
pub const RUN_FUNCTION_NAME: &str = "run";
/// The reserved user-initialisation function name.
pub const USER_INIT_FUNCTION_NAME: &str = "init";

// ── Source locations ─────────────────────────────────────────────────────

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// Build a span from byte offsets.
pub fn span(start: usize, end: usize) -> Span {
    use chumsky::span::Span as _;
    Span::new((), start..end)
}

/// Identity of a source file within the compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// A resolved source position: file, byte span, and line/column.
#[derive(Debug, Clone, Copy)]
pub struct CodeLocation {
    pub file: FileId,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl CodeLocation {
    pub fn new(file: FileId, span: Span, line: u32, column: u32) -> Self {
        CodeLocation {
            file,
            span,
            line,
            column,
        }
    }

    /// Location for synthesised nodes with no source text.
    pub fn none() -> Self {
        CodeLocation::new(FileId(0), span(0, 0), 0, 0)
    }
}

// ── Node ids ─────────────────────────────────────────────────────────────

/// Stable identifier of a module node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Stable identifier of a function node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// Stable identifier of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

/// Stable identifier of an endpoint declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub u32);

/// Stable identifier of a struct declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub u32);

/// Stable identifier of a using (type alias) declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsingId(pub u32);

/// Stable identifier of a processor alias declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasId(pub u32);

/// Stable identifier of a processor instance inside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

/// Stable identifier of a connection inside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// Stable identifier of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Stable identifier of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

/// Stable identifier of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

// ── Context and scopes ───────────────────────────────────────────────────

/// A scope handle: any node that introduces a naming region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRef {
    Module(ModuleId),
    Function(FunctionId),
    Block(BlockId),
}

/// Every node carries a context: its source location and its parent scope.
/// The parent link is a non-owning back-reference and is never followed
/// during teardown.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub location: CodeLocation,
    pub scope: Option<ScopeRef>,
}

impl Context {
    pub fn new(location: CodeLocation, scope: Option<ScopeRef>) -> Self {
        Context { location, scope }
    }
}

// ── Identifier paths ─────────────────────────────────────────────────────

/// A possibly qualified name, e.g. `filters::biquad`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentifierPath {
    pub parts: Vec<String>,
}

impl IdentifierPath {
    pub fn from_name(name: impl Into<String>) -> Self {
        IdentifierPath {
            parts: vec![name.into()],
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        IdentifierPath { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn last_part(&self) -> &str {
        self.parts.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Everything except the final component.
    pub fn parent(&self) -> IdentifierPath {
        IdentifierPath {
            parts: self.parts[..self.parts.len().saturating_sub(1)].to_vec(),
        }
    }
}

impl fmt::Display for IdentifierPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("::"))
    }
}

// ── Annotations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AnnotationProperty {
    pub name: String,
    pub name_location: CodeLocation,
    pub value: ExprId,
}

/// A `[[ name: value, ... ]]` annotation map attached to declarations.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub properties: Vec<AnnotationProperty>,
}

impl Annotation {
    pub fn find_property(&self, name: &str) -> Option<&AnnotationProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn add_property(&mut self, property: AnnotationProperty) {
        self.properties.push(property);
    }

    /// Replace an existing property of the same name, or append.
    pub fn set_property(&mut self, property: AnnotationProperty) {
        for p in &mut self.properties {
            if p.name == property.name {
                p.value = property.value;
                return;
            }
        }
        self.add_property(property);
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

// ── Modules ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Processor,
    Graph,
    Namespace,
}

/// A processor, graph, or namespace. Graphs leave the function/struct lists
/// empty; namespaces use `state_variables` for their constants.
#[derive(Debug)]
pub struct Module {
    pub context: Context,
    pub kind: ModuleKind,
    pub name: String,
    pub endpoints: Vec<EndpointId>,
    pub structs: Vec<StructId>,
    pub usings: Vec<UsingId>,
    pub functions: Vec<FunctionId>,
    pub state_variables: Vec<VariableId>,
    pub sub_modules: Vec<ModuleId>,
    pub processor_instances: Vec<InstanceId>,
    pub connections: Vec<ConnectionId>,
    pub processor_aliases: Vec<AliasId>,
    pub annotation: Annotation,
    pub is_fully_resolved: bool,
}

impl Module {
    pub fn new(context: Context, kind: ModuleKind, name: impl Into<String>) -> Self {
        Module {
            context,
            kind,
            name: name.into(),
            endpoints: Vec::new(),
            structs: Vec::new(),
            usings: Vec::new(),
            functions: Vec::new(),
            state_variables: Vec::new(),
            sub_modules: Vec::new(),
            processor_instances: Vec::new(),
            connections: Vec::new(),
            processor_aliases: Vec::new(),
            annotation: Annotation::default(),
            is_fully_resolved: false,
        }
    }

    pub fn is_processor(&self) -> bool {
        self.kind == ModuleKind::Processor
    }

    pub fn is_graph(&self) -> bool {
        self.kind == ModuleKind::Graph
    }

    pub fn is_namespace(&self) -> bool {
        self.kind == ModuleKind::Namespace
    }

    /// Processors and graphs expose endpoints; namespaces do not.
    pub fn is_processor_or_graph(&self) -> bool {
        !self.is_namespace()
    }
}

// ── Functions ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Function {
    pub context: Context,
    pub name: String,
    pub name_location: CodeLocation,
    pub return_type: Option<ExprId>,
    pub parameters: Vec<VariableId>,
    pub block: Option<BlockId>,
    pub generic_wildcards: Vec<String>,
    pub is_event_function: bool,
    pub annotation: Annotation,
    /// For a generic specialisation: the call that triggered it. Feeds the
    /// "instantiated from" frames in diagnostics.
    pub specialisation_call: Option<ExprId>,
    pub original_generic: Option<FunctionId>,
}

impl Function {
    pub fn new(context: Context, name: impl Into<String>) -> Self {
        let name = name.into();
        Function {
            name_location: context.location,
            context,
            name,
            return_type: None,
            parameters: Vec::new(),
            block: None,
            generic_wildcards: Vec::new(),
            is_event_function: false,
            annotation: Annotation::default(),
            specialisation_call: None,
            original_generic: None,
        }
    }

    pub fn is_run_function(&self) -> bool {
        self.name == RUN_FUNCTION_NAME
    }

    pub fn is_user_init_function(&self) -> bool {
        self.name == USER_INIT_FUNCTION_NAME
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_wildcards.is_empty()
    }
}

// ── Variables ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    Local,
    Parameter,
    State,
    Constant,
}

#[derive(Debug)]
pub struct Variable {
    pub context: Context,
    pub name: String,
    pub role: VariableRole,
    pub declared_type: Option<ExprId>,
    pub initial_value: Option<ExprId>,
    pub is_external: bool,
    pub annotation: Annotation,
    /// Maintained by the resolver; read-mostly thereafter.
    pub num_reads: usize,
    pub num_writes: usize,
}

impl Variable {
    pub fn new(context: Context, name: impl Into<String>, role: VariableRole) -> Self {
        Variable {
            context,
            name: name.into(),
            role,
            declared_type: None,
            initial_value: None,
            is_external: false,
            annotation: Annotation::default(),
            num_reads: 0,
            num_writes: 0,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.role == VariableRole::Constant
    }
}

// ── Endpoints ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Value,
    Stream,
    Event,
}

impl EndpointKind {
    pub fn is_event(self) -> bool {
        self == EndpointKind::Event
    }

    pub fn is_stream(self) -> bool {
        self == EndpointKind::Stream
    }
}

/// A typed port of a processor or graph. Only event endpoints may declare
/// more than one data type.
#[derive(Debug)]
pub struct Endpoint {
    pub context: Context,
    pub name: String,
    pub is_input: bool,
    pub kind: EndpointKind,
    pub data_types: Vec<ExprId>,
    pub array_size: Option<ExprId>,
    pub annotation: Annotation,
}

impl Endpoint {
    pub fn new(
        context: Context,
        name: impl Into<String>,
        is_input: bool,
        kind: EndpointKind,
    ) -> Self {
        Endpoint {
            context,
            name: name.into(),
            is_input,
            kind,
            data_types: Vec::new(),
            array_size: None,
            annotation: Annotation::default(),
        }
    }
}

// ── Type declarations ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct StructMember {
    pub name: String,
    pub ty: ExprId,
}

/// A named record declaration. The concrete `Structure` layout is computed
/// on first query and cached.
#[derive(Debug)]
pub struct StructDecl {
    pub context: Context,
    pub name: String,
    pub members: Vec<StructMember>,
    layout: OnceCell<Rc<Structure>>,
    building_layout: Cell<bool>,
}

impl StructDecl {
    pub fn new(context: Context, name: impl Into<String>) -> Self {
        StructDecl {
            context,
            name: name.into(),
            members: Vec::new(),
            layout: OnceCell::new(),
            building_layout: Cell::new(false),
        }
    }

    pub fn add_member(&mut self, ty: ExprId, name: impl Into<String>) {
        debug_assert!(
            self.layout.get().is_none(),
            "internal: struct layout already built"
        );
        self.members.push(StructMember {
            name: name.into(),
            ty,
        });
    }
}

/// A `using` type alias.
#[derive(Debug)]
pub struct UsingDecl {
    pub context: Context,
    pub name: String,
    pub target: Option<ExprId>,
    resolving: Cell<bool>,
}

impl UsingDecl {
    pub fn new(context: Context, name: impl Into<String>, target: Option<ExprId>) -> Self {
        UsingDecl {
            context,
            name: name.into(),
            target,
            resolving: Cell::new(false),
        }
    }
}

// ── Graph contents ───────────────────────────────────────────────────────

/// A processor alias introduced by a graph specialisation parameter.
#[derive(Debug)]
pub struct ProcessorAlias {
    pub context: Context,
    pub name: String,
    pub target: Option<ModuleId>,
}

/// A named node of a graph, instantiating a processor or sub-graph.
#[derive(Debug)]
pub struct ProcessorInstance {
    pub context: Context,
    pub instance_name: IdentifierPath,
    /// A `QualifiedIdentifier` until resolution, then a `ProcessorRef`.
    pub target: Option<ExprId>,
    pub specialisation_args: Vec<ExprId>,
    pub array_size: Option<ExprId>,
}

/// One side of a connection. An empty processor name addresses the graph's
/// own endpoints.
#[derive(Debug, Clone)]
pub struct ConnectionEnd {
    pub processor_name: IdentifierPath,
    pub processor_index: Option<ExprId>,
    pub endpoint: String,
    pub endpoint_index: Option<ExprId>,
}

impl ConnectionEnd {
    pub fn new(processor_name: IdentifierPath, endpoint: impl Into<String>) -> Self {
        ConnectionEnd {
            processor_name,
            processor_index: None,
            endpoint: endpoint.into(),
            endpoint_index: None,
        }
    }
}

/// A directed edge between two endpoints, optionally through a delay line.
#[derive(Debug)]
pub struct Connection {
    pub context: Context,
    pub source: ConnectionEnd,
    pub dest: ConnectionEnd,
    pub delay_length: Option<ExprId>,
}

// ── Statements ───────────────────────────────────────────────────────────

/// A braced statement list. Introduces a naming region whose local
/// variables only become visible after their declaration.
#[derive(Debug)]
pub struct Block {
    pub context: Context,
    /// Set when this is a function's main block.
    pub function: Option<FunctionId>,
    /// The statement wrapping this block in the enclosing scope, used to
    /// keep declaration-order visibility across nested blocks.
    pub enclosing_stmt: Option<StmtId>,
    pub statements: Vec<StmtId>,
}

#[derive(Debug)]
pub enum StmtKind {
    Block(BlockId),
    If {
        condition: ExprId,
        true_branch: StmtId,
        false_branch: Option<StmtId>,
    },
    Loop {
        num_iterations: Option<ExprId>,
        condition: Option<ExprId>,
        iterator: Option<StmtId>,
        body: Option<StmtId>,
        is_do_loop: bool,
    },
    Break,
    Continue,
    Return(Option<ExprId>),
    Noop,
    VariableDeclaration(VariableId),
    Expr(ExprId),
}

#[derive(Debug)]
pub struct Stmt {
    pub context: Context,
    pub kind: StmtKind,
}

// ── Expressions ──────────────────────────────────────────────────────────

/// The resolution-state tag of an expression. `Unknown` means "not yet
/// resolved"; transitions out of it are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprClass {
    Value,
    Type,
    Endpoint,
    Processor,
    Unknown,
}

/// Constness as far as it can be known before full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constness {
    DefinitelyConst,
    NotConst,
    Unknown,
}

/// Compile-time type meta-functions, written `T.size`, `T.elementType`, ….
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMetaOp {
    MakeConst,
    MakeConstSilent,
    MakeReference,
    RemoveReference,
    ElementType,
    PrimitiveType,
    Size,
    IsStruct,
    IsArray,
    IsDynamicArray,
    IsFixedSizeArray,
    IsVector,
    IsPrimitive,
    IsFloat,
    IsFloat32,
    IsFloat64,
    IsInt,
    IsInt32,
    IsInt64,
    IsScalar,
    IsString,
    IsBool,
    IsReference,
    IsConst,
}

impl TypeMetaOp {
    /// Operations whose result is a type rather than a value.
    pub fn returns_a_type(self) -> bool {
        matches!(
            self,
            TypeMetaOp::MakeConst
                | TypeMetaOp::MakeConstSilent
                | TypeMetaOp::MakeReference
                | TypeMetaOp::RemoveReference
                | TypeMetaOp::ElementType
                | TypeMetaOp::PrimitiveType
        )
    }

    pub fn for_name(name: &str) -> Option<TypeMetaOp> {
        Some(match name {
            "elementType" => TypeMetaOp::ElementType,
            "primitiveType" => TypeMetaOp::PrimitiveType,
            "size" => TypeMetaOp::Size,
            "removeReference" => TypeMetaOp::RemoveReference,
            "isStruct" => TypeMetaOp::IsStruct,
            "isArray" => TypeMetaOp::IsArray,
            "isDynamicArray" => TypeMetaOp::IsDynamicArray,
            "isFixedSizeArray" => TypeMetaOp::IsFixedSizeArray,
            "isVector" => TypeMetaOp::IsVector,
            "isPrimitive" => TypeMetaOp::IsPrimitive,
            "isFloat" => TypeMetaOp::IsFloat,
            "isFloat32" => TypeMetaOp::IsFloat32,
            "isFloat64" => TypeMetaOp::IsFloat64,
            "isInt" => TypeMetaOp::IsInt,
            "isInt32" => TypeMetaOp::IsInt32,
            "isInt64" => TypeMetaOp::IsInt64,
            "isScalar" => TypeMetaOp::IsScalar,
            "isString" => TypeMetaOp::IsString,
            "isBool" => TypeMetaOp::IsBool,
            "isReference" => TypeMetaOp::IsReference,
            "isConst" => TypeMetaOp::IsConst,
            _ => return None,
        })
    }

    /// `size` only applies to fixed-size sequences and bounded ints.
    pub fn can_take_size_of(ty: &Type) -> bool {
        ty.is_fixed_size_array() || ty.is_vector() || ty.is_bounded_int()
    }

    /// Whether the operand type is acceptable for this operation.
    pub fn check_source_type(self, ty: &Type) -> bool {
        match self {
            TypeMetaOp::Size => TypeMetaOp::can_take_size_of(ty),
            TypeMetaOp::MakeConst => !ty.is_const(),
            TypeMetaOp::ElementType => ty.is_array_or_vector(),
            TypeMetaOp::PrimitiveType => !(ty.is_array() || ty.is_struct()),
            _ => true,
        }
    }

    /// Evaluate a value-producing operation against a source type.
    pub fn perform(self, ty: &Type) -> Option<Value> {
        if self == TypeMetaOp::Size {
            let size = ty
                .bounded_int_limit()
                .or_else(|| ty.array_or_vector_size().map(|s| s as i64))?;
            return Some(Value::from_i64(size));
        }

        let result = match self {
            TypeMetaOp::IsStruct => ty.is_struct(),
            TypeMetaOp::IsArray => ty.is_array(),
            TypeMetaOp::IsDynamicArray => ty.is_unsized_array(),
            TypeMetaOp::IsFixedSizeArray => ty.is_fixed_size_array(),
            TypeMetaOp::IsVector => ty.is_vector(),
            TypeMetaOp::IsPrimitive => ty.is_primitive(),
            TypeMetaOp::IsFloat => ty.is_floating_point(),
            TypeMetaOp::IsFloat32 => ty.is_float32(),
            TypeMetaOp::IsFloat64 => ty.is_float64(),
            TypeMetaOp::IsInt => ty.is_integer(),
            TypeMetaOp::IsInt32 => ty.is_integer32(),
            TypeMetaOp::IsInt64 => ty.is_integer64(),
            TypeMetaOp::IsScalar => ty.is_scalar(),
            TypeMetaOp::IsString => ty.is_string_literal(),
            TypeMetaOp::IsBool => ty.is_bool(),
            TypeMetaOp::IsReference => ty.is_reference(),
            TypeMetaOp::IsConst => ty.is_const(),
            _ => return None,
        };
        Some(Value::from_bool(result))
    }
}

/// Built-in per-processor constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorProperty {
    Frequency,
    Period,
    Id,
    Session,
}

impl ProcessorProperty {
    pub fn property_type(self) -> Type {
        match self {
            ProcessorProperty::Frequency | ProcessorProperty::Period => Type::float64(),
            ProcessorProperty::Id | ProcessorProperty::Session => Type::int32(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessorProperty::Frequency => "frequency",
            ProcessorProperty::Period => "period",
            ProcessorProperty::Id => "id",
            ProcessorProperty::Session => "session",
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    /// A literal constant carrying a Value.
    Constant(Value),
    /// A fully specified type.
    ConcreteType(Type),
    /// An unresolved name path.
    QualifiedIdentifier(IdentifierPath),
    /// `lhs.rhs`, unresolved.
    Dot { lhs: ExprId, rhs: IdentifierPath },
    /// `lhs[index]`, unresolved until the resolver decides between array
    /// types and element access.
    SubscriptBracket {
        lhs: ExprId,
        index: Option<ExprId>,
    },
    /// `lhs<size>`, the sized-type form.
    SubscriptChevron { lhs: ExprId, size: ExprId },
    /// A type meta-function applied to a single operand.
    TypeMeta { op: TypeMetaOp, source: ExprId },
    /// A resolved reference to a struct declaration, usable in type position.
    StructRef(StructId),
    /// A resolved reference to a using declaration.
    UsingRef(UsingId),
    Unary {
        op: UnaryOp,
        source: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        /// Operand/result types are cached on first query; recomputing them
        /// is quadratic in deeply nested expressions.
        cached_types: OnceCell<Option<BinaryOperatorTypes>>,
    },
    Ternary {
        condition: ExprId,
        true_branch: ExprId,
        false_branch: ExprId,
    },
    Assignment {
        target: ExprId,
        new_value: ExprId,
    },
    /// Pre/post increment or decrement.
    IncDec {
        target: ExprId,
        is_increment: bool,
        is_post: bool,
    },
    /// A call that may be a function call or a cast; ambiguous until
    /// resolution.
    CallOrCast {
        target: ExprId,
        arguments: Vec<ExprId>,
        is_method_call: bool,
    },
    /// A resolved call to a specific function.
    FunctionCall {
        function: FunctionId,
        arguments: Vec<ExprId>,
        is_method_call: bool,
    },
    TypeCast {
        target_type: Type,
        source: ExprId,
    },
    /// Array element access or slice.
    ArrayElement {
        object: ExprId,
        start_index: Option<ExprId>,
        end_index: Option<ExprId>,
        is_slice: bool,
    },
    StructMember {
        object: ExprId,
        structure: Rc<Structure>,
        member: String,
    },
    VariableRef(VariableId),
    /// Reads from an input endpoint; a value.
    InputEndpointRef(EndpointId),
    /// Names an output endpoint; only ever written to.
    OutputEndpointRef(EndpointId),
    ProcessorRef(ModuleId),
    CommaList(Vec<ExprId>),
    /// `output << value`.
    WriteToEndpoint { target: ExprId, value: ExprId },
    /// `advance`.
    AdvanceClock,
    ProcessorProperty(ProcessorProperty),
    StaticAssertion {
        condition: ExprId,
        message: Option<String>,
    },
}

impl ExprKind {
    /// The resolution-state tag a freshly built node starts with.
    pub fn default_class(&self) -> ExprClass {
        match self {
            ExprKind::Constant(_)
            | ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Ternary { .. }
            | ExprKind::Assignment { .. }
            | ExprKind::IncDec { .. }
            | ExprKind::CallOrCast { .. }
            | ExprKind::FunctionCall { .. }
            | ExprKind::TypeCast { .. }
            | ExprKind::ArrayElement { .. }
            | ExprKind::StructMember { .. }
            | ExprKind::VariableRef(_)
            | ExprKind::InputEndpointRef(_)
            | ExprKind::AdvanceClock
            | ExprKind::ProcessorProperty(_) => ExprClass::Value,

            ExprKind::ConcreteType(_) | ExprKind::StructRef(_) | ExprKind::UsingRef(_) => {
                ExprClass::Type
            }

            ExprKind::TypeMeta { op, .. } => {
                if op.returns_a_type() {
                    ExprClass::Type
                } else {
                    ExprClass::Value
                }
            }

            ExprKind::OutputEndpointRef(_) | ExprKind::WriteToEndpoint { .. } => {
                ExprClass::Endpoint
            }

            ExprKind::ProcessorRef(_) => ExprClass::Processor,

            ExprKind::QualifiedIdentifier(_)
            | ExprKind::Dot { .. }
            | ExprKind::SubscriptBracket { .. }
            | ExprKind::SubscriptChevron { .. }
            | ExprKind::CommaList(_)
            | ExprKind::StaticAssertion { .. } => ExprClass::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct Expr {
    pub context: Context,
    pub class: ExprClass,
    pub kind: ExprKind,
}

// ── Name search ──────────────────────────────────────────────────────────

/// One item surfaced by a name search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundItem {
    Variable(VariableId),
    Function(FunctionId),
    Struct(StructId),
    Using(UsingId),
    Endpoint(EndpointId),
    Module(ModuleId),
    ProcessorAlias(AliasId),
}

/// A name query with category filters. Results accumulate without
/// duplicates; the caller resolves ambiguity.
#[derive(Debug)]
pub struct NameSearch {
    pub path: IdentifierPath,
    pub items_found: Vec<FoundItem>,
    pub stop_at_first_scope_with_results: bool,
    pub required_num_function_args: Option<usize>,
    pub find_variables: bool,
    pub find_types: bool,
    pub find_functions: bool,
    pub find_endpoints: bool,
    pub find_processors_and_namespaces: bool,
    pub only_find_local_variables: bool,
}

impl NameSearch {
    pub fn new(path: IdentifierPath) -> Self {
        NameSearch {
            path,
            items_found: Vec::new(),
            stop_at_first_scope_with_results: false,
            required_num_function_args: None,
            find_variables: true,
            find_types: true,
            find_functions: true,
            find_endpoints: true,
            find_processors_and_namespaces: true,
            only_find_local_variables: false,
        }
    }

    fn add_result(&mut self, item: FoundItem) {
        if !self.items_found.contains(&item) {
            self.items_found.push(item);
        }
    }
}

// ── The arena ────────────────────────────────────────────────────────────

/// A compilation unit's AST. All nodes live here until the unit is dropped;
/// inter-node links are typed indices.
#[derive(Debug, Default)]
pub struct Ast {
    modules: Vec<Module>,
    functions: Vec<Function>,
    variables: Vec<Variable>,
    endpoints: Vec<Endpoint>,
    structs: Vec<StructDecl>,
    usings: Vec<UsingDecl>,
    aliases: Vec<ProcessorAlias>,
    instances: Vec<ProcessorInstance>,
    connections: Vec<Connection>,
    blocks: Vec<Block>,
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
    pub strings: StringDictionary,
    pub constants: ConstantTable,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Allocation ──────────────────────────────────────────────────────

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        ModuleId((self.modules.len() - 1) as u32)
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId((self.functions.len() - 1) as u32)
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        self.variables.push(variable);
        VariableId((self.variables.len() - 1) as u32)
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> EndpointId {
        self.endpoints.push(endpoint);
        EndpointId((self.endpoints.len() - 1) as u32)
    }

    pub fn add_struct(&mut self, decl: StructDecl) -> StructId {
        self.structs.push(decl);
        StructId((self.structs.len() - 1) as u32)
    }

    pub fn add_using(&mut self, decl: UsingDecl) -> UsingId {
        self.usings.push(decl);
        UsingId((self.usings.len() - 1) as u32)
    }

    pub fn add_alias(&mut self, alias: ProcessorAlias) -> AliasId {
        self.aliases.push(alias);
        AliasId((self.aliases.len() - 1) as u32)
    }

    pub fn add_instance(&mut self, instance: ProcessorInstance) -> InstanceId {
        self.instances.push(instance);
        InstanceId((self.instances.len() - 1) as u32)
    }

    pub fn add_connection(&mut self, connection: Connection) -> ConnectionId {
        self.connections.push(connection);
        ConnectionId((self.connections.len() - 1) as u32)
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        BlockId((self.blocks.len() - 1) as u32)
    }

    pub fn add_stmt(&mut self, context: Context, kind: StmtKind) -> StmtId {
        self.stmts.push(Stmt { context, kind });
        StmtId((self.stmts.len() - 1) as u32)
    }

    pub fn add_expr(&mut self, context: Context, kind: ExprKind) -> ExprId {
        let class = kind.default_class();
        self.exprs.push(Expr {
            context,
            class,
            kind,
        });
        ExprId((self.exprs.len() - 1) as u32)
    }

    /// Rewrite an expression node wholesale, as the resolver does when it
    /// replaces a `CallOrCast` or `QualifiedIdentifier` with its resolved
    /// form. The resolution state is recomputed from the new kind.
    pub fn replace_expr(&mut self, id: ExprId, kind: ExprKind) {
        let class = kind.default_class();
        let node = &mut self.exprs[id.0 as usize];
        node.kind = kind;
        node.class = class;
    }

    /// Promote an expression's resolution state. Transitions are monotonic:
    /// a resolved class never regresses to Unknown.
    pub fn set_expr_class(&mut self, id: ExprId, class: ExprClass) {
        debug_assert!(
            class != ExprClass::Unknown || self.exprs[id.0 as usize].class == ExprClass::Unknown,
            "internal: resolution state must not regress"
        );
        self.exprs[id.0 as usize].class = class;
    }

    // ── Node access ─────────────────────────────────────────────────────

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0 as usize]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.0 as usize]
    }

    pub fn endpoint(&self, id: EndpointId) -> &Endpoint {
        &self.endpoints[id.0 as usize]
    }

    pub fn endpoint_mut(&mut self, id: EndpointId) -> &mut Endpoint {
        &mut self.endpoints[id.0 as usize]
    }

    pub fn struct_decl(&self, id: StructId) -> &StructDecl {
        &self.structs[id.0 as usize]
    }

    pub fn struct_decl_mut(&mut self, id: StructId) -> &mut StructDecl {
        &mut self.structs[id.0 as usize]
    }

    pub fn using_decl(&self, id: UsingId) -> &UsingDecl {
        &self.usings[id.0 as usize]
    }

    pub fn using_decl_mut(&mut self, id: UsingId) -> &mut UsingDecl {
        &mut self.usings[id.0 as usize]
    }

    pub fn alias(&self, id: AliasId) -> &ProcessorAlias {
        &self.aliases[id.0 as usize]
    }

    pub fn instance(&self, id: InstanceId) -> &ProcessorInstance {
        &self.instances[id.0 as usize]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut ProcessorInstance {
        &mut self.instances[id.0 as usize]
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0 as usize]
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> &mut Connection {
        &mut self.connections[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    // ── Scope navigation ────────────────────────────────────────────────

    pub fn scope_context(&self, scope: ScopeRef) -> &Context {
        match scope {
            ScopeRef::Module(m) => &self.module(m).context,
            ScopeRef::Function(f) => &self.function(f).context,
            ScopeRef::Block(b) => &self.block(b).context,
        }
    }

    pub fn parent_scope(&self, scope: ScopeRef) -> Option<ScopeRef> {
        self.scope_context(scope).scope
    }

    /// The nearest enclosing module of a scope.
    pub fn enclosing_module(&self, mut scope: ScopeRef) -> Option<ModuleId> {
        loop {
            if let ScopeRef::Module(m) = scope {
                return Some(m);
            }
            scope = self.parent_scope(scope)?;
        }
    }

    /// The function a scope is nested inside, if any.
    pub fn enclosing_function(&self, mut scope: ScopeRef) -> Option<FunctionId> {
        loop {
            match scope {
                ScopeRef::Function(f) => return Some(f),
                ScopeRef::Block(b) => {
                    if let Some(f) = self.block(b).function {
                        return Some(f);
                    }
                }
                ScopeRef::Module(_) => return None,
            }
            scope = self.parent_scope(scope)?;
        }
    }

    pub fn fully_qualified_module_path(&self, id: ModuleId) -> IdentifierPath {
        let mut parts = vec![self.module(id).name.clone()];
        let mut scope = self.module(id).context.scope;
        while let Some(s) = scope {
            if let ScopeRef::Module(m) = s {
                parts.push(self.module(m).name.clone());
            }
            scope = self.parent_scope(s);
        }
        parts.reverse();
        IdentifierPath::from_parts(parts)
    }

    // ── Name search ─────────────────────────────────────────────────────

    fn find_sub_module_named(&self, module: ModuleId, name: &str) -> Option<ModuleId> {
        self.module(module)
            .sub_modules
            .iter()
            .copied()
            .find(|&m| self.module(m).name == name)
    }

    /// Follow a qualified prefix down through sub-modules.
    fn find_child_scope(&self, scope: ScopeRef, path: &IdentifierPath) -> Option<ModuleId> {
        let mut current = match scope {
            ScopeRef::Module(m) => m,
            _ => return None,
        };
        for part in &path.parts {
            current = self.find_sub_module_named(current, part)?;
        }
        Some(current)
    }

    /// Examine only the direct declarations of one scope.
    pub fn perform_local_name_search(
        &self,
        scope: ScopeRef,
        search: &mut NameSearch,
        up_to: Option<StmtId>,
    ) {
        let target = search.path.last_part().to_string();

        match scope {
            ScopeRef::Module(m) => {
                let module = self.module(m);

                if search.find_variables {
                    if let Some(&v) = module
                        .state_variables
                        .iter()
                        .find(|&&v| self.variable(v).name == target)
                    {
                        search.add_result(FoundItem::Variable(v));
                    }
                }

                if search.find_types {
                    if let Some(&s) = module
                        .structs
                        .iter()
                        .find(|&&s| self.struct_decl(s).name == target)
                    {
                        search.add_result(FoundItem::Struct(s));
                    }
                    if let Some(&u) = module
                        .usings
                        .iter()
                        .find(|&&u| self.using_decl(u).name == target)
                    {
                        search.add_result(FoundItem::Using(u));
                    }
                }

                if search.find_functions {
                    for &f in &module.functions {
                        let function = self.function(f);
                        if function.name == target
                            && search
                                .required_num_function_args
                                .map_or(true, |n| function.parameters.len() == n)
                        {
                            search.add_result(FoundItem::Function(f));
                        }
                    }
                }

                if search.find_endpoints {
                    if let Some(&e) = module
                        .endpoints
                        .iter()
                        .find(|&&e| self.endpoint(e).name == target)
                    {
                        search.add_result(FoundItem::Endpoint(e));
                    }
                }

                if search.find_processors_and_namespaces {
                    if let Some(&s) = module
                        .sub_modules
                        .iter()
                        .find(|&&s| self.module(s).name == target)
                    {
                        search.add_result(FoundItem::Module(s));
                    }
                    if let Some(&a) = module
                        .processor_aliases
                        .iter()
                        .find(|&&a| self.alias(a).name == target)
                    {
                        search.add_result(FoundItem::ProcessorAlias(a));
                    }
                }
            }

            ScopeRef::Function(f) => {
                if search.find_variables {
                    if let Some(&p) = self
                        .function(f)
                        .parameters
                        .iter()
                        .find(|&&p| self.variable(p).name == target)
                    {
                        search.add_result(FoundItem::Variable(p));
                    }
                }
            }

            ScopeRef::Block(b) => {
                if search.find_variables {
                    let mut last_match = None;
                    for &s in &self.block(b).statements {
                        if Some(s) == up_to {
                            break;
                        }
                        if let StmtKind::VariableDeclaration(v) = self.stmt(s).kind {
                            if self.variable(v).name == target {
                                last_match = Some(v);
                            }
                        }
                    }
                    if let Some(v) = last_match {
                        search.add_result(FoundItem::Variable(v));
                    }
                }
            }
        }
    }

    /// Walk from a scope toward the root, running the local search at each
    /// level. `up_to` restricts block searches to statements strictly before
    /// the cursor, giving local variables declaration-order visibility.
    pub fn perform_full_name_search(
        &self,
        scope: ScopeRef,
        search: &mut NameSearch,
        up_to: Option<StmtId>,
    ) {
        debug_assert!(!search.path.is_empty());
        let parent_path = search.path.parent();

        let mut current = Some(scope);
        let mut cursor = up_to;

        while let Some(s) = current {
            if search.only_find_local_variables && !matches!(s, ScopeRef::Block(_)) {
                break;
            }

            if parent_path.is_empty() {
                self.perform_local_name_search(s, search, cursor);
            } else if let Some(child) = self.find_child_scope(s, &parent_path) {
                self.perform_local_name_search(ScopeRef::Module(child), search, None);
            }

            if search.stop_at_first_scope_with_results && !search.items_found.is_empty() {
                break;
            }

            cursor = match s {
                ScopeRef::Block(b) => self.block(b).enclosing_stmt,
                _ => None,
            };
            current = self.parent_scope(s);
        }
    }

    /// Sub-modules matching a partially qualified name, searched from a
    /// scope outward.
    pub fn find_matching_sub_modules(
        &self,
        scope: ScopeRef,
        path: &IdentifierPath,
    ) -> Vec<ModuleId> {
        let mut search = NameSearch::new(path.clone());
        search.find_variables = false;
        search.find_types = false;
        search.find_functions = false;
        search.find_endpoints = false;

        self.perform_full_name_search(scope, &mut search, None);

        search
            .items_found
            .iter()
            .filter_map(|item| match item {
                FoundItem::Module(m) => Some(*m),
                FoundItem::ProcessorAlias(a) => self.alias(*a).target,
                _ => None,
            })
            .collect()
    }

    // ── Variables ───────────────────────────────────────────────────────

    pub fn variable_is_resolved(&self, id: VariableId) -> bool {
        let v = self.variable(id);
        match v.declared_type {
            Some(t) => {
                self.is_resolved_as_type(t)
                    && v.initial_value.map_or(true, |i| self.is_resolved_as_value(i))
            }
            None => v
                .initial_value
                .is_some_and(|i| self.is_resolved_as_value(i)),
        }
    }

    /// The deduced type of a variable: its declared type, or its
    /// initialiser's type with the constness adjusted to the declaration.
    pub fn variable_type(&self, id: VariableId) -> Option<Type> {
        let v = self.variable(id);

        if let Some(declared) = v.declared_type {
            return self.resolve_as_type(declared);
        }

        let t = self.result_type(v.initial_value?)?;
        if v.is_constant() != t.is_const() {
            return Some(if v.is_constant() {
                t.with_const()
            } else {
                t.without_const()
            });
        }
        Some(t)
    }

    pub fn variable_is_assignable(&self, id: VariableId) -> bool {
        let v = self.variable(id);
        if v.is_constant() {
            return false;
        }
        match v.declared_type {
            None => true,
            Some(t) => !self.resolve_as_type(t).is_some_and(|ty| ty.is_const()),
        }
    }

    pub fn variable_is_compile_time_constant(&self, id: VariableId) -> bool {
        let v = self.variable(id);
        v.is_constant()
            && v.initial_value
                .map_or(true, |i| self.is_compile_time_constant(i))
    }

    // ── Functions ───────────────────────────────────────────────────────

    /// Canonical signature: name, arity, and parameter type shapes with
    /// const/reference stripped. Two non-generic functions in one scope may
    /// not share it.
    pub fn function_signature_id(&self, id: FunctionId) -> String {
        let f = self.function(id);
        let mut sig = format!("{}_{}", f.name, f.parameters.len());

        for &p in &f.parameters {
            let part = match self.variable_type(p) {
                Some(t) => t
                    .with_const_and_ref_flags(false, false)
                    .short_identifier_description(),
                None => "unresolved".to_string(),
            };
            sig.push('_');
            sig.push_str(&part);
        }
        sig
    }

    /// Human-readable call signature used in diagnostics.
    pub fn function_description(&self, id: FunctionId) -> String {
        let f = self.function(id);
        let params: Vec<String> = f
            .parameters
            .iter()
            .map(|&p| {
                self.variable_type(p)
                    .map(|t| t.description())
                    .unwrap_or_else(|| "?".to_string())
            })
            .collect();
        format!("{} ({})", f.name, params.join(", "))
    }

    // ── Endpoints ───────────────────────────────────────────────────────

    pub fn endpoint_is_resolved(&self, id: EndpointId) -> bool {
        let e = self.endpoint(id);
        e.data_types.iter().all(|&t| self.is_resolved_as_type(t))
            && e.array_size
                .map_or(true, |s| self.as_constant(s).is_some())
    }

    /// The declared data types, resolved. Unresolved entries are skipped.
    pub fn endpoint_resolved_data_types(&self, id: EndpointId) -> Vec<Type> {
        self.endpoint(id)
            .data_types
            .iter()
            .filter_map(|&t| self.resolve_as_type(t))
            .collect()
    }

    pub fn endpoint_array_size_value(&self, id: EndpointId) -> Option<i64> {
        let size = self.endpoint(id).array_size?;
        self.as_constant(size)?.get_as_i64()
    }

    /// Data types combined with the endpoint's array size, the shapes a
    /// write must match.
    pub fn endpoint_sample_array_types(&self, id: EndpointId) -> Vec<Type> {
        let size = self.endpoint_array_size_value(id).unwrap_or(0);
        self.endpoint_resolved_data_types(id)
            .into_iter()
            .map(|t| if size == 0 { t } else { t.array_of(size as u32) })
            .collect()
    }

    pub fn endpoint_supports_data_type(&self, id: EndpointId, expr: ExprId) -> bool {
        self.endpoint_sample_array_types(id)
            .iter()
            .any(|t| self.can_silently_cast_to(expr, t))
    }

    fn input_endpoint_result_type(&self, id: EndpointId) -> Option<Type> {
        let e = self.endpoint(id);
        if e.kind.is_event() {
            return None;
        }
        self.endpoint_sample_array_types(id).into_iter().next()
    }

    // ── Structs ─────────────────────────────────────────────────────────

    /// The concrete layout of a struct declaration, computed on first query
    /// and cached. Returns None while member types are unresolved, and for
    /// re-entrant queries (a self-referential struct cannot have a layout).
    pub fn struct_layout(&self, id: StructId) -> Option<Rc<Structure>> {
        let decl = self.struct_decl(id);

        if let Some(s) = decl.layout.get() {
            return Some(s.clone());
        }

        if decl.building_layout.get() {
            return None;
        }
        decl.building_layout.set(true);

        let mut structure = Structure::new(decl.name.clone());
        let mut complete = true;

        for member in &decl.members {
            match self.resolve_as_type(member.ty) {
                Some(t) => structure.add_member(t, member.name.clone()),
                None => {
                    complete = false;
                    break;
                }
            }
        }

        decl.building_layout.set(false);

        if !complete {
            return None;
        }

        let rc = Rc::new(structure);
        let _ = decl.layout.set(rc.clone());
        Some(rc)
    }

    // ── Expression state ────────────────────────────────────────────────

    pub fn is_resolved(&self, id: ExprId) -> bool {
        let e = self.expr(id);

        // An expression whose meaning is still unknown is never resolved.
        if e.class == ExprClass::Unknown {
            return false;
        }

        match &e.kind {
            ExprKind::Constant(_)
            | ExprKind::ConcreteType(_)
            | ExprKind::AdvanceClock
            | ExprKind::ProcessorProperty(_)
            | ExprKind::ProcessorRef(_) => true,

            ExprKind::QualifiedIdentifier(_)
            | ExprKind::Dot { .. }
            | ExprKind::SubscriptBracket { .. }
            | ExprKind::SubscriptChevron { .. }
            | ExprKind::CallOrCast { .. } => false,

            // Resolvedness of a type declaration reference means "a concrete
            // type can be produced". Both paths are re-entrancy guarded, so
            // a self-referential declaration reads as unresolved instead of
            // recursing forever.
            ExprKind::StructRef(_) | ExprKind::UsingRef(_) => self.resolve_as_type(id).is_some(),

            ExprKind::TypeMeta { op, source } => {
                if self.is_resolved_as_value(*source) {
                    self.result_type(*source)
                        .is_some_and(|t| op.check_source_type(&t))
                } else if self.is_resolved_as_type(*source) {
                    self.resolve_as_type(*source)
                        .is_some_and(|t| op.check_source_type(&t))
                } else {
                    false
                }
            }

            ExprKind::Unary { source, .. } => self.is_resolved(*source),

            ExprKind::Binary { lhs, rhs, .. } => {
                self.is_resolved_as_value(*lhs) && self.is_resolved_as_value(*rhs)
            }

            ExprKind::Ternary {
                condition,
                true_branch,
                false_branch,
            } => {
                self.is_resolved(*condition)
                    && self.is_resolved(*true_branch)
                    && self.is_resolved(*false_branch)
            }

            ExprKind::Assignment { target, new_value } => {
                self.is_resolved(*target) && self.is_resolved(*new_value)
            }

            ExprKind::IncDec { target, .. } => self.is_resolved(*target),

            ExprKind::FunctionCall {
                function,
                arguments,
                ..
            } => {
                arguments.iter().all(|&a| self.is_resolved(a))
                    && self
                        .function(*function)
                        .return_type
                        .map_or(true, |rt| self.is_resolved(rt))
            }

            ExprKind::TypeCast { source, .. } => self.is_resolved(*source),

            ExprKind::ArrayElement {
                object,
                start_index,
                is_slice,
                ..
            } => {
                if *is_slice {
                    self.slice_range(id).is_some()
                } else {
                    self.is_resolved_as_value(*object)
                        && start_index.is_some_and(|s| self.is_resolved_as_value(s))
                }
            }

            ExprKind::StructMember { object, .. } => self.is_resolved(*object),

            ExprKind::VariableRef(v) => self.variable_is_resolved(*v),

            ExprKind::InputEndpointRef(e) | ExprKind::OutputEndpointRef(e) => {
                self.endpoint_is_resolved(*e)
            }

            ExprKind::CommaList(items) => items.iter().all(|&i| self.is_resolved(i)),

            ExprKind::WriteToEndpoint { value, .. } => self.is_resolved(*value),

            ExprKind::StaticAssertion { condition, .. } => self.is_resolved(*condition),
        }
    }

    pub fn is_resolved_as_value(&self, id: ExprId) -> bool {
        self.expr(id).class == ExprClass::Value && self.is_resolved(id)
    }

    pub fn is_resolved_as_type(&self, id: ExprId) -> bool {
        self.expr(id).class == ExprClass::Type && self.is_resolved(id)
    }

    pub fn is_resolved_as_processor(&self, id: ExprId) -> bool {
        self.expr(id).class == ExprClass::Processor && self.is_resolved(id)
    }

    pub fn is_resolved_as_endpoint(&self, id: ExprId) -> bool {
        self.is_resolved(id) && self.is_output_endpoint(id)
    }

    // ── Expression queries ──────────────────────────────────────────────

    /// The concrete result type of a value-position expression.
    pub fn result_type(&self, id: ExprId) -> Option<Type> {
        match &self.expr(id).kind {
            ExprKind::Constant(v) => Some(v.ty().clone()),

            ExprKind::Unary { op, source } => match op {
                UnaryOp::LogicalNot => Some(Type::bool_type()),
                UnaryOp::BitwiseNot => Some(Type::int32()),
                UnaryOp::Negate => self.result_type(*source),
            },

            ExprKind::Binary { .. } => self.binary_operator_types(id).map(|t| t.result_type),

            ExprKind::Ternary { true_branch, .. } => self.result_type(*true_branch),

            ExprKind::Assignment { target, .. } => self.result_type(*target),

            ExprKind::IncDec { target, .. } => self.result_type(*target),

            ExprKind::FunctionCall { function, .. } => {
                self.resolve_as_type(self.function(*function).return_type?)
            }

            ExprKind::TypeCast { target_type, .. } => Some(target_type.clone()),

            ExprKind::ArrayElement { .. } => self.array_element_result_type(id),

            ExprKind::StructMember {
                structure, member, ..
            } => structure.member_with_name(member).map(|m| m.ty.clone()),

            ExprKind::VariableRef(v) => self.variable_type(*v),

            ExprKind::InputEndpointRef(e) => self.input_endpoint_result_type(*e),

            ExprKind::WriteToEndpoint { target, .. } => self.result_type(*target),

            ExprKind::AdvanceClock | ExprKind::StaticAssertion { .. } => Some(Type::void()),

            ExprKind::ProcessorProperty(p) => Some(p.property_type()),

            ExprKind::TypeMeta { op, source } => {
                if op.returns_a_type() {
                    return None;
                }
                self.type_meta_source_type(*source)?;
                if *op == TypeMetaOp::Size {
                    Some(Type::int64())
                } else {
                    Some(Type::bool_type())
                }
            }

            _ => None,
        }
    }

    fn array_element_result_type(&self, id: ExprId) -> Option<Type> {
        let ExprKind::ArrayElement {
            object, is_slice, ..
        } = &self.expr(id).kind
        else {
            return None;
        };

        let sequence = self.result_type(*object)?;
        if !sequence.is_array_or_vector() {
            return None;
        }
        let element = sequence.element_type()?;

        if *is_slice {
            let (start, end) = self.slice_range(id)?;
            let size = end - start;
            if size > 1 {
                return Some(sequence.with_new_array_size(size as u32));
            }
        }

        Some(element)
    }

    /// Constant-fold the slice bounds of an `ArrayElement` slice. `None`
    /// until the object and both bounds resolve to constants in range.
    pub fn slice_range(&self, id: ExprId) -> Option<(u64, u64)> {
        let ExprKind::ArrayElement {
            object,
            start_index,
            end_index,
            is_slice,
        } = &self.expr(id).kind
        else {
            return None;
        };

        if !is_slice || !self.is_resolved_as_value(*object) {
            return None;
        }

        let ty = self.result_type(*object)?;
        if !ty.is_array_or_vector() {
            return None;
        }

        let start = match start_index {
            Some(s) => self.as_constant(*s)?.get_as_i64()?,
            None => 0,
        };
        let end = match end_index {
            Some(e) => self.as_constant(*e)?.get_as_i64()?,
            None => ty.array_or_vector_size()? as i64,
        };

        if !ty.is_valid_array_or_vector_range(start, end) {
            return None;
        }

        Some((
            ty.convert_index_to_valid_range(start) as u64,
            ty.convert_index_to_valid_range(end) as u64,
        ))
    }

    fn type_meta_source_type(&self, source: ExprId) -> Option<Type> {
        if self.is_resolved_as_type(source) {
            self.resolve_as_type(source)
        } else if self.is_resolved_as_value(source) {
            self.result_type(source)
        } else {
            None
        }
    }

    /// Resolve a type-position expression to a concrete type.
    pub fn resolve_as_type(&self, id: ExprId) -> Option<Type> {
        match &self.expr(id).kind {
            ExprKind::ConcreteType(t) => Some(t.clone()),

            ExprKind::StructRef(s) => self.struct_layout(*s).map(Type::structure),

            ExprKind::UsingRef(u) => {
                let decl = self.using_decl(*u);
                if decl.resolving.get() {
                    return None; // self-referential alias
                }
                decl.resolving.set(true);
                let result = decl.target.and_then(|t| self.resolve_as_type(t));
                self.using_decl(*u).resolving.set(false);
                result
            }

            ExprKind::TypeMeta { op, source } if op.returns_a_type() => {
                let ty = self.type_meta_source_type(*source)?;
                match op {
                    TypeMetaOp::MakeConst | TypeMetaOp::MakeConstSilent => Some(ty.with_const()),
                    TypeMetaOp::MakeReference => Some(if ty.is_reference() {
                        ty
                    } else {
                        ty.with_reference()
                    }),
                    TypeMetaOp::RemoveReference => Some(ty.without_reference()),
                    TypeMetaOp::ElementType => ty.element_type(),
                    TypeMetaOp::PrimitiveType => ty.primitive_type().map(Type::primitive),
                    _ => None,
                }
            }

            _ => None,
        }
    }

    /// The constant value of an expression, if it has one.
    pub fn as_constant(&self, id: ExprId) -> Option<Value> {
        match &self.expr(id).kind {
            ExprKind::Constant(v) => Some(v.clone()),

            ExprKind::VariableRef(v) => {
                if self.variable_is_compile_time_constant(*v) {
                    self.as_constant(self.variable(*v).initial_value?)
                } else {
                    None
                }
            }

            ExprKind::TypeMeta { op, source } if !op.returns_a_type() => {
                // The size of an unsized array stays deferred.
                if self.is_size_of_unsized_type(id) {
                    return None;
                }
                let ty = self.type_meta_source_type(*source)?;
                if op.check_source_type(&ty) {
                    op.perform(&ty)
                } else {
                    None
                }
            }

            _ => None,
        }
    }

    pub fn is_compile_time_constant(&self, id: ExprId) -> bool {
        match &self.expr(id).kind {
            ExprKind::Constant(_)
            | ExprKind::ConcreteType(_)
            | ExprKind::ProcessorRef(_)
            | ExprKind::ProcessorProperty(_) => true,

            ExprKind::VariableRef(v) => self.variable_is_compile_time_constant(*v),

            ExprKind::Unary { source, .. } => self.is_compile_time_constant(*source),

            ExprKind::Binary { lhs, rhs, .. } => {
                self.is_compile_time_constant(*lhs) && self.is_compile_time_constant(*rhs)
            }

            ExprKind::Ternary {
                condition,
                true_branch,
                false_branch,
            } => {
                self.is_compile_time_constant(*condition)
                    && self.is_compile_time_constant(*true_branch)
                    && self.is_compile_time_constant(*false_branch)
            }

            ExprKind::TypeCast { source, .. } => self.is_compile_time_constant(*source),

            ExprKind::CommaList(items) => {
                items.iter().all(|&i| self.is_compile_time_constant(i))
            }

            ExprKind::TypeMeta { .. } => self.as_constant(id).is_some(),

            _ => false,
        }
    }

    pub fn is_assignable(&self, id: ExprId) -> bool {
        match &self.expr(id).kind {
            ExprKind::VariableRef(v) => self.variable_is_assignable(*v),
            ExprKind::ArrayElement { object, .. } => self.is_assignable(*object),
            ExprKind::StructMember { object, .. } => self.is_assignable(*object),
            _ => false,
        }
    }

    /// Whether this expression names (or writes to) an output endpoint.
    pub fn is_output_endpoint(&self, id: ExprId) -> bool {
        match &self.expr(id).kind {
            ExprKind::OutputEndpointRef(_) | ExprKind::WriteToEndpoint { .. } => true,
            ExprKind::Binary { op, lhs, .. } => {
                *op == BinaryOp::LeftShift && self.is_output_endpoint(*lhs)
            }
            ExprKind::ArrayElement { object, .. } => self.is_output_endpoint(*object),
            _ => false,
        }
    }

    pub fn constness(&self, id: ExprId) -> Constness {
        match &self.expr(id).kind {
            ExprKind::ConcreteType(t) => {
                if t.is_const() {
                    Constness::DefinitelyConst
                } else {
                    Constness::NotConst
                }
            }
            ExprKind::StructRef(_) => Constness::NotConst,
            ExprKind::UsingRef(_) => match self.resolve_as_type(id) {
                Some(t) => {
                    if t.is_const() {
                        Constness::DefinitelyConst
                    } else {
                        Constness::NotConst
                    }
                }
                None => Constness::Unknown,
            },
            ExprKind::TypeMeta { op, source } => {
                if matches!(op, TypeMetaOp::MakeConst | TypeMetaOp::MakeConstSilent) {
                    Constness::DefinitelyConst
                } else {
                    self.constness(*source)
                }
            }
            ExprKind::SubscriptBracket { lhs, .. } => self.constness(*lhs),
            ExprKind::TypeCast {
                target_type,
                source,
            } => {
                if target_type.is_const() {
                    Constness::DefinitelyConst
                } else {
                    self.constness(*source)
                }
            }
            ExprKind::Unary { source, .. } => self.constness(*source),
            ExprKind::Binary { lhs, rhs, .. } => {
                let a = self.constness(*lhs);
                let b = self.constness(*rhs);
                if a == b {
                    a
                } else {
                    Constness::Unknown
                }
            }
            ExprKind::ProcessorProperty(_) => Constness::DefinitelyConst,
            _ => Constness::Unknown,
        }
    }

    /// Whether the expression may be implicitly coerced to the target type.
    /// Constants get the value-aware relaxation.
    pub fn can_silently_cast_to(&self, id: ExprId, target: &Type) -> bool {
        if let ExprKind::Constant(v) = &self.expr(id).kind {
            return type_rules::can_silently_cast_value(target, v);
        }

        if self.is_output_endpoint(id) {
            return false;
        }

        match self.result_type(id) {
            Some(t) => type_rules::can_silently_cast(target, &t),
            None => false,
        }
    }

    /// Operand/result types of a binary operator node, cached on the node.
    pub fn binary_operator_types(&self, id: ExprId) -> Option<BinaryOperatorTypes> {
        let ExprKind::Binary {
            op,
            lhs,
            rhs,
            cached_types,
        } = &self.expr(id).kind
        else {
            return None;
        };

        if let Some(cached) = cached_types.get() {
            return cached.clone();
        }

        let computed = match (self.result_type(*lhs), self.result_type(*rhs)) {
            (Some(a), Some(b)) => op.get_types(&a, &b),
            _ => return None, // not resolved yet; don't cache
        };

        let _ = cached_types.set(computed.clone());
        computed
    }

    /// True for a `size` meta-function applied to an unsized array: the
    /// result exists but must be computed later.
    pub fn is_size_of_unsized_type(&self, id: ExprId) -> bool {
        if let ExprKind::TypeMeta {
            op: TypeMetaOp::Size,
            source,
        } = &self.expr(id).kind
        {
            return self
                .type_meta_source_type(*source)
                .is_some_and(|t| t.is_unsized_array());
        }
        false
    }

    // ── Iteration helpers ───────────────────────────────────────────────

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(|i| ModuleId(i as u32))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    fn loc() -> CodeLocation {
        CodeLocation::none()
    }

    fn root_context() -> Context {
        Context::new(loc(), None)
    }

    fn new_namespace(ast: &mut Ast, name: &str) -> ModuleId {
        ast.add_module(Module::new(root_context(), ModuleKind::Namespace, name))
    }

    #[test]
    fn expression_default_classes() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let constant = ast.add_expr(c, ExprKind::Constant(Value::from_i32(1)));
        assert_eq!(ast.expr(constant).class, ExprClass::Value);
        assert!(ast.is_resolved(constant));

        let ident = ast.add_expr(
            c,
            ExprKind::QualifiedIdentifier(IdentifierPath::from_name("x")),
        );
        assert_eq!(ast.expr(ident).class, ExprClass::Unknown);
        assert!(!ast.is_resolved(ident));

        let ty = ast.add_expr(c, ExprKind::ConcreteType(Type::float32()));
        assert!(ast.is_resolved_as_type(ty));
        assert_eq!(ast.resolve_as_type(ty), Some(Type::float32()));
    }

    #[test]
    fn replace_expr_rewrites_resolution_state() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let e = ast.add_expr(
            c,
            ExprKind::QualifiedIdentifier(IdentifierPath::from_name("pi")),
        );
        assert!(!ast.is_resolved(e));

        ast.replace_expr(e, ExprKind::Constant(Value::from_f64(3.14)));
        assert!(ast.is_resolved_as_value(e));
        assert_eq!(ast.as_constant(e).unwrap().get_as_f64(), Some(3.14));
    }

    #[test]
    fn binary_operator_types_are_cached() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let lhs = ast.add_expr(c, ExprKind::Constant(Value::from_i32(1)));
        let rhs = ast.add_expr(c, ExprKind::Constant(Value::from_i64(2)));
        let sum = ast.add_expr(
            c,
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
                cached_types: OnceCell::new(),
            },
        );

        assert_eq!(ast.result_type(sum), Some(Type::int64()));
        // Second query hits the cache and agrees.
        assert_eq!(ast.result_type(sum), Some(Type::int64()));
        assert!(ast.is_resolved_as_value(sum));
    }

    #[test]
    fn write_to_endpoint_is_an_output() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let c = Context::new(loc(), Some(ScopeRef::Module(m)));

        let mut out = Endpoint::new(c, "out", false, EndpointKind::Stream);
        let f32_ty = ast.add_expr(c, ExprKind::ConcreteType(Type::float32()));
        out.data_types.push(f32_ty);
        let out = ast.add_endpoint(out);

        let target = ast.add_expr(c, ExprKind::OutputEndpointRef(out));
        let value = ast.add_expr(c, ExprKind::Constant(Value::from_f32(0.0)));
        let write = ast.add_expr(c, ExprKind::WriteToEndpoint { target, value });

        assert!(ast.is_output_endpoint(target));
        assert!(ast.is_output_endpoint(write));
        assert!(ast.is_resolved_as_endpoint(write));
        assert!(!ast.can_silently_cast_to(target, &Type::float32()));
    }

    #[test]
    fn variable_type_adjusts_constness() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let init = ast.add_expr(c, ExprKind::Constant(Value::from_i32(5)));
        let mut v = Variable::new(c, "x", VariableRole::Constant);
        v.initial_value = Some(init);
        let v = ast.add_variable(v);

        let t = ast.variable_type(v).unwrap();
        assert!(t.is_const());
        assert!(!ast.variable_is_assignable(v));
        assert!(ast.variable_is_compile_time_constant(v));
    }

    #[test]
    fn block_search_respects_declaration_order() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let mc = Context::new(loc(), Some(ScopeRef::Module(m)));

        let block = ast.add_block(Block {
            context: mc,
            function: None,
            enclosing_stmt: None,
            statements: Vec::new(),
        });
        let bc = Context::new(loc(), Some(ScopeRef::Block(block)));

        let init = ast.add_expr(bc, ExprKind::Constant(Value::from_i32(1)));
        let mut v = Variable::new(bc, "x", VariableRole::Local);
        v.initial_value = Some(init);
        let v = ast.add_variable(v);
        let decl = ast.add_stmt(bc, StmtKind::VariableDeclaration(v));

        let use_stmt = ast.add_stmt(bc, StmtKind::Noop);
        ast.block_mut(block).statements = vec![decl, use_stmt];

        // Searching from after the declaration finds it.
        let mut search = NameSearch::new(IdentifierPath::from_name("x"));
        ast.perform_full_name_search(ScopeRef::Block(block), &mut search, Some(use_stmt));
        assert_eq!(search.items_found, vec![FoundItem::Variable(v)]);

        // Searching from before the declaration does not.
        let mut search = NameSearch::new(IdentifierPath::from_name("x"));
        ast.perform_full_name_search(ScopeRef::Block(block), &mut search, Some(decl));
        assert!(search.items_found.is_empty());
    }

    #[test]
    fn full_search_walks_to_enclosing_module() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let mc = Context::new(loc(), Some(ScopeRef::Module(m)));

        let init = ast.add_expr(mc, ExprKind::Constant(Value::from_i32(48000)));
        let mut v = Variable::new(mc, "rate", VariableRole::Constant);
        v.initial_value = Some(init);
        let v = ast.add_variable(v);
        ast.module_mut(m).state_variables.push(v);

        let block = ast.add_block(Block {
            context: mc,
            function: None,
            enclosing_stmt: None,
            statements: Vec::new(),
        });

        let mut search = NameSearch::new(IdentifierPath::from_name("rate"));
        ast.perform_full_name_search(ScopeRef::Block(block), &mut search, None);
        assert_eq!(search.items_found, vec![FoundItem::Variable(v)]);

        // only_find_local_variables stops at the first non-block scope.
        let mut search = NameSearch::new(IdentifierPath::from_name("rate"));
        search.only_find_local_variables = true;
        ast.perform_full_name_search(ScopeRef::Block(block), &mut search, None);
        assert!(search.items_found.is_empty());
    }

    #[test]
    fn qualified_search_descends_sub_modules() {
        let mut ast = Ast::new();
        let root = new_namespace(&mut ast, "root");
        let rc = Context::new(loc(), Some(ScopeRef::Module(root)));

        let inner = ast.add_module(Module::new(rc, ModuleKind::Namespace, "filters"));
        ast.module_mut(root).sub_modules.push(inner);

        let ic = Context::new(loc(), Some(ScopeRef::Module(inner)));
        let proc = ast.add_module(Module::new(ic, ModuleKind::Processor, "Gain"));
        ast.module_mut(inner).sub_modules.push(proc);

        let path = IdentifierPath::from_parts(vec!["filters".into(), "Gain".into()]);
        let found = ast.find_matching_sub_modules(ScopeRef::Module(root), &path);
        assert_eq!(found, vec![proc]);
    }

    #[test]
    fn struct_layout_is_lazy_and_recursion_safe() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let c = Context::new(loc(), Some(ScopeRef::Module(m)));

        let f32_ty = ast.add_expr(c, ExprKind::ConcreteType(Type::float32()));
        let mut decl = StructDecl::new(c, "Point");
        decl.add_member(f32_ty, "x");
        decl.add_member(f32_ty, "y");
        let sid = ast.add_struct(decl);

        let layout = ast.struct_layout(sid).unwrap();
        assert_eq!(layout.num_members(), 2);
        assert_eq!(layout.packed_size_in_bytes(), 8);
        // Cached: the same instance comes back.
        assert!(Rc::ptr_eq(&layout, &ast.struct_layout(sid).unwrap()));

        // A self-referential struct never produces a layout (and does not
        // recurse forever). The member references the declaration's own
        // upcoming id.
        let next_id = StructId(ast.structs.len() as u32);
        let self_ref = ast.add_expr(c, ExprKind::StructRef(next_id));
        let mut rec = StructDecl::new(c, "Loop");
        rec.add_member(self_ref, "again");
        let rid = ast.add_struct(rec);
        assert_eq!(rid, next_id);
        assert!(ast.struct_layout(rid).is_none());
    }

    #[test]
    fn self_referential_using_reads_as_unresolved() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let next = UsingId(0);
        let self_ref = ast.add_expr(c, ExprKind::UsingRef(next));
        let u = ast.add_using(UsingDecl::new(c, "Alias", Some(self_ref)));
        assert_eq!(u, next);

        assert!(ast.resolve_as_type(self_ref).is_none());
        assert!(!ast.is_resolved(self_ref));
        assert_eq!(ast.constness(self_ref), Constness::Unknown);
    }

    #[test]
    fn using_chain_resolves_through_targets() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let concrete = ast.add_expr(c, ExprKind::ConcreteType(Type::float32()));
        let inner = ast.add_using(UsingDecl::new(c, "Sample", Some(concrete)));
        let inner_ref = ast.add_expr(c, ExprKind::UsingRef(inner));
        let outer = ast.add_using(UsingDecl::new(c, "Frame", Some(inner_ref)));
        let outer_ref = ast.add_expr(c, ExprKind::UsingRef(outer));

        assert_eq!(ast.resolve_as_type(outer_ref), Some(Type::float32()));
        assert!(ast.is_resolved_as_type(outer_ref));
    }

    #[test]
    fn slice_range_and_element_types() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let array = Value::array_or_vector(
            Type::int32().array_of(4),
            &[
                Value::from_i32(1),
                Value::from_i32(2),
                Value::from_i32(3),
                Value::from_i32(4),
            ],
        );
        let object = ast.add_expr(c, ExprKind::Constant(array));
        let start = ast.add_expr(c, ExprKind::Constant(Value::from_i32(1)));
        let end = ast.add_expr(c, ExprKind::Constant(Value::from_i32(3)));

        let slice = ast.add_expr(
            c,
            ExprKind::ArrayElement {
                object,
                start_index: Some(start),
                end_index: Some(end),
                is_slice: true,
            },
        );
        assert_eq!(ast.slice_range(slice), Some((1, 3)));
        assert_eq!(ast.result_type(slice), Some(Type::int32().array_of(2)));
        assert!(ast.is_resolved(slice));

        let point = ast.add_expr(
            c,
            ExprKind::ArrayElement {
                object,
                start_index: Some(start),
                end_index: None,
                is_slice: false,
            },
        );
        assert_eq!(ast.result_type(point), Some(Type::int32()));
    }

    #[test]
    fn type_meta_functions() {
        let mut ast = Ast::new();
        let c = Context::new(loc(), None);

        let arr = ast.add_expr(c, ExprKind::ConcreteType(Type::float32().array_of(8)));

        let size = ast.add_expr(
            c,
            ExprKind::TypeMeta {
                op: TypeMetaOp::Size,
                source: arr,
            },
        );
        assert_eq!(ast.result_type(size), Some(Type::int64()));
        assert_eq!(ast.as_constant(size).unwrap().get_as_i64(), Some(8));

        let elem = ast.add_expr(
            c,
            ExprKind::TypeMeta {
                op: TypeMetaOp::ElementType,
                source: arr,
            },
        );
        assert_eq!(ast.resolve_as_type(elem), Some(Type::float32()));

        let is_vec = ast.add_expr(
            c,
            ExprKind::TypeMeta {
                op: TypeMetaOp::IsVector,
                source: arr,
            },
        );
        assert_eq!(ast.as_constant(is_vec).unwrap().get_as_bool(), Some(false));

        // size of an unsized array is deferred, not folded.
        let unsized_ty = ast.add_expr(c, ExprKind::ConcreteType(Type::float32().unsized_array_of()));
        let deferred = ast.add_expr(
            c,
            ExprKind::TypeMeta {
                op: TypeMetaOp::Size,
                source: unsized_ty,
            },
        );
        assert!(ast.is_size_of_unsized_type(deferred));
        assert!(ast.as_constant(deferred).is_none());
        assert!(!ast.is_resolved(deferred));
    }

    #[test]
    fn function_signature_ids_strip_const_and_ref() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let c = Context::new(loc(), Some(ScopeRef::Module(m)));

        let make = |ast: &mut Ast, ty: Type| {
            let t = ast.add_expr(c, ExprKind::ConcreteType(ty));
            let mut p = Variable::new(c, "a", VariableRole::Parameter);
            p.declared_type = Some(t);
            ast.add_variable(p)
        };

        let mut f1 = Function::new(c, "mix");
        let p1 = make(&mut ast, Type::float32());
        f1.parameters.push(p1);
        let f1 = ast.add_function(f1);

        let mut f2 = Function::new(c, "mix");
        let p2 = make(&mut ast, Type::float32().with_const().with_reference());
        f2.parameters.push(p2);
        let f2 = ast.add_function(f2);

        assert_eq!(
            ast.function_signature_id(f1),
            ast.function_signature_id(f2)
        );
        assert_eq!(ast.function_signature_id(f1), "mix_1_f32");
    }

    #[test]
    fn endpoint_sample_array_types() {
        let mut ast = Ast::new();
        let m = new_namespace(&mut ast, "root");
        let c = Context::new(loc(), Some(ScopeRef::Module(m)));

        let v4 = ast.add_expr(
            c,
            ExprKind::ConcreteType(Type::vector(Primitive::Float32, 4)),
        );
        let size = ast.add_expr(c, ExprKind::Constant(Value::from_i32(3)));

        let mut e = Endpoint::new(c, "out", false, EndpointKind::Stream);
        e.data_types.push(v4);
        e.array_size = Some(size);
        let e = ast.add_endpoint(e);

        assert!(ast.endpoint_is_resolved(e));
        assert_eq!(ast.endpoint_array_size_value(e), Some(3));
        assert_eq!(
            ast.endpoint_sample_array_types(e),
            vec![Type::vector(Primitive::Float32, 4).array_of(3)]
        );
    }
}
