// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by the sanity-check passes and
// handed to the embedding compiler driver.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::CodeLocation;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0102`, `E0404`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable diagnostic codes, grouped by the hundreds digit:
/// E01xx structural, E02xx naming, E03xx typing, E04xx recursion,
/// E05xx endpoints/events, E06xx bounds, E07xx misuse.
pub mod codes {
    use super::DiagCode;

    // ── Structural ──
    pub const E0101: DiagCode = DiagCode("E0101"); // processor needs an output
    pub const E0102: DiagCode = DiagCode("E0102"); // multiple run functions
    pub const E0103: DiagCode = DiagCode("E0103"); // run/init must be void
    pub const E0104: DiagCode = DiagCode("E0104"); // run/init cannot take parameters
    pub const E0105: DiagCode = DiagCode("E0105"); // processor needs a run function

    // ── Naming ──
    pub const E0201: DiagCode = DiagCode("E0201"); // duplicate name in scope
    pub const E0202: DiagCode = DiagCode("E0202"); // duplicate function signature
    pub const E0203: DiagCode = DiagCode("E0203"); // unresolved symbol
    pub const E0204: DiagCode = DiagCode("E0204"); // ambiguous symbol
    pub const E0205: DiagCode = DiagCode("E0205"); // identifier too long
    pub const E0206: DiagCode = DiagCode("E0206"); // no such processor instance

    // ── Typing ──
    pub const E0301: DiagCode = DiagCode("E0301"); // value cannot be cast implicitly
    pub const E0302: DiagCode = DiagCode("E0302"); // types cannot be cast implicitly
    pub const E0303: DiagCode = DiagCode("E0303"); // ambiguous cast among candidates
    pub const E0304: DiagCode = DiagCode("E0304"); // list cannot initialise type
    pub const E0305: DiagCode = DiagCode("E0305"); // wrong number of aggregate elements
    pub const E0306: DiagCode = DiagCode("E0306"); // variable cannot be void
    pub const E0307: DiagCode = DiagCode("E0307"); // type too big
    pub const E0308: DiagCode = DiagCode("E0308"); // multi-dimensional array
    pub const E0309: DiagCode = DiagCode("E0309"); // wrong operand type for unary op
    pub const E0310: DiagCode = DiagCode("E0310"); // struct member cannot be const
    pub const E0311: DiagCode = DiagCode("E0311"); // expected a value
    pub const E0312: DiagCode = DiagCode("E0312"); // expected a type
    pub const E0313: DiagCode = DiagCode("E0313"); // expected a constant
    pub const E0314: DiagCode = DiagCode("E0314"); // namespace variable must be const
    pub const E0315: DiagCode = DiagCode("E0315"); // illegal data type for endpoint
    pub const E0316: DiagCode = DiagCode("E0316"); // duplicate types in endpoint list
    pub const E0317: DiagCode = DiagCode("E0317"); // parameter cannot be void
    pub const E0318: DiagCode = DiagCode("E0318"); // initialiser list too long
    pub const E0320: DiagCode = DiagCode("E0320"); // cannot take size of this type
    pub const E0321: DiagCode = DiagCode("E0321"); // type is already const
    pub const E0322: DiagCode = DiagCode("E0322"); // elementType needs array or vector
    pub const E0323: DiagCode = DiagCode("E0323"); // primitiveType needs non-aggregate

    // ── Recursion ──
    pub const E0401: DiagCode = DiagCode("E0401"); // type contains itself
    pub const E0402: DiagCode = DiagCode("E0402"); // types refer to each other
    pub const E0403: DiagCode = DiagCode("E0403"); // graph contains itself
    pub const E0404: DiagCode = DiagCode("E0404"); // feedback cycle in graph

    // ── Endpoints and events ──
    pub const E0501: DiagCode = DiagCode("E0501"); // event function: invalid payload type
    pub const E0502: DiagCode = DiagCode("E0502"); // event function: index must be integer
    pub const E0503: DiagCode = DiagCode("E0503"); // event function: wrong arity
    pub const E0504: DiagCode = DiagCode("E0504"); // event function names no input

    // ── Bounds ──
    pub const E0601: DiagCode = DiagCode("E0601"); // delay length must be integer
    pub const E0602: DiagCode = DiagCode("E0602"); // delay line too short
    pub const E0603: DiagCode = DiagCode("E0603"); // delay line too long
    pub const E0604: DiagCode = DiagCode("E0604"); // array size out of range
    pub const E0605: DiagCode = DiagCode("E0605"); // array size must be integer
    pub const E0606: DiagCode = DiagCode("E0606"); // comparison always true
    pub const E0607: DiagCode = DiagCode("E0607"); // comparison always false
    pub const E0608: DiagCode = DiagCode("E0608"); // array size must be constant

    // ── Misuse ──
    pub const E0701: DiagCode = DiagCode("E0701"); // cannot read from an output
    pub const E0702: DiagCode = DiagCode("E0702"); // processor used where value expected
    pub const E0703: DiagCode = DiagCode("E0703"); // processor used where type expected
    pub const E0704: DiagCode = DiagCode("E0704"); // annotation property not constant
    pub const E0705: DiagCode = DiagCode("E0705"); // static assertion failed
    pub const E0706: DiagCode = DiagCode("E0706"); // pre/post inc-dec collision
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related location ─────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedLocation {
    pub location: CodeLocation,
    pub label: String,
}

// ── Cause frame ──────────────────────────────────────────────────────────

/// One link in a cause chain. Used for the "instantiated from" frames when a
/// diagnostic originates inside a generic-function specialisation.
#[derive(Debug, Clone)]
pub struct CauseFrame {
    pub message: String,
    pub location: Option<CodeLocation>,
}

/// Cause chains are capped so a runaway specialisation tower cannot produce
/// an unbounded diagnostic.
pub const MAX_CAUSE_FRAMES: usize = 10;

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by a sanity-check pass.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagCode,
    pub level: DiagLevel,
    pub location: CodeLocation,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedLocation>,
    pub cause_chain: Vec<CauseFrame>,
}

impl Diagnostic {
    /// Create a new error diagnostic with no hint, related locations, or causes.
    pub fn error(code: DiagCode, location: CodeLocation, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, code, location, message)
    }

    pub fn new(
        level: DiagLevel,
        code: DiagCode,
        location: CodeLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            level,
            location,
            message: message.into(),
            hint: None,
            related: Vec::new(),
            cause_chain: Vec::new(),
        }
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related location.
    pub fn with_related(mut self, location: CodeLocation, label: impl Into<String>) -> Self {
        self.related.push(RelatedLocation {
            location,
            label: label.into(),
        });
        self
    }

    /// Attach a cause frame. Frames beyond `MAX_CAUSE_FRAMES` are dropped.
    pub fn with_cause(mut self, message: impl Into<String>, location: Option<CodeLocation>) -> Self {
        if self.cause_chain.len() < MAX_CAUSE_FRAMES {
            self.cause_chain.push(CauseFrame {
                message: message.into(),
                location,
            });
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", level, self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        for cause in &self.cause_chain {
            write!(f, "\n  note: {}", cause.message)?;
        }
        Ok(())
    }
}

// ── Message list ─────────────────────────────────────────────────────────

/// The sink that the embedding driver hands to each pass. The core never
/// writes to stdout; everything it has to say ends up here.
#[derive(Debug, Default)]
pub struct MessageList {
    pub messages: Vec<Diagnostic>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.messages.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.level == DiagLevel::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
