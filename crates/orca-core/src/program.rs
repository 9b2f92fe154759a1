//! The typed program: an AST together with the results of type checking.

use crate::ast::{Ast, NodeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type defined by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// The empty tuple.
    Void,
}

impl BuiltinType {
    /// Look up a built-in type by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(Self::Int),
            "Float" => Some(Self::Float),
            "Bool" => Some(Self::Bool),
            "String" => Some(Self::String),
            "Void" => Some(Self::Void),
            _ => None,
        }
    }

    /// The name of the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
            Self::String => "String",
            Self::Void => "Void",
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The type of an expression or declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A built-in type.
    Builtin(BuiltinType),
    /// A product type, by declaration.
    Product(NodeId),
    /// A trait, by declaration.
    Trait(NodeId),
    /// A generic parameter or associated type, by declaration.
    Parameter(NodeId),
    /// A tuple.
    Tuple(Vec<Type>),
    /// A function or method.
    Function {
        /// Parameter types.
        inputs: Vec<Type>,
        /// Return type.
        output: Box<Type>,
    },
    /// The type of a type used as a value, e.g. `Point` in `Point(x: 1)`.
    Metatype(Box<Type>),
    /// A namespace used as a value; only valid as the domain of a name.
    Namespace(NodeId),
    /// The type of an ill-formed expression. Compatible with everything so
    /// that one error is reported once.
    Error,
}

impl Type {
    /// The unit type.
    pub const fn void() -> Self {
        Self::Builtin(BuiltinType::Void)
    }

    /// Whether this type, or a part of it, is [`Type::Error`].
    pub fn has_error(&self) -> bool {
        match self {
            Self::Error => true,
            Self::Tuple(elements) => elements.iter().any(Self::has_error),
            Self::Function { inputs, output } => {
                inputs.iter().any(Self::has_error) || output.has_error()
            }
            Self::Metatype(t) => t.has_error(),
            _ => false,
        }
    }

    /// Whether a value of type `self` can be used where `other` is expected.
    pub fn is_compatible(&self, other: &Self) -> bool {
        if self.has_error() || other.has_error() {
            return true;
        }
        match (self, other) {
            // Generic parameters are not checked structurally.
            (Self::Parameter(_), _) | (_, Self::Parameter(_)) => true,
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_compatible(y))
            }
            (
                Self::Function {
                    inputs: a,
                    output: x,
                },
                Self::Function {
                    inputs: b,
                    output: y,
                },
            ) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(p, q)| p.is_compatible(q))
                    && x.is_compatible(y)
            }
            _ => self == other,
        }
    }

    /// Render the type, naming declarations after their identifiers.
    pub fn describe(&self, ast: &Ast) -> String {
        let name_of = |id: NodeId| {
            ast.get(id)
                .and_then(|n| n.kind.identifier())
                .map_or_else(|| format!("{id:?}"), |i| i.value.clone())
        };
        match self {
            Self::Builtin(b) => b.name().to_string(),
            Self::Product(id) | Self::Trait(id) | Self::Parameter(id) | Self::Namespace(id) => {
                name_of(*id)
            }
            Self::Tuple(elements) => {
                let parts: Vec<_> = elements.iter().map(|t| t.describe(ast)).collect();
                format!("({})", parts.join(", "))
            }
            Self::Function { inputs, output } => {
                let parts: Vec<_> = inputs.iter().map(|t| t.describe(ast)).collect();
                format!("({}) -> {}", parts.join(", "), output.describe(ast))
            }
            Self::Metatype(t) => format!("Metatype<{}>", t.describe(ast)),
            Self::Error => "<error>".to_string(),
        }
    }
}

/// The resolved meaning of a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclReference {
    /// A declaration in scope, e.g. a local variable or a global function.
    Direct(NodeId),
    /// A member of the type of the name's domain, e.g. `p.x`.
    Member(NodeId),
    /// A type name used as a callee, resolved to the initializer it calls.
    Constructor(NodeId),
    /// A compiler-defined function, type or operator.
    Builtin(String),
}

/// The output of type checking.
///
/// Names that could not be resolved have no entry in the reference table.
#[derive(Debug, Clone)]
pub struct TypedProgram {
    ast: Arc<Ast>,
    references: HashMap<NodeId, DeclReference>,
    types: HashMap<NodeId, Type>,
}

impl TypedProgram {
    /// Assemble a typed program.
    pub fn new(
        ast: Arc<Ast>,
        references: HashMap<NodeId, DeclReference>,
        types: HashMap<NodeId, Type>,
    ) -> Self {
        Self {
            ast,
            references,
            types,
        }
    }

    /// The checked AST.
    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    /// What the name expression, type name or operator at `node` refers to.
    pub fn reference(&self, node: NodeId) -> Option<&DeclReference> {
        self.references.get(&node)
    }

    /// The type of an expression or declaration.
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// Number of resolved references.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}
