//! The syntax kind tag space.
//!
//! Every syntax node and token has a [`SyntaxKind`]. Kinds are exposed to
//! macro code as numbers (`kind_tag(s)`) and names (`kind(s)`), so the tags
//! are part of the language surface and must stay stable. Tokens live in one
//! band, concrete composite nodes in another, abstract kinds in a third.

use serde::Serialize;

/// First tag of the composite band.
pub const COMPOSITE_BAND: u16 = 100;
/// First tag of the abstract band.
pub const ABSTRACT_BAND: u16 = 200;

macro_rules! syntax_kinds {
    ($($(#[$doc:meta])* $variant:ident = $tag:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[repr(u16)]
        pub enum SyntaxKind {
            $($(#[$doc])* $variant = $tag),*
        }

        impl SyntaxKind {
            /// Every kind, in tag order.
            pub const ALL: &'static [SyntaxKind] = &[$(SyntaxKind::$variant),*];

            pub const fn tag(self) -> u16 {
                self as u16
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(SyntaxKind::$variant => stringify!($variant)),*
                }
            }

            pub fn from_tag(tag: u16) -> Option<Self> {
                match tag {
                    $($tag => Some(SyntaxKind::$variant),)*
                    _ => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(SyntaxKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

syntax_kinds! {
    // Tokens
    Identifier = 1,
    IntLiteral = 2,
    StrLiteral = 3,
    BoolLiteral = 4,
    InfixOperator = 5,
    PrefixOperator = 6,

    // Structure
    CompUnit = 100,
    Block = 101,
    StatementList = 102,
    ParameterList = 103,
    Parameter = 104,
    ArgumentList = 105,
    ElementList = 106,
    IfClauseList = 107,
    IfClause = 108,

    // Statements
    ExprStatement = 110,
    BlockStatement = 111,
    VarDecl = 112,
    FuncDecl = 113,
    MacroDecl = 114,
    IfStatement = 115,
    WhileStatement = 116,
    ForStatement = 117,
    ReturnStatement = 118,
    LastStatement = 119,
    NextStatement = 120,

    // Expressions
    IntLitExpr = 130,
    StrLitExpr = 131,
    BoolLitExpr = 132,
    NoneLitExpr = 133,
    IdentExpr = 134,
    ArrayLitExpr = 135,
    InfixOpExpr = 136,
    PrefixOpExpr = 137,
    AssignExpr = 138,
    CallExpr = 139,
    IndexExpr = 140,
    FuncExpr = 141,
    QuoteExpr = 142,
    UnquoteExpr = 143,
    DoExpr = 144,

    /// Any statement. Never attached to a concrete node.
    Statement = 200,
    /// Any expression. Never attached to a concrete node.
    Expression = 201,
    /// Any declaration. Never attached to a concrete node.
    Declaration = 202,
}

impl SyntaxKind {
    pub fn is_token(self) -> bool {
        self.tag() < COMPOSITE_BAND
    }

    pub fn is_abstract(self) -> bool {
        self.tag() >= ABSTRACT_BAND
    }

    pub fn is_statement(self) -> bool {
        (110..=120).contains(&self.tag())
    }

    pub fn is_expression(self) -> bool {
        (130..=144).contains(&self.tag())
    }

    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            SyntaxKind::VarDecl | SyntaxKind::FuncDecl | SyntaxKind::MacroDecl
        )
    }

    /// Whether a concrete node of kind `self` satisfies `other`, which may be
    /// abstract. Backs the `kind_is` built-in.
    pub fn conforms_to(self, other: SyntaxKind) -> bool {
        match other {
            SyntaxKind::Statement => self.is_statement(),
            SyntaxKind::Expression => self.is_expression(),
            SyntaxKind::Declaration => self.is_declaration(),
            concrete => self == concrete,
        }
    }
}

impl std::fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_names_round_trip() {
        for kind in SyntaxKind::ALL {
            assert_eq!(SyntaxKind::from_tag(kind.tag()), Some(*kind));
            assert_eq!(SyntaxKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(SyntaxKind::ALL.len(), 44);
    }

    #[test]
    fn bands_are_disjoint() {
        for kind in SyntaxKind::ALL {
            let bands = [kind.is_token(), kind.is_abstract(), !kind.is_token() && !kind.is_abstract()];
            assert_eq!(bands.iter().filter(|b| **b).count(), 1, "{kind}");
        }
        assert!(SyntaxKind::IntLiteral.is_token());
        assert!(SyntaxKind::IntLitExpr.is_expression());
        assert!(SyntaxKind::ForStatement.is_statement());
        assert!(SyntaxKind::Expression.is_abstract());
    }

    #[test]
    fn abstract_kinds_match_their_members() {
        assert!(SyntaxKind::CallExpr.conforms_to(SyntaxKind::Expression));
        assert!(SyntaxKind::MacroDecl.conforms_to(SyntaxKind::Declaration));
        assert!(SyntaxKind::MacroDecl.conforms_to(SyntaxKind::Statement));
        assert!(!SyntaxKind::Block.conforms_to(SyntaxKind::Statement));
    }
}
