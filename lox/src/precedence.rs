use crate::scanner::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,

    // =
    Assignment,

    // or
    Or,

    // and
    And,

    // ==, !=
    Equality,

    // <, >, <=, >=
    Comparison,

    // +, -
    Term,

    // *, /
    Factor,

    // !, -
    Unary,

    // ., ()
    Call,

    Primary,
}

impl Precedence {
    /// One level tighter. `Primary` is already the tightest and maps to itself.
    pub fn next_greater(&self) -> Self {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

/// Parse actions the compiler knows how to run, dispatched by `Compiler::apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    String,
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

const PLACEHOLDER_PARSERULE: ParseRule = ParseRule {
    prefix: None,
    infix: None,
    precedence: Precedence::None,
};

const LEFT_PAREN_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::Grouping),
    infix: None,
    precedence: Precedence::None,
};

const MINUS_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::Unary),
    infix: Some(ParseFn::Binary),
    precedence: Precedence::Term,
};

const PLUS_RULE: ParseRule = ParseRule {
    prefix: None,
    infix: Some(ParseFn::Binary),
    precedence: Precedence::Term,
};

const SLASH_AND_STAR_RULE: ParseRule = ParseRule {
    prefix: None,
    infix: Some(ParseFn::Binary),
    precedence: Precedence::Factor,
};

const BANG_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::Unary),
    infix: None,
    precedence: Precedence::None,
};

const EQUALITY_RULE: ParseRule = ParseRule {
    prefix: None,
    infix: Some(ParseFn::Binary),
    precedence: Precedence::Equality,
};

const COMPARISON_RULE: ParseRule = ParseRule {
    prefix: None,
    infix: Some(ParseFn::Binary),
    precedence: Precedence::Comparison,
};

const STRING_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::String),
    infix: None,
    precedence: Precedence::None,
};

const NUMBER_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::Number),
    infix: None,
    precedence: Precedence::None,
};

const LITERAL_RULE: ParseRule = ParseRule {
    prefix: Some(ParseFn::Literal),
    infix: None,
    precedence: Precedence::None,
};

pub fn parse_rule(token_type: TokenType) -> &'static ParseRule {
    use TokenType::*;
    match token_type {
        LeftParen => &LEFT_PAREN_RULE,
        Minus => &MINUS_RULE,
        Plus => &PLUS_RULE,
        Slash | Star => &SLASH_AND_STAR_RULE,
        Bang => &BANG_RULE,
        BangEqual | EqualEqual => &EQUALITY_RULE,
        Greater | GreaterEqual | Less | LessEqual => &COMPARISON_RULE,
        String => &STRING_RULE,
        Number => &NUMBER_RULE,
        False | Nil | True => &LITERAL_RULE,
        RightParen | LeftBrace | RightBrace | Comma | Dot | SemiColon | Equal | Identifier
        | And | Class | Else | For | Fun | If | Or | Print | Return | Super | This | Var
        | While | Error | Eof => &PLACEHOLDER_PARSERULE,
    }
}

#[cfg(test)]
mod tests {
    use crate::scanner::TokenType;

    use super::{parse_rule, ParseFn, Precedence};

    #[test]
    fn levels_are_ordered_lowest_first() {
        assert!(Precedence::None < Precedence::Assignment);
        assert!(Precedence::Equality < Precedence::Comparison);
        assert!(Precedence::Term < Precedence::Factor);
        assert!(Precedence::Unary < Precedence::Primary);
    }

    #[test]
    fn next_greater_climbs_one_level() {
        assert_eq!(Precedence::Term.next_greater(), Precedence::Factor);
        assert_eq!(Precedence::Factor.next_greater(), Precedence::Unary);
        assert_eq!(Precedence::Equality.next_greater(), Precedence::Comparison);
        assert_eq!(Precedence::Primary.next_greater(), Precedence::Primary);
    }

    #[test]
    fn minus_is_both_prefix_and_infix() {
        let rule = parse_rule(TokenType::Minus);
        assert_eq!(rule.prefix, Some(ParseFn::Unary));
        assert_eq!(rule.infix, Some(ParseFn::Binary));
        assert_eq!(rule.precedence, Precedence::Term);
    }

    #[test]
    fn reserved_words_cannot_start_an_expression() {
        for kind in [TokenType::Print, TokenType::Var, TokenType::Class, TokenType::Identifier] {
            let rule = parse_rule(kind);
            assert_eq!(rule.prefix, None);
            assert_eq!(rule.infix, None);
            assert_eq!(rule.precedence, Precedence::None);
        }
    }
}
