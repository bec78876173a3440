use tracing::debug;

use crate::{
    error::{CompileError, CompileErrors, ErrorLocation},
    heap::Heap,
    opcodes::{Chunk, ConstantIndex, Instruction},
    precedence::{parse_rule, ParseFn, Precedence},
    scanner::{Scanner, Token, TokenType},
    value::{Number, Value},
};

/// Compiles `source` into a fresh chunk.
///
/// String literals are allocated through `heap`. On failure the partially emitted chunk
/// is dropped, so bytecode from a failed compile can never reach the VM.
pub fn compile(source: &str, heap: &Heap) -> Result<Chunk, CompileErrors> {
    let mut compiler = Compiler::new(source, heap);

    if compiler.compile() {
        debug!(
            bytes = compiler.chunk.len(),
            constants = compiler.chunk.values().len(),
            "compiled chunk"
        );
        Ok(compiler.chunk)
    } else {
        debug!(errors = compiler.errors.len(), "compilation failed");
        Err(CompileErrors(compiler.errors))
    }
}

/// Single-pass Pratt compiler: tokens are turned into bytecode as they are parsed.
pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    heap: &'a Heap,
    previous: Token<'a>,
    current: Token<'a>,
    had_error: bool,
    panic_mode: bool,
    chunk: Chunk,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str, heap: &'a Heap) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            heap,
            had_error: false,
            panic_mode: false,
            previous: Token::placeholder(),
            current: Token::placeholder(),
            chunk: Chunk::new(),
            errors: Vec::new(),
        }
    }

    /// Parses one expression followed by the end of input. Returns `false` if any error
    /// was reported, however much bytecode was emitted.
    pub fn compile(&mut self) -> bool {
        self.advance();
        self.expression();
        self.consume(TokenType::Eof, "Expect end of expression.");
        self.end_compile();
        !self.had_error
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    fn end_compile(&mut self) {
        self.emit_return();
    }

    fn consume(&mut self, token_type: TokenType, message: &str) {
        if self.current.kind == token_type {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.scan_token();

            if self.current.kind != TokenType::Error {
                break;
            }

            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    // Panic mode is never cleared: without statements there is nothing to synchronize on.
    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenType::Eof => ErrorLocation::AtEnd,
            TokenType::Error => ErrorLocation::Lexical,
            _ => ErrorLocation::At(token.lexeme.to_owned()),
        };

        self.errors.push(CompileError {
            line: token.line,
            location,
            message: message.to_owned(),
        });
        self.had_error = true;
    }

    fn emit_instruction(&mut self, instr: Instruction) {
        self.chunk.add_instruction(instr, self.previous.line);
    }

    fn emit_instructions(&mut self, instrs: &[Instruction]) {
        for instr in instrs {
            self.emit_instruction(*instr);
        }
    }

    fn emit_return(&mut self) {
        self.emit_instruction(Instruction::Return);
    }

    fn make_constant(&mut self, value: Value) -> ConstantIndex {
        match self.chunk.add_value(value) {
            Some(index) => index,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let constant_index = self.make_constant(value);
        self.emit_instruction(Instruction::Constant(constant_index));
    }

    fn apply(&mut self, parse_fn: ParseFn) {
        match parse_fn {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let prefix = match parse_rule(self.previous.kind).prefix {
            Some(prefix) => prefix,
            None => {
                self.error("Expect expression.");
                return;
            }
        };
        self.apply(prefix);

        while precedence <= parse_rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = parse_rule(self.previous.kind).infix {
                self.apply(infix);
            }
        }
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<Number>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string(&mut self) {
        let lexeme = self.previous.lexeme;
        let chars = lexeme
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(lexeme);
        let string = self.heap.alloc_string(chars);
        self.emit_constant(Value::Object(string));
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let op_type = self.previous.kind;

        self.parse_precedence(Precedence::Unary);

        match op_type {
            TokenType::Minus => self.emit_instruction(Instruction::Negate),
            TokenType::Bang => self.emit_instruction(Instruction::Not),
            _ => (),
        }
    }

    fn binary(&mut self) {
        let op_type = self.previous.kind;
        let rule = parse_rule(op_type);

        self.parse_precedence(rule.precedence.next_greater());

        match op_type {
            TokenType::Plus => self.emit_instruction(Instruction::Add),
            TokenType::Minus => self.emit_instruction(Instruction::Subtract),
            TokenType::Star => self.emit_instruction(Instruction::Multiply),
            TokenType::Slash => self.emit_instruction(Instruction::Divide),
            TokenType::EqualEqual => self.emit_instruction(Instruction::Equal),
            TokenType::BangEqual => self.emit_instructions(&[Instruction::Equal, Instruction::Not]),
            TokenType::Greater => self.emit_instruction(Instruction::Greater),
            TokenType::GreaterEqual => {
                self.emit_instructions(&[Instruction::Less, Instruction::Not])
            }
            TokenType::Less => self.emit_instruction(Instruction::Less),
            TokenType::LessEqual => {
                self.emit_instructions(&[Instruction::Greater, Instruction::Not])
            }
            _ => (),
        }
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenType::False => self.emit_instruction(Instruction::False),
            TokenType::Nil => self.emit_instruction(Instruction::Nil),
            TokenType::True => self.emit_instruction(Instruction::True),
            _ => (),
        }
    }
}
