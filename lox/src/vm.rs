use std::{
    io::{self, Write},
    ops::{Div, Mul, Sub},
};

use tracing::debug;

use crate::{
    error::{RuntimeError, RuntimeErrorKind},
    heap::Heap,
    opcodes::{Chunk, Instruction, Line},
    value::{Number, Value},
};

/// Fixed capacity of the operand stack.
pub const STACK_MAX: usize = 256;

type Stack = Vec<Value>;
type Step = Result<(), RuntimeErrorKind>;

/// Stack machine executing one chunk at a time.
///
/// The VM never owns the chunk it runs. Its stack is emptied before every run and after
/// any runtime error, so nothing carries over between interpretations.
pub struct Vm {
    stack: Stack,
    ip: usize,
    trace_execution: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            stack: Vec::with_capacity(STACK_MAX),
            ip: 0,
            trace_execution: false,
        }
    }

    pub fn with_trace_execution(mut self, trace_execution: bool) -> Self {
        self.trace_execution = trace_execution;
        self
    }

    pub fn reset_stack(&mut self) {
        self.stack.clear();
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Runs `chunk` and prints the value produced by its return instruction to `out`.
    ///
    /// Execution traces, when enabled, go to `out` ahead of the result.
    pub fn run(&mut self, chunk: &Chunk, heap: &Heap, out: &mut dyn Write) -> Result<(), RuntimeError> {
        let result = self.execute_to(chunk, heap, out)?;

        writeln!(out, "{}", result)
            .and_then(|_| out.flush())
            .map_err(|err| self.runtime_error(chunk, RuntimeErrorKind::Output(err.kind())))
    }

    /// Runs `chunk` until its return instruction and hands back the popped value.
    ///
    /// Execution traces, when enabled, go to stdout.
    pub fn execute(&mut self, chunk: &Chunk, heap: &Heap) -> Result<Value, RuntimeError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.execute_to(chunk, heap, &mut out)
    }

    fn execute_to(
        &mut self,
        chunk: &Chunk,
        heap: &Heap,
        out: &mut dyn Write,
    ) -> Result<Value, RuntimeError> {
        self.reset_stack();
        self.ip = 0;

        self.dispatch(chunk, heap, out)
            .map_err(|kind| self.runtime_error(chunk, kind))
    }

    fn dispatch(
        &mut self,
        chunk: &Chunk,
        heap: &Heap,
        out: &mut dyn Write,
    ) -> Result<Value, RuntimeErrorKind> {
        loop {
            if self.trace_execution {
                self.trace(chunk, out)?;
            }

            let instr = self.read_instruction(chunk)?;

            match instr {
                Instruction::Return => {
                    return self.pop();
                }
                Instruction::Constant(cin) => {
                    let constant = chunk
                        .get_value(cin)
                        .cloned()
                        .ok_or(RuntimeErrorKind::MissingConstant(cin))?;
                    self.push(constant)?;
                }
                Instruction::Nil => self.push(Value::Nil)?,
                Instruction::True => self.push(Value::Boolean(true))?,
                Instruction::False => self.push(Value::Boolean(false))?,
                Instruction::Negate => match self.stack.last_mut() {
                    Some(Value::Number(head)) => *head = -*head,
                    Some(_) => return Err(RuntimeErrorKind::OperandMustBeNumber),
                    None => return Err(RuntimeErrorKind::StackUnderflow),
                },
                Instruction::Not => {
                    let head = self.pop()?;
                    self.push(Value::Boolean(head.is_falsey()))?;
                }
                Instruction::Equal => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Boolean(lhs == rhs))?;
                }
                Instruction::Greater => self.perform_binary_op(|a: Number, b: Number| a > b)?,
                Instruction::Less => self.perform_binary_op(|a: Number, b: Number| a < b)?,
                Instruction::Add => self.perform_binary_op_plus(heap)?,
                Instruction::Subtract => self.perform_binary_op(Number::sub)?,
                Instruction::Multiply => self.perform_binary_op(Number::mul)?,
                Instruction::Divide => self.perform_binary_op(Number::div)?,
            }
        }
    }

    /// Reads the opcode at `ip` and its operands, leaving `ip` on the next instruction.
    fn read_instruction(&mut self, chunk: &Chunk) -> Result<Instruction, RuntimeErrorKind> {
        match chunk.decode_at(self.ip) {
            Some((instr, next)) => {
                self.ip = next;
                Ok(instr)
            }
            None => {
                let byte = chunk.code().get(self.ip).copied();
                self.ip += 1;
                match byte {
                    Some(byte) => Err(RuntimeErrorKind::UnknownOpcode(byte)),
                    None => Err(RuntimeErrorKind::UnexpectedEndOfChunk),
                }
            }
        }
    }

    fn push(&mut self, value: Value) -> Step {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn perform_binary_op_plus(&mut self, heap: &Heap) -> Step {
        let rhs = self.stack.peek(0)?;
        let lhs = self.stack.peek(1)?;

        let res: Value = match (lhs, rhs) {
            (Value::Number(lhs), Value::Number(rhs)) => (lhs + rhs).into(),
            _ => match (lhs.as_lox_str(), rhs.as_lox_str()) {
                (Some(lhs), Some(rhs)) => heap.concatenate(lhs, rhs).into(),
                _ => return Err(RuntimeErrorKind::OperandsMustBeNumbersOrStrings),
            },
        };

        self.stack.pop();
        self.stack.pop();
        self.push(res)
    }

    fn perform_binary_op<T, V>(&mut self, op: impl Fn(T, T) -> V) -> Step
    where
        Value: From<V>,
        for<'a> T: TryFrom<&'a Value>,
    {
        let lhs = T::try_from(self.stack.peek(1)?).ok();
        let rhs = T::try_from(self.stack.peek(0)?).ok();

        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => {
                let res = op(lhs, rhs).into();
                self.stack.pop();
                self.stack.pop();
                self.push(res)
            }
            _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
        }
    }

    /// Builds the error for the instruction that just faulted and clears the stack.
    fn runtime_error(&mut self, chunk: &Chunk, kind: RuntimeErrorKind) -> RuntimeError {
        // `ip` has already moved past the faulting opcode.
        let line: Line = chunk.get_line(self.ip.saturating_sub(1)).unwrap_or(0);
        debug!(line, error = %kind, "runtime error");

        self.reset_stack();
        RuntimeError { kind, line }
    }

    /// Writes the operand stack, bottom first, then the instruction about to run.
    fn trace(&self, chunk: &Chunk, out: &mut dyn Write) -> Step {
        let mut slots = String::from("          ");
        for value in self.stack.iter() {
            slots.push_str(&format!("[ {} ]", value));
        }
        let (instruction, _) = chunk.disassemble_instruction(self.ip);

        writeln!(out, "{}\n{}", slots, instruction)
            .map_err(|err| RuntimeErrorKind::Output(err.kind()))
    }
}

trait PeekFromTop {
    type Target;
    fn peek(&self, distance: usize) -> Result<&Self::Target, RuntimeErrorKind>;
}

impl PeekFromTop for Stack {
    type Target = Value;

    fn peek(&self, distance: usize) -> Result<&Value, RuntimeErrorKind> {
        self.len()
            .checked_sub(distance + 1)
            .map(|index| &self[index])
            .ok_or(RuntimeErrorKind::StackUnderflow)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::RuntimeErrorKind,
        heap::Heap,
        opcodes::{Chunk, Instruction},
        value::Value,
    };

    use super::{Vm, STACK_MAX};

    fn chunk_of(instrs: &[Instruction], values: Vec<Value>) -> Chunk {
        let mut chunk = Chunk::new();
        for value in values {
            chunk.add_value(value).unwrap();
        }
        for (line, instr) in instrs.iter().enumerate() {
            chunk.add_instruction(*instr, line + 1);
        }
        chunk
    }

    #[test]
    fn executes_arithmetic() {
        use Instruction::*;
        let chunk = chunk_of(
            &[Constant(0), Constant(1), Subtract, Constant(2), Divide, Return],
            vec![Value::Number(10.0), Value::Number(4.0), Value::Number(2.0)],
        );
        let mut vm = Vm::new();

        assert_eq!(vm.execute(&chunk, &Heap::new()), Ok(Value::Number(3.0)));
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn negate_requires_a_number() {
        use Instruction::*;
        let chunk = chunk_of(&[True, Negate, Return], vec![]);
        let mut vm = Vm::new();

        let error = vm.execute(&chunk, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::OperandMustBeNumber);
        assert_eq!(error.line, 2);
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn comparison_requires_numbers() {
        use Instruction::*;
        let chunk = chunk_of(&[Nil, Constant(0), Less, Return], vec![Value::Number(1.0)]);

        let error = Vm::new().execute(&chunk, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::OperandsMustBeNumbers);
        assert_eq!(error.line, 3);
    }

    #[test]
    fn add_concatenates_strings() {
        use Instruction::*;
        let heap = Heap::new();
        let chunk = chunk_of(
            &[Constant(0), Constant(1), Add, Return],
            vec![heap.alloc_string("foo").into(), heap.alloc_string("bar").into()],
        );

        let result = Vm::new().execute(&chunk, &heap).unwrap();
        assert_eq!(result.to_string(), "foobar");
        assert_eq!(heap.objects_allocated(), 3);
    }

    #[test]
    fn add_rejects_mixed_operands() {
        use Instruction::*;
        let heap = Heap::new();
        let chunk = chunk_of(
            &[Constant(0), Constant(1), Add, Return],
            vec![heap.alloc_string("1").into(), Value::Number(1.0)],
        );

        let error = Vm::new().execute(&chunk, &heap).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::OperandsMustBeNumbersOrStrings);
    }

    #[test]
    fn pushing_past_capacity_overflows() {
        let mut instrs = vec![Instruction::Nil; STACK_MAX + 1];
        instrs.push(Instruction::Return);
        let chunk = chunk_of(&instrs, vec![]);
        let mut vm = Vm::new();

        let error = vm.execute(&chunk, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::StackOverflow);
        assert_eq!(error.line, STACK_MAX + 1);
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn popping_an_empty_stack_underflows() {
        let chunk = chunk_of(&[Instruction::Not], vec![]);
        let error = Vm::new().execute(&chunk, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::StackUnderflow);
    }

    #[test]
    fn malformed_bytecode_fails_closed() {
        let mut unknown = Chunk::new();
        unknown.add_byte(250, 9);
        let error = Vm::new().execute(&unknown, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::UnknownOpcode(250));
        assert_eq!(error.line, 9);

        let unterminated = chunk_of(&[Instruction::Nil], vec![]);
        let error = Vm::new().execute(&unterminated, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::UnexpectedEndOfChunk);
    }

    #[test]
    fn constant_outside_the_pool_is_reported() {
        use Instruction::*;
        let chunk = chunk_of(&[Constant(0), Constant(3), Return], vec![Value::Number(1.0)]);

        let error = Vm::new().execute(&chunk, &Heap::new()).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::MissingConstant(3));
        assert_eq!(error.line, 2);
        assert_eq!(error.to_string(), "Missing constant 3.\n[line 2] in script");
    }

    #[test]
    fn trace_writes_stack_and_instruction_before_each_step() {
        use Instruction::*;
        let chunk = chunk_of(
            &[Constant(0), Constant(1), Add, Return],
            vec![Value::Number(1.0), Value::Number(2.0)],
        );
        let mut out = Vec::new();

        Vm::new()
            .with_trace_execution(true)
            .run(&chunk, &Heap::new(), &mut out)
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "          \n\
             0000    1 CONSTANT            0 '1'\n\
             \x20         [ 1 ]\n\
             0002    2 CONSTANT            1 '2'\n\
             \x20         [ 1 ][ 2 ]\n\
             0004    3 ADD\n\
             \x20         [ 3 ]\n\
             0005    4 RETURN\n\
             3\n"
        );
    }

    #[test]
    fn run_prints_the_returned_value() {
        use Instruction::*;
        let chunk = chunk_of(&[False, Not, Return], vec![]);
        let mut out = Vec::new();

        Vm::new().run(&chunk, &Heap::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "true\n");
    }

    #[test]
    fn stack_is_reset_between_runs() {
        use Instruction::*;
        let mut vm = Vm::new();
        let heap = Heap::new();

        let failing = chunk_of(&[Nil, Nil, Nil, Negate, Return], vec![]);
        assert!(vm.execute(&failing, &heap).is_err());

        let passing = chunk_of(&[True, Return], vec![]);
        assert_eq!(vm.execute(&passing, &heap), Ok(Value::Boolean(true)));
        assert_eq!(vm.stack_len(), 0);
    }
}
