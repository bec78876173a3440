use std::fmt::{self, Formatter, Write};

use lox_macros::ByteCodeEncodeDecode;

use crate::value::Value;

pub type ConstantIndex = u8;
pub type Line = usize;

/// A chunk can address at most this many constants with its one-byte operand.
pub const MAX_CONSTANTS: usize = ConstantIndex::MAX as usize + 1;

pub trait ByteCodeEncodeDecode: Sized {
    fn encode(&self, dest: &mut Vec<u8>);
    fn decode(src: &mut &[u8]) -> Option<Self>;
    fn mnemonic(&self) -> &'static str;
}

pub trait Decode: Sized {
    fn decode(slice_ptr: &mut &[u8]) -> Option<Self>;
}

impl Decode for u8 {
    fn decode(slice_ptr: &mut &[u8]) -> Option<Self> {
        let bytes: &[u8] = *slice_ptr;
        let (val, tmp) = bytes.split_first()?;
        *slice_ptr = tmp;
        Some(*val)
    }
}

/// The instruction set. Declaration order fixes the opcode byte of each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ByteCodeEncodeDecode)]
pub enum Instruction {
    Return,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Constant(ConstantIndex),
    Nil,
    True,
    False,
    Not,
    Equal,
    Greater,
    Less,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Bytecode plus its line table and constant pool.
///
/// `lines` holds one entry per byte of `code`, so any byte offset can be mapped back to
/// the source line that produced it.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<Line>,
    values: Vec<Value>,
}

pub struct ChunkIterator<'a> {
    code: &'a [u8],
    offset: usize,
}

impl Iterator for ChunkIterator<'_> {
    type Item = (usize, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let mut cursor = self.code.get(self.offset..)?;
        let instr = Instruction::decode(&mut cursor)?;
        let offset = self.offset;
        self.offset = self.code.len() - cursor.len();
        Some((offset, instr))
    }
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            code: Vec::new(),
            lines: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instr: Instruction, line: Line) {
        let start = self.code.len();
        instr.encode(&mut self.code);
        let written = self.code.len() - start;
        self.lines.extend(std::iter::repeat(line).take(written));
    }

    pub fn add_byte(&mut self, byte: u8, line: Line) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Appends `value` to the constant pool, or returns `None` once the pool is full.
    pub fn add_value(&mut self, value: Value) -> Option<ConstantIndex> {
        if self.values.len() >= MAX_CONSTANTS {
            return None;
        }
        self.values.push(value);
        Some((self.values.len() - 1) as ConstantIndex)
    }

    pub fn get_value(&self, index: ConstantIndex) -> Option<&Value> {
        self.values.get(index as usize)
    }

    pub fn get_line(&self, offset: usize) -> Option<Line> {
        self.lines.get(offset).copied()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Decodes the instruction starting at `offset` and returns it with the offset of the
    /// instruction after it.
    pub fn decode_at(&self, offset: usize) -> Option<(Instruction, usize)> {
        let mut cursor = self.code.get(offset..)?;
        let instr = Instruction::decode(&mut cursor)?;
        Some((instr, self.code.len() - cursor.len()))
    }

    pub fn instr_iter(&self) -> ChunkIterator {
        ChunkIterator {
            code: &self.code,
            offset: 0,
        }
    }

    pub fn disassemble(&self, chunk_name: &str) -> String {
        format!("== {} ==\n{}", chunk_name, self)
    }

    pub fn disassemble_instruction(&self, offset: usize) -> (String, usize) {
        let line_str = match (offset.checked_sub(1), self.get_line(offset)) {
            (Some(prev), Some(line)) if self.get_line(prev) == Some(line) => "   |".to_owned(),
            (_, Some(line)) => format!("{:4}", line),
            (_, None) => "   ?".to_owned(),
        };

        let (text, next_offset) = match self.decode_at(offset) {
            Some((instr @ Instruction::Constant(const_index), next)) => {
                let value = self
                    .get_value(const_index)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "<missing>".to_owned());
                (
                    format!("{:<16} {:4} '{}'", instr.mnemonic(), const_index, value),
                    next,
                )
            }
            Some((instr, next)) => (instr.mnemonic().to_owned(), next),
            None => match self.code.get(offset) {
                Some(byte) => (format!("Unknown opcode {}", byte), offset + 1),
                None => ("<end of chunk>".to_owned(), offset + 1),
            },
        };

        (format!("{:0>4} {} {}", offset, line_str, text), next_offset)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut offset = 0;
        let mut instrs = String::new();
        while offset < self.code.len() {
            let (instruction, new_offset) = self.disassemble_instruction(offset);
            writeln!(instrs, "{}", instruction)?;
            offset = new_offset;
        }

        f.write_str(&instrs)
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Value;

    use super::{Chunk, Instruction, MAX_CONSTANTS};

    #[test]
    fn line_table_tracks_every_byte() {
        let mut chunk = Chunk::new();
        let index = chunk.add_value(Value::Number(1.2)).unwrap();
        chunk.add_instruction(Instruction::Constant(index), 3);
        chunk.add_instruction(Instruction::Negate, 3);
        chunk.add_instruction(Instruction::Return, 4);

        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.lines(), &[3, 3, 3, 4]);
        assert_eq!(chunk.code().len(), chunk.lines().len());
    }

    #[test]
    fn constant_pool_stops_at_one_byte_of_index() {
        let mut chunk = Chunk::new();
        for i in 0..MAX_CONSTANTS {
            assert_eq!(chunk.add_value(Value::Number(i as f64)), Some(i as u8));
        }

        assert_eq!(chunk.add_value(Value::Nil), None);
        assert_eq!(chunk.values().len(), MAX_CONSTANTS);
    }

    #[test]
    fn decode_walks_the_instruction_stream() {
        let mut chunk = Chunk::new();
        chunk.add_instruction(Instruction::Constant(0), 1);
        chunk.add_instruction(Instruction::Not, 1);
        chunk.add_instruction(Instruction::Return, 1);

        assert_eq!(chunk.decode_at(0), Some((Instruction::Constant(0), 2)));
        assert_eq!(chunk.decode_at(2), Some((Instruction::Not, 3)));
        assert_eq!(chunk.decode_at(4), None);

        let offsets: Vec<_> = chunk.instr_iter().collect();
        assert_eq!(
            offsets,
            vec![
                (0, Instruction::Constant(0)),
                (2, Instruction::Not),
                (3, Instruction::Return)
            ]
        );
    }

    #[test]
    fn disassembly_marks_repeated_lines() {
        let mut chunk = Chunk::new();
        let index = chunk.add_value(Value::Number(1.5)).unwrap();
        chunk.add_instruction(Instruction::Constant(index), 1);
        chunk.add_instruction(Instruction::Negate, 1);
        chunk.add_instruction(Instruction::Return, 2);
        chunk.add_byte(200, 2);

        assert_eq!(
            chunk.disassemble("test"),
            "== test ==\n\
             0000    1 CONSTANT            0 '1.5'\n\
             0002    | NEGATE\n\
             0003    2 RETURN\n\
             0004    | Unknown opcode 200\n"
        );
    }
}
