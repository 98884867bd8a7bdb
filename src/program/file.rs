//! On-disk bytecode container.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "MVM\0"
//! 4       4     format version
//! 8       4     constant-pool entry count
//! 12      4     symbol-pool entry count
//! 16      4     instruction byte length
//! 20      4     CRC-32 of everything after this header
//! 24      ...   constants, symbols, instruction bytes
//! ```
//!
//! Every multi-byte integer is little-endian. Constants are encoded as a
//! one-byte type tag plus payload; strings carry a length, their bytes and
//! a terminating NUL. Object constants have no file representation.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::common::value::{Symbol, Value};
use crate::program::Program;

pub const MAGIC: [u8; 4] = *b"MVM\0";
pub const VERSION: u32 = 1;

// Constant type tags, shared with the interpreter's value model.
const TAG_VOID: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_INT: u8 = 5;
const TAG_REAL: u8 = 7;
const TAG_CHAR: u8 = 11;
const TAG_STR: u8 = 13;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file is not a moth executable (bad magic)")]
    BadMagic,
    #[error("unsupported bytecode version {0}")]
    BadVersion(u32),
    #[error("bad checksum")]
    BadChecksum,
    #[error("truncated bytecode file")]
    Truncated,
    #[error("malformed constant or symbol payload")]
    Malformed,
    #[error("object constants cannot be written to a file")]
    ObjectConstant,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// CRC-32 (IEEE, reflected) over the container payload.
pub fn checksum(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn encode_payload(prog: &Program) -> Result<Vec<u8>, FileError> {
    let mut out = Vec::new();

    for val in prog.constants() {
        match val {
            Value::Void => out.write_u8(TAG_VOID)?,
            Value::Bool(b) => {
                out.write_u8(TAG_BOOL)?;
                out.write_u8(u8::from(*b))?;
            }
            Value::Int(i) => {
                out.write_u8(TAG_INT)?;
                out.write_i64::<LittleEndian>(*i)?;
            }
            Value::Real(r) => {
                out.write_u8(TAG_REAL)?;
                out.write_f64::<LittleEndian>(*r)?;
            }
            Value::Char(c) => {
                out.write_u8(TAG_CHAR)?;
                out.write_u32::<LittleEndian>(*c as u32)?;
            }
            Value::Str(s) => {
                out.write_u8(TAG_STR)?;
                out.write_u32::<LittleEndian>(s.len() as u32)?;
                out.write_all(s.as_bytes())?;
                out.write_u8(0)?;
            }
            Value::Obj(_) => return Err(FileError::ObjectConstant),
        }
    }

    for sym in prog.symbols() {
        out.write_u32::<LittleEndian>(sym.name.len() as u32)?;
        out.write_all(sym.name.as_bytes())?;
        out.write_u8(0)?;
    }

    out.write_all(prog.bytes())?;
    Ok(out)
}

/// Writes `prog` at `path` in the container layout above.
pub fn write_file(path: &Path, prog: &Program) -> Result<(), FileError> {
    let payload = encode_payload(prog)?;

    let mut out = Vec::with_capacity(24 + payload.len());
    out.write_all(&MAGIC)?;
    out.write_u32::<LittleEndian>(VERSION)?;
    out.write_u32::<LittleEndian>(prog.constants().len() as u32)?;
    out.write_u32::<LittleEndian>(prog.symbols().len() as u32)?;
    out.write_u32::<LittleEndian>(prog.bytes().len() as u32)?;
    out.write_u32::<LittleEndian>(checksum(&payload))?;
    out.write_all(&payload)?;

    std::fs::write(path, out)?;
    Ok(())
}

fn rd_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, FileError> {
    cur.read_u8().map_err(|_| FileError::Truncated)
}

fn rd_u32(cur: &mut Cursor<&[u8]>) -> Result<u32, FileError> {
    cur.read_u32::<LittleEndian>()
        .map_err(|_| FileError::Truncated)
}

fn rd_text(cur: &mut Cursor<&[u8]>) -> Result<String, FileError> {
    let len = rd_u32(cur)? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf).map_err(|_| FileError::Truncated)?;
    if rd_u8(cur)? != 0 {
        return Err(FileError::Malformed);
    }
    String::from_utf8(buf).map_err(|_| FileError::Malformed)
}

/// Loads a program, validating magic, version and checksum.
pub fn read_file(path: &Path) -> Result<Program, FileError> {
    let raw = std::fs::read(path)?;
    if raw.len() < 24 {
        return Err(FileError::Truncated);
    }

    if raw[0..4] != MAGIC {
        return Err(FileError::BadMagic);
    }

    let mut header = Cursor::new(&raw[4..24]);
    let version = rd_u32(&mut header)?;
    if version != VERSION {
        return Err(FileError::BadVersion(version));
    }
    let const_count = rd_u32(&mut header)?;
    let sym_count = rd_u32(&mut header)?;
    let code_len = rd_u32(&mut header)? as usize;
    let stored_crc = rd_u32(&mut header)?;

    let payload = &raw[24..];
    if checksum(payload) != stored_crc {
        return Err(FileError::BadChecksum);
    }

    let mut cur = Cursor::new(payload);
    let mut prog = Program::new();

    for _ in 0..const_count {
        let val = match rd_u8(&mut cur)? {
            TAG_VOID => Value::Void,
            TAG_BOOL => Value::Bool(rd_u8(&mut cur)? != 0),
            TAG_INT => Value::Int(
                cur.read_i64::<LittleEndian>()
                    .map_err(|_| FileError::Truncated)?,
            ),
            TAG_REAL => Value::Real(
                cur.read_f64::<LittleEndian>()
                    .map_err(|_| FileError::Truncated)?,
            ),
            TAG_CHAR => {
                let code = rd_u32(&mut cur)?;
                Value::Char(char::from_u32(code).ok_or(FileError::Malformed)?)
            }
            TAG_STR => Value::Str(rd_text(&mut cur)?.into()),
            _ => return Err(FileError::Malformed),
        };
        prog.write_rodata(val);
    }

    for _ in 0..sym_count {
        let name = rd_text(&mut cur)?;
        prog.write_symtable(Symbol::new(&name));
    }

    let consumed = cur.position() as usize;
    if payload.len() - consumed != code_len {
        return Err(FileError::Truncated);
    }
    prog.bytes.extend_from_slice(&payload[consumed..]);

    Ok(prog)
}
