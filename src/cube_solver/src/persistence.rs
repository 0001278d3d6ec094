//! On-disk table cache. One file per table, `<name>.tbl`, little endian:
//!
//! - 4 bytes: magic `CUBT`
//! - u16 + bytes: version string
//! - u8: table kind (0 = move table, 1 = pattern database)
//! - u32: coordinate space size
//! - u32: move set bits
//! - u8: max depth (the cap of a pattern database, 0 for move tables)
//! - 16 x u64: population per depth (zero for move tables)
//! - u64 + bytes: payload
//! - u64: fxhash of the payload
//!
//! Move table payloads are dense u32 arrays, pattern database payloads are
//! the packed nibbles.

use crate::{
    error::TableError,
    move_table::MoveTable,
    pruning::{PatternDatabase, PatternDbSpec},
};
use cube_core::{Coord, MoveSet};
use log::debug;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

const MAGIC: &[u8; 4] = b"CUBT";
/// Bump whenever the layout or any coordinate numbering changes.
pub const VERSION: &str = "cubesearch-tables/1";
const POPULATIONS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TableKind {
    MoveTable = 0,
    PatternDatabase = 1,
}

/// Everything in a file except the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableHeader {
    pub kind: TableKind,
    pub size: u32,
    pub moves: MoveSet,
    pub max_depth: u8,
    pub populations: [u64; POPULATIONS],
}

impl TableHeader {
    fn for_move_table(coord: Coord) -> Self {
        Self {
            kind: TableKind::MoveTable,
            size: coord.size(),
            moves: coord.natural_moves(),
            max_depth: 0,
            populations: [0; POPULATIONS],
        }
    }

    fn for_pattern_db(spec: &PatternDbSpec) -> Self {
        Self {
            kind: TableKind::PatternDatabase,
            size: spec.size(),
            moves: spec.moves,
            max_depth: spec.cap,
            populations: [0; POPULATIONS],
        }
    }

    /// Why `self`, read from disk, cannot stand in for `expected`.
    fn mismatch(&self, expected: &Self) -> Option<String> {
        if self.kind != expected.kind {
            Some(format!("kind {:?}, expected {:?}", self.kind, expected.kind))
        } else if self.size != expected.size {
            Some(format!("size {}, expected {}", self.size, expected.size))
        } else if self.moves != expected.moves {
            Some(format!(
                "move set {:#x}, expected {:#x}",
                self.moves.bits(),
                expected.moves.bits()
            ))
        } else if self.max_depth != expected.max_depth {
            Some(format!(
                "max depth {}, expected {}",
                self.max_depth, expected.max_depth
            ))
        } else {
            None
        }
    }
}

#[must_use]
pub fn table_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.tbl"))
}

fn encode(header: &TableHeader, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 192);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&(VERSION.len() as u16).to_le_bytes());
    bytes.extend_from_slice(VERSION.as_bytes());
    bytes.push(header.kind as u8);
    bytes.extend_from_slice(&header.size.to_le_bytes());
    bytes.extend_from_slice(&header.moves.bits().to_le_bytes());
    bytes.push(header.max_depth);
    for population in header.populations {
        bytes.extend_from_slice(&population.to_le_bytes());
    }
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&fxhash::hash64(payload).to_le_bytes());
    bytes
}

/// A cursor over a file's bytes. Every read fails with a description of
/// what was cut short.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], String> {
        if self.bytes.len() < n {
            return Err(format!("truncated while reading {what}"));
        }
        let (taken, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(taken)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], String> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N, what)?);
        Ok(array)
    }

    fn u8(&mut self, what: &str) -> Result<u8, String> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, String> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32, String> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &str) -> Result<u64, String> {
        self.array(what).map(u64::from_le_bytes)
    }
}

fn decode(bytes: &[u8]) -> Result<(TableHeader, &[u8]), String> {
    let mut reader = Reader { bytes };
    if reader.take(MAGIC.len(), "magic")? != MAGIC {
        return Err("bad magic".to_owned());
    }
    let version_len = reader.u16("version length")?;
    let version = reader.take(usize::from(version_len), "version")?;
    if version != VERSION.as_bytes() {
        return Err(format!(
            "version `{}`, expected `{VERSION}`",
            String::from_utf8_lossy(version)
        ));
    }
    let kind = match reader.u8("kind")? {
        0 => TableKind::MoveTable,
        1 => TableKind::PatternDatabase,
        other => return Err(format!("unknown table kind {other}")),
    };
    let size = reader.u32("size")?;
    let moves = MoveSet::from_bits(reader.u32("move set")?).ok_or("invalid move set")?;
    let max_depth = reader.u8("max depth")?;
    let mut populations = [0; POPULATIONS];
    for population in &mut populations {
        *population = reader.u64("populations")?;
    }
    let payload_len = usize::try_from(reader.u64("payload length")?)
        .map_err(|_| "payload length overflows".to_owned())?;
    let payload = reader.take(payload_len, "payload")?;
    let checksum = reader.u64("checksum")?;
    if checksum != fxhash::hash64(payload) {
        return Err("checksum mismatch".to_owned());
    }
    if !reader.bytes.is_empty() {
        return Err(format!("{} trailing bytes", reader.bytes.len()));
    }
    Ok((
        TableHeader {
            kind,
            size,
            moves,
            max_depth,
            populations,
        },
        payload,
    ))
}

/// Writes to a sibling temporary file first so a crash never leaves a
/// half-written table under the real name.
fn write_table(dir: &Path, name: &str, header: &TableHeader, payload: &[u8]) -> Result<(), TableError> {
    fs::create_dir_all(dir)?;
    let path = table_path(dir, name);
    let tmp = path.with_extension("tbl.tmp");
    {
        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(&encode(header, payload))?;
        file.flush()?;
    }
    fs::rename(&tmp, &path)?;
    debug!("Wrote {} ({} bytes of payload)", path.display(), payload.len());
    Ok(())
}

/// Reads a table file and checks it against `expected`. A missing file is
/// `Ok(None)`.
fn read_table(
    dir: &Path,
    name: &str,
    expected: &TableHeader,
) -> Result<Option<(TableHeader, Vec<u8>)>, TableError> {
    let bytes = match fs::read(table_path(dir, name)) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mismatch = |reason: String| TableError::LoadMismatch {
        name: name.to_owned(),
        reason,
    };
    let (header, payload) = decode(&bytes).map_err(mismatch)?;
    if let Some(reason) = header.mismatch(expected) {
        return Err(mismatch(reason));
    }
    Ok(Some((header, payload.to_vec())))
}

/// # Errors
///
/// Fails on any I/O error.
pub fn save_move_table(dir: &Path, table: &MoveTable) -> Result<(), TableError> {
    let payload = table
        .data()
        .iter()
        .flat_map(|value| value.to_le_bytes())
        .collect::<Vec<_>>();
    write_table(
        dir,
        &table.name(),
        &TableHeader::for_move_table(table.coord()),
        &payload,
    )
}

/// # Errors
///
/// Fails on an I/O error, or with [`TableError::LoadMismatch`] when the file
/// does not hold the move table of `coord`.
pub fn load_move_table(dir: &Path, coord: Coord) -> Result<Option<MoveTable>, TableError> {
    let name = MoveTable::name_of(coord);
    let Some((header, payload)) = read_table(dir, &name, &TableHeader::for_move_table(coord))? else {
        return Ok(None);
    };
    if payload.len() % 4 != 0 {
        return Err(TableError::LoadMismatch {
            name,
            reason: "payload is not a whole number of entries".to_owned(),
        });
    }
    let data = payload
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    MoveTable::from_raw(coord, header.moves, data).map(Some)
}

/// # Errors
///
/// Fails on any I/O error.
pub fn save_pattern_db(dir: &Path, db: &PatternDatabase) -> Result<(), TableError> {
    let mut header = TableHeader::for_pattern_db(db.spec());
    header.populations = *db.populations();
    write_table(dir, db.spec().name(), &header, db.as_bytes())
}

/// # Errors
///
/// Fails on an I/O error, or with [`TableError::LoadMismatch`] when the file
/// was built for a different coordinate space, move set or cap.
pub fn load_pattern_db(
    dir: &Path,
    spec: &PatternDbSpec,
) -> Result<Option<PatternDatabase>, TableError> {
    let Some((header, payload)) = read_table(dir, spec.name(), &TableHeader::for_pattern_db(spec))?
    else {
        return Ok(None);
    };
    PatternDatabase::from_raw(*spec, payload, header.populations).map(Some)
}
