//! Binary index file.
//!
//! Layout, all integers in the writing platform's byte order:
//!
//! ```text
//! i32    document count
//! usize  number of entries
//! per entry:
//!   usize  term length in bytes
//!   [u8]   term bytes
//!   usize  postings count
//!   [i32]  postings
//! ```
//!
//! `usize` fields are as wide as the platform's `usize`. There is no version tag
//! or checksum; loading instead rejects truncated or inconsistent streams.

use crate::error::Result;
use crate::index::{DocId, InvertedIndex};
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::Path;

const USIZE_BYTES: usize = size_of::<usize>();
// Cap on speculative allocation driven by length fields.
const MAX_PREALLOC: usize = 1 << 16;

fn invalid(msg: impl Into<String>) -> io::Error { io::Error::new(io::ErrorKind::InvalidData, msg.into()) }

fn write_len<W: Write>(w: &mut W, n: usize) -> io::Result<()> { w.write_uint::<NativeEndian>(n as u64, USIZE_BYTES) }

fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    let n = r.read_uint::<NativeEndian>(USIZE_BYTES)?;
    usize::try_from(n).map_err(|_| invalid(format!("length {n} does not fit in usize")))
}

fn write_id<W: Write>(w: &mut W, id: DocId) -> io::Result<()> {
    let id = i32::try_from(id).map_err(|_| invalid(format!("document id {id} exceeds i32")))?;
    w.write_i32::<NativeEndian>(id)
}

fn read_id<R: Read>(r: &mut R) -> io::Result<DocId> {
    let id = r.read_i32::<NativeEndian>()?;
    DocId::try_from(id).map_err(|_| invalid(format!("negative document id {id}")))
}

/// Serialize `index`. Terms are written in sorted order so equal indexes produce equal bytes.
pub fn write_index<W: Write>(index: &InvertedIndex, mut w: W) -> Result<()> {
    write_id(&mut w, index.get_document_count())?;
    let mut entries: Vec<_> = index.entries().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    write_len(&mut w, entries.len())?;
    for (term, postings) in entries {
        write_len(&mut w, term.len())?;
        w.write_all(term.as_bytes())?;
        write_len(&mut w, postings.len())?;
        for &id in postings {
            write_id(&mut w, id)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Deserialize an index, failing on truncation, trailing bytes or postings that
/// would break the evaluator's ordering assumptions.
pub fn read_index<R: Read>(mut r: R) -> Result<InvertedIndex> {
    let num_docs = read_id(&mut r)?;
    let num_entries = read_len(&mut r)?;
    let mut postings: HashMap<String, Vec<DocId>> = HashMap::with_capacity(num_entries.min(MAX_PREALLOC));
    for _ in 0..num_entries {
        let term = read_term(&mut r)?;
        let count = read_len(&mut r)?;
        let mut list = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let id = read_id(&mut r)?;
            if id >= num_docs {
                return Err(invalid(format!("document id {id} in '{term}' is not below count {num_docs}")).into());
            }
            if list.last().is_some_and(|&prev| prev >= id) {
                return Err(invalid(format!("postings for '{term}' are not strictly ascending")).into());
            }
            list.push(id);
        }
        if postings.insert(term.clone(), list).is_some() {
            return Err(invalid(format!("duplicate term '{term}'")).into());
        }
    }
    let mut trailing = [0u8; 1];
    if r.read(&mut trailing)? != 0 {
        return Err(invalid("trailing bytes after last entry").into());
    }
    Ok(InvertedIndex::from_parts(postings, num_docs))
}

fn read_term<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_len(r)?;
    let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC));
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("term truncated at {} of {len} bytes", bytes.len())));
    }
    String::from_utf8(bytes).map_err(|e| invalid(format!("term is not valid UTF-8: {e}")))
}

pub fn save_index<P: AsRef<Path>>(index: &InvertedIndex, path: P) -> Result<()> {
    let f = File::create(path.as_ref())?;
    write_index(index, BufWriter::new(f))?;
    tracing::info!(path = %path.as_ref().display(), num_docs = index.get_document_count(), num_terms = index.num_terms(), "saved index");
    Ok(())
}

pub fn load_index<P: AsRef<Path>>(path: P) -> Result<InvertedIndex> {
    let f = File::open(path.as_ref())?;
    let index = read_index(BufReader::new(f))?;
    tracing::info!(path = %path.as_ref().display(), num_docs = index.get_document_count(), num_terms = index.num_terms(), "loaded index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    fn sample() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_document(["a", "b"]);
        index.add_document(["b", "c"]);
        index
    }

    fn encode(index: &InvertedIndex) -> Vec<u8> {
        let mut buf = Vec::new();
        write_index(index, &mut buf).unwrap();
        buf
    }

    fn io_kind(err: QueryError) -> io::ErrorKind {
        match err {
            QueryError::Io(e) => e.kind(),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn layout_of_single_entry() {
        let mut index = InvertedIndex::new();
        index.add_document(["hi"]);
        let buf = encode(&index);
        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_ne_bytes());
        expected.extend_from_slice(&1usize.to_ne_bytes());
        expected.extend_from_slice(&2usize.to_ne_bytes());
        expected.extend_from_slice(b"hi");
        expected.extend_from_slice(&1usize.to_ne_bytes());
        expected.extend_from_slice(&0i32.to_ne_bytes());
        assert_eq!(buf, expected);
    }

    #[test]
    fn decode_restores_state() {
        let index = sample();
        let decoded = read_index(encode(&index).as_slice()).unwrap();
        assert_eq!(decoded, index);
        assert_eq!(decoded.get_document_count(), 2);
        assert_eq!(decoded.get_postings("b"), vec![0, 1]);
    }

    #[test]
    fn every_truncation_is_rejected() {
        let buf = encode(&sample());
        for cut in 0..buf.len() {
            let err = read_index(&buf[..cut]).unwrap_err();
            assert_eq!(io_kind(err), io::ErrorKind::UnexpectedEof, "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = encode(&sample());
        buf.push(0);
        assert_eq!(io_kind(read_index(buf.as_slice()).unwrap_err()), io::ErrorKind::InvalidData);
    }

    #[test]
    fn out_of_range_and_unsorted_postings_are_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2i32.to_ne_bytes());
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(b"x");
        buf.extend_from_slice(&2usize.to_ne_bytes());
        buf.extend_from_slice(&1i32.to_ne_bytes());
        buf.extend_from_slice(&0i32.to_ne_bytes());
        assert_eq!(io_kind(read_index(buf.as_slice()).unwrap_err()), io::ErrorKind::InvalidData);

        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_ne_bytes());
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(b"x");
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(&5i32.to_ne_bytes());
        assert_eq!(io_kind(read_index(buf.as_slice()).unwrap_err()), io::ErrorKind::InvalidData);
    }

    #[test]
    fn huge_length_field_does_not_allocate() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_ne_bytes());
        buf.extend_from_slice(&1usize.to_ne_bytes());
        buf.extend_from_slice(&usize::MAX.to_ne_bytes());
        assert_eq!(io_kind(read_index(buf.as_slice()).unwrap_err()), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn negative_document_count_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-1i32).to_ne_bytes());
        buf.extend_from_slice(&0usize.to_ne_bytes());
        assert_eq!(io_kind(read_index(buf.as_slice()).unwrap_err()), io::ErrorKind::InvalidData);
    }
}
