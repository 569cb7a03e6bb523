use core::fmt;

use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::rdef::{parse_rdef_chunk, RdefChunk};

// magic + checksum + reserved + total_size + chunk_count
const HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4;
const CHUNK_HEADER_LEN: usize = 8;
// Real containers carry a handful of chunks; anything near this is hostile input.
const MAX_CHUNK_COUNT: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Always [`FourCC::DXBC`] for a parsed container.
    pub magic: FourCC,
    /// Checksum stored in the header. Not validated.
    pub checksum: [u8; 16],
    /// Declared size of the whole container in bytes.
    pub total_size: u32,
    /// Number of entries in the chunk offset table.
    pub chunk_count: u32,
}

/// One chunk of a container.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// Chunk identifier.
    pub fourcc: FourCC,
    /// Chunk payload, excluding the 8-byte chunk header.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DxbcChunk")
            .field("fourcc", &self.fourcc)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A validated, borrowed view of a `DXBC` container.
///
/// [`DxbcFile::parse`] checks every chunk offset and size up front, so iteration afterwards
/// cannot fail.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunks: Vec<(usize, usize, FourCC)>,
}

impl<'a> DxbcFile<'a> {
    /// Parses and validates a container.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        if bytes.len() < HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "need at least {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = FourCC(read_array(bytes, 0, "magic")?);
        if magic != FourCC::DXBC {
            return Err(DxbcError::malformed_header(format!(
                "bad magic {magic}, expected {}",
                FourCC::DXBC
            )));
        }
        let checksum: [u8; 16] = read_array(bytes, 4, "checksum")?;
        let total_size = read_u32(bytes, 24, "total_size")?;
        let chunk_count = read_u32(bytes, 28, "chunk_count")?;

        if chunk_count > MAX_CHUNK_COUNT {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk_count {chunk_count} exceeds maximum {MAX_CHUNK_COUNT}"
            )));
        }
        let total = total_size as usize;
        if total < HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "total_size {total_size} is smaller than the header"
            )));
        }
        if total > bytes.len() {
            return Err(DxbcError::out_of_bounds(format!(
                "total_size {total_size} exceeds buffer length {}",
                bytes.len()
            )));
        }
        let bytes = &bytes[..total];

        let table_end = HEADER_LEN + chunk_count as usize * 4;
        if table_end > bytes.len() {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk offset table ends at {table_end}, past total_size {total}"
            )));
        }

        let mut chunks = Vec::with_capacity(chunk_count as usize);
        for i in 0..chunk_count as usize {
            let offset = read_u32(bytes, HEADER_LEN + i * 4, "chunk offset")? as usize;
            if offset < table_end {
                return Err(DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {offset} points into the header or offset table"
                )));
            }
            let data_start = offset
                .checked_add(CHUNK_HEADER_LEN)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    DxbcError::out_of_bounds(format!(
                        "chunk {i} header at {offset} is outside total_size {total}"
                    ))
                })?;
            let fourcc = FourCC(read_array(bytes, offset, "chunk fourcc")?);
            let size = read_u32(bytes, offset + 4, "chunk size")? as usize;
            let data_end = data_start
                .checked_add(size)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    DxbcError::out_of_bounds(format!(
                        "chunk {i} ({fourcc}) of {size} bytes at {data_start} is outside total_size {total}"
                    ))
                })?;
            chunks.push((data_start, data_end, fourcc));
        }

        Ok(DxbcFile {
            bytes,
            header: DxbcHeader {
                magic,
                checksum,
                total_size,
                chunk_count,
            },
            chunks,
        })
    }

    /// Returns the container header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Returns the bytes covered by the declared `total_size`.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates over all chunks in file order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        let bytes = self.bytes;
        self.chunks
            .iter()
            .map(move |&(start, end, fourcc)| DxbcChunk {
                fourcc,
                data: &bytes[start..end],
            })
    }

    /// Returns the first chunk with the given identifier.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// Returns the first shader bytecode chunk (`SHEX` or `SHDR`).
    pub fn find_first_shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.chunks()
            .find(|chunk| chunk.fourcc == FourCC::SHEX || chunk.fourcc == FourCC::SHDR)
    }

    /// Parses the first resource definition chunk.
    ///
    /// `RDEF` chunks are tried first in file order; if none parses, `RD11` chunks are tried.
    /// Returns `None` only when neither ID is present. When every candidate fails, the first
    /// error is returned.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let mut first_err = None;
        for kind in [FourCC::RDEF, FourCC::RD11] {
            for chunk in self.chunks().filter(|c| c.fourcc == kind) {
                match parse_rdef_chunk(chunk.data) {
                    Ok(rdef) => return Some(Ok(rdef)),
                    Err(err) => {
                        first_err.get_or_insert_with(|| {
                            DxbcError::invalid_chunk(format!("{kind} chunk: {}", err.context()))
                        });
                    }
                }
            }
        }
        first_err.map(Err)
    }

    /// One-line-per-chunk summary, used in logs.
    pub fn debug_summary(&self) -> String {
        use core::fmt::Write as _;

        let mut out = format!(
            "{} total_size={} chunk_count={}",
            self.header.magic, self.header.total_size, self.header.chunk_count
        );
        for (idx, chunk) in self.chunks().enumerate() {
            let _ = write!(out, "\n  [{idx:02}] {} {} bytes", chunk.fourcc, chunk.data.len());
        }
        out
    }
}

fn read_array<const N: usize>(
    bytes: &[u8],
    offset: usize,
    what: &str,
) -> Result<[u8; N], DxbcError> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            DxbcError::malformed_header(format!(
                "need {N} bytes for {what} at {offset}, buffer length is {}",
                bytes.len()
            ))
        })
}

fn read_u32(bytes: &[u8], offset: usize, what: &str) -> Result<u32, DxbcError> {
    read_array::<4>(bytes, offset, what).map(u32::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_container;

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_container(&[]);
        bytes[0] = b'X';
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::MalformedHeader { .. }), "{err}");
    }

    #[test]
    fn rejects_chunk_running_past_total_size() {
        let mut bytes = build_container(&[(FourCC::SHDR, &[0u8; 8])]);
        // Inflate the chunk size field of the only chunk.
        let chunk_offset = u32::from_le_bytes(bytes[32..36].try_into().unwrap()) as usize;
        bytes[chunk_offset + 4..chunk_offset + 8].copy_from_slice(&64u32.to_le_bytes());
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::OutOfBounds { .. }), "{err}");
    }

    #[test]
    fn rejects_offset_into_table() {
        let mut bytes = build_container(&[(FourCC::SHDR, &[0u8; 4])]);
        bytes[32..36].copy_from_slice(&8u32.to_le_bytes());
        let err = DxbcFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, DxbcError::MalformedOffsets { .. }), "{err}");
    }

    #[test]
    fn trailing_bytes_past_total_size_are_ignored() {
        let mut bytes = build_container(&[(FourCC::SHEX, &[1, 2, 3, 4])]);
        bytes.extend_from_slice(&[0xAA; 16]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.bytes().len(), bytes.len() - 16);
        assert_eq!(file.find_first_shader_chunk().unwrap().data, &[1, 2, 3, 4]);
    }

    #[test]
    fn get_rdef_reports_none_without_chunk() {
        let bytes = build_container(&[(FourCC::SHDR, &[0u8; 8])]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert!(file.get_rdef().is_none());
    }
}
