use super::error::DnsError;
use super::layout;

pub struct DnsReader<'a> {
    payload: &'a [u8],
}

impl<'a> DnsReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), DnsError> {
        if self.payload.len() < needed {
            return Err(DnsError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DnsError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(DnsError::TooShort {
                needed: offset + 1,
                actual: self.payload.len(),
            })
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, DnsError> {
        let bytes = self.read_slice(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&self, offset: usize) -> Result<u32, DnsError> {
        let bytes = self.read_slice(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DnsError> {
        let end = offset.checked_add(len).ok_or(DnsError::NameTooLong)?;
        self.payload.get(offset..end).ok_or(DnsError::TooShort {
            needed: end,
            actual: self.payload.len(),
        })
    }

    /// Read a possibly-compressed name starting at `offset`.
    ///
    /// Returns the rendered name (labels joined with dots, trailing dot) and
    /// the offset of the first byte after the name in the *uncompressed*
    /// stream, i.e. after the terminator or the first pointer.
    pub fn read_name(&self, offset: usize) -> Result<(String, usize), DnsError> {
        let mut name = String::new();
        let mut cursor = offset;
        let mut next = None;
        let mut jumps = 0usize;

        loop {
            let len = self.read_u8(cursor)?;
            if len & layout::POINTER_MASK == layout::POINTER_MASK {
                let pointer = self.read_u16_be(cursor)? & layout::POINTER_OFFSET_MASK;
                if next.is_none() {
                    next = Some(cursor + 2);
                }
                jumps += 1;
                if jumps > layout::MAX_POINTER_JUMPS {
                    return Err(DnsError::PointerLoop);
                }
                cursor = pointer as usize;
                continue;
            }
            if len == 0 {
                if name.is_empty() {
                    name.push('.');
                }
                return Ok((name, next.unwrap_or(cursor + 1)));
            }
            let label = self.read_slice(cursor + 1, len as usize)?;
            if name.len() + label.len() + 1 > layout::MAX_NAME_LEN {
                return Err(DnsError::NameTooLong);
            }
            name.push_str(&String::from_utf8_lossy(label));
            name.push('.');
            cursor += 1 + len as usize;
        }
    }
}
