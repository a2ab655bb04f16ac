use crate::chunk::section::Section;
use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};

/// Magic word in the second header slot.
pub const WORLD_MAGIC: u32 = 0x1A00_02E5;

/// Header size: unused word, magic, then 7 section pointers.
pub const HEADER_SIZE: usize = 9 * 4;

/// Header word index of the main block pointer.
const MAIN_SLOT: usize = 2;

/// Fixed header of a world file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldHeader {
    /// First word. Not interpreted, but carried through.
    pub unused: u32,
    pub main_block: u32,
    /// Pointers to the trailing sections, in [`Section::ALL`] order.
    pub sections: [u32; 6],
}

impl WorldHeader {
    /// Parse and validate the header.
    ///
    /// Every pointer must land inside `[HEADER_SIZE, data.len()]`; anything
    /// else is a structural failure and nothing else is read.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(data);
        let unused = c.read_u32()?;
        let magic = c.read_u32()?;
        if magic != WORLD_MAGIC {
            return Err(Error::InvalidMagic {
                expected: WORLD_MAGIC,
                found: magic,
            });
        }
        let main_block = c.read_u32()?;
        let mut sections = [0u32; 6];
        for slot in &mut sections {
            *slot = c.read_u32()?;
        }

        let header = Self {
            unused,
            main_block,
            sections,
        };
        header.validate(data.len())?;
        Ok(header)
    }

    fn validate(&self, file_len: usize) -> Result<()> {
        let named = std::iter::once(("main block", self.main_block)).chain(
            Section::ALL
                .iter()
                .zip(self.sections)
                .map(|(s, p)| (s.key(), p)),
        );
        for (section, pointer) in named {
            if (pointer as usize) < HEADER_SIZE || pointer as usize > file_len {
                return Err(Error::SectionPointer {
                    section,
                    pointer,
                    min: HEADER_SIZE,
                    max: file_len,
                });
            }
        }
        Ok(())
    }

    /// Write a header with zeroed pointers, to be backpatched.
    pub fn write_placeholder(unused: u32, w: &mut Writer) {
        w.write_u32(unused);
        w.write_u32(WORLD_MAGIC);
        for _ in 0..7 {
            w.write_u32(0);
        }
    }

    /// Backpatch the main block pointer of a header written at offset 0.
    pub fn patch_main_block(w: &mut Writer, pointer: u32) {
        w.patch_u32(MAIN_SLOT * 4, pointer);
    }

    /// Backpatch the pointer of `section` in a header written at offset 0.
    pub fn patch_section(w: &mut Writer, section: Section, pointer: u32) {
        w.patch_u32((MAIN_SLOT + 1 + section.index()) * 4, pointer);
    }
}
