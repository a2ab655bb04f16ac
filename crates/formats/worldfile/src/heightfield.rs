//! Run-length encoded terrain grid (heights, triangle types and light).
//!
//! A 96-byte header is followed by a stream of runs over the row-major cell
//! sequence. Literal runs carry cells; skip runs stand for cells left at the
//! header defaults. Only cells near a triangle are stored, so encoding is
//! lossy for anything else.

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};

pub const TERRAIN_SIGNATURE: u32 = 0x0000_66AB;
pub const TERRAIN_HEADER_SIZE: usize = 96;

/// Version written by every save. Cells are 8 bytes.
pub const STANDARD_VERSION: u32 = 7;
/// Older files with a trailing pad byte on every cell.
pub const LEGACY_VERSION: u32 = 6;

pub const EMPTY_TRIANGLE: u8 = 0;
/// Light of cells not present in the stream.
pub const DEFAULT_LIGHT: [u8; 3] = [255, 0, 255];

const TEXTURE_FIELD: usize = 32;
const MAX_RUN: usize = 128;
const CELL_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainHeader {
    pub x_offset: f32,
    pub y_offset: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub width: i32,
    pub height: i32,
    pub stretch: f32,
    pub scale: f32,
    /// Constants older tools wrote and nothing reads.
    pub legacy: [f32; 6],
    pub version: u32,
    pub texture: String,
}

impl Default for TerrainHeader {
    fn default() -> Self {
        Self {
            x_offset: 0.0,
            y_offset: 0.0,
            min_height: 0.0,
            max_height: 0.0,
            width: 0,
            height: 0,
            stretch: 1.0,
            scale: 1.0,
            legacy: [0.0; 6],
            version: STANDARD_VERSION,
            texture: String::new(),
        }
    }
}

impl TerrainHeader {
    fn read(c: &mut Cursor<'_>) -> Result<Self> {
        let signature = c.read_u32()?;
        if signature != TERRAIN_SIGNATURE {
            return Err(Error::InvalidMagic {
                expected: TERRAIN_SIGNATURE,
                found: signature,
            });
        }
        let x_offset = c.read_f32()?;
        let y_offset = c.read_f32()?;
        let min_height = c.read_f32()?;
        let max_height = c.read_f32()?;
        let width = c.read_i32()?;
        let height = c.read_i32()?;
        let stretch = c.read_f32()?;
        let scale = c.read_f32()?;
        let mut legacy = [0.0; 6];
        for v in &mut legacy {
            *v = c.read_f32()?;
        }
        let version = c.read_u32()?;
        let texture = c.read_fixed_string(TEXTURE_FIELD)?;
        Ok(Self {
            x_offset,
            y_offset,
            min_height,
            max_height,
            width,
            height,
            stretch,
            scale,
            legacy,
            version,
            texture,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        w.write_u32(TERRAIN_SIGNATURE);
        w.write_f32(self.x_offset);
        w.write_f32(self.y_offset);
        w.write_f32(self.min_height);
        w.write_f32(self.max_height);
        w.write_i32(self.width);
        w.write_i32(self.height);
        w.write_f32(self.stretch);
        w.write_f32(self.scale);
        for v in self.legacy {
            w.write_f32(v);
        }
        w.write_u32(STANDARD_VERSION);
        w.write_fixed_string(&self.texture, TEXTURE_FIELD)
    }

    /// Grid dimensions, rejecting non-positive or overflowing sizes.
    fn dimensions(&self) -> Result<(usize, usize)> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::Terrain(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        let (w, h) = (self.width as usize, self.height as usize);
        w.checked_mul(h)
            .ok_or_else(|| Error::Terrain(format!("{w}x{h} grid is too large")))?;
        Ok((w, h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainCell {
    pub height: f32,
    pub triangle: u8,
    pub light: [u8; 3],
}

impl TerrainCell {
    /// A cell as it reads when no run covers it.
    pub fn empty(min_height: f32) -> Self {
        Self {
            height: min_height,
            triangle: EMPTY_TRIANGLE,
            light: DEFAULT_LIGHT,
        }
    }

    fn read(c: &mut Cursor<'_>, legacy: bool) -> Result<Self> {
        let height = c.read_f32()?;
        let triangle = c.read_u8()?;
        let light = [c.read_u8()?, c.read_u8()?, c.read_u8()?];
        if legacy {
            c.skip(1)?;
        }
        Ok(Self {
            height,
            triangle,
            light,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_f32(self.height);
        w.write_u8(self.triangle);
        w.write_bytes(&self.light);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Terrain {
    pub header: TerrainHeader,
    cells: Vec<TerrainCell>,
}

impl Terrain {
    /// An empty grid with a default header.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let too_large = |_| Error::Terrain(format!("{width}x{height} grid is too large"));
        let header = TerrainHeader {
            width: i32::try_from(width).map_err(too_large)?,
            height: i32::try_from(height).map_err(too_large)?,
            ..TerrainHeader::default()
        };
        let (w, h) = header.dimensions()?;
        let cells = empty_cells(header.min_height, w * h)?;
        Ok(Self { header, cells })
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(data);
        let mut header = TerrainHeader::read(&mut c)?;
        let legacy = match header.version {
            STANDARD_VERSION => false,
            LEGACY_VERSION => true,
            v => return Err(Error::Terrain(format!("unsupported version {v}"))),
        };
        let (w, h) = header.dimensions()?;
        let total = w * h;
        // Every control byte covers at most MAX_RUN cells.
        if total > c.remaining().saturating_mul(MAX_RUN) {
            return Err(Error::Terrain(format!(
                "{w}x{h} grid cannot be covered by {} bytes of runs",
                c.remaining()
            )));
        }
        let mut cells = empty_cells(header.min_height, total)?;

        let mut index = 0;
        while index < total {
            let at = c.position();
            let control = c.read_u8()?;
            let (literal, count) = if control < 0x80 {
                (true, control as usize + 1)
            } else {
                (false, 256 - control as usize)
            };
            if index + count > total {
                return Err(Error::Terrain(format!(
                    "run of {count} at {at:#x} passes the end of a {total}-cell grid"
                )));
            }
            if literal {
                for cell in &mut cells[index..index + count] {
                    *cell = TerrainCell::read(&mut c, legacy)?;
                }
            }
            index += count;
        }
        if !c.is_empty() {
            log::debug!("[terrain] {} trailing bytes ignored", c.remaining());
        }

        header.version = STANDARD_VERSION;
        Ok(Self { header, cells })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let (w, h) = self.header.dimensions()?;
        if self.cells.len() != w * h {
            return Err(Error::Terrain(format!(
                "{} cells for a {w}x{h} grid",
                self.cells.len()
            )));
        }

        let mut out = Writer::with_capacity(TERRAIN_HEADER_SIZE + self.cells.len() * CELL_SIZE);
        self.header.write(&mut out)?;

        let mut index = 0;
        while index < self.cells.len() {
            let active = self.is_active(index % w, index / w);
            let mut end = index + 1;
            while end < self.cells.len()
                && end - index < MAX_RUN
                && self.is_active(end % w, end / w) == active
            {
                end += 1;
            }
            let count = end - index;
            if active {
                out.write_u8((count - 1) as u8);
                for cell in &self.cells[index..end] {
                    cell.write(&mut out);
                }
            } else {
                out.write_u8((256 - count) as u8);
            }
            index = end;
        }
        Ok(out.into_bytes())
    }

    pub fn width(&self) -> usize {
        self.header.width.max(0) as usize
    }

    pub fn height(&self) -> usize {
        self.header.height.max(0) as usize
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&TerrainCell> {
        if x >= self.width() {
            return None;
        }
        self.cells.get(y * self.width() + x)
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut TerrainCell> {
        if x >= self.width() {
            return None;
        }
        let width = self.width();
        self.cells.get_mut(y * width + x)
    }

    /// Whether `(x, y)` is stored literally: its own triangle or that of its
    /// left, lower or lower-left neighbour is non-empty. Edge cells check
    /// only the neighbours that exist.
    pub fn is_active(&self, x: usize, y: usize) -> bool {
        let filled = |x: usize, y: usize| {
            self.cell(x, y).is_some_and(|c| c.triangle != EMPTY_TRIANGLE)
        };
        filled(x, y)
            || (x > 0 && filled(x - 1, y))
            || (y > 0 && filled(x, y - 1))
            || (x > 0 && y > 0 && filled(x - 1, y - 1))
    }

    /// Coordinates of every active cell in row-major order.
    pub fn active_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width();
        (0..self.cells.len())
            .map(move |i| (i % w, i / w))
            .filter(|&(x, y)| self.is_active(x, y))
    }
}

fn empty_cells(min_height: f32, total: usize) -> Result<Vec<TerrainCell>> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(total)
        .map_err(|e| Error::Terrain(format!("cannot allocate {total} cells: {e}")))?;
    cells.resize(total, TerrainCell::empty(min_height));
    Ok(cells)
}
