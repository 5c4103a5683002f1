use std::path::Path;
use std::sync::Arc;

use tilepack_codec::{DecodeError, Decoder, EncodeError, Encoder, Packed, Tag, Value};

use crate::tileset::{Tileset, TilesetCache};

/// Registered name of [`TileLayer`].
pub const TILE_LAYER_TYPE: &str = "game_types::TileLayer";

/// Every cell is a non-negative tile index, so all cells share this tag.
const CELL_TAG: Tag = Tag::UInt;

/// A rectangular grid of tile indices drawn from one tileset.
///
/// Cells are stored row-major. A layer either has cells or is 0x0. Packed layout:
///
/// ```text
/// cell tag | width | height | tileset name | width*height untagged cells
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    width: usize,
    height: usize,
    cells: Vec<u32>,
    tileset: Arc<Tileset>,
}

impl TileLayer {
    /// A `width` x `height` layer filled with tile 0. A zero dimension
    /// gives an empty 0x0 layer.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize, tileset: Arc<Tileset>) -> Self {
        let Some(count) = width.checked_mul(height) else {
            panic!("{width}x{height} tile layer overflows usize");
        };
        let (width, height) = if count == 0 { (0, 0) } else { (width, height) };
        Self {
            width,
            height,
            cells: vec![0; count],
            tileset,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tileset(&self) -> &Arc<Tileset> {
        &self.tileset
    }

    pub fn set_tileset(&mut self, tileset: Arc<Tileset>) {
        self.tileset = tileset;
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Set one cell, returning the previous tile, or `None` if `(x, y)` is
    /// outside the grid.
    pub fn set(&mut self, x: usize, y: usize, tile: u32) -> Option<u32> {
        let i = self.index(x, y)?;
        Some(std::mem::replace(&mut self.cells[i], tile))
    }

    /// Fill the inclusive rectangle between two corners.
    pub fn fill(&mut self, from: (usize, usize), to: (usize, usize), tile: u32) {
        let (x0, x1) = (from.0.min(to.0), from.0.max(to.0).min(self.width.saturating_sub(1)));
        let (y0, y1) = (from.1.min(to.1), from.1.max(to.1).min(self.height.saturating_sub(1)));
        for y in y0..=y1 {
            for x in x0..=x1 {
                if let Some(i) = self.index(x, y) {
                    self.cells[i] = tile;
                }
            }
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        (0..self.height).map(move |y| &self.cells[y * self.width..(y + 1) * self.width])
    }

    /// Append `n` rows of tile 0 at the bottom.
    ///
    /// Returns `false`, leaving the layer unchanged, if the layer is empty
    /// or the grown grid would overflow.
    pub fn add_rows(&mut self, n: usize) -> bool {
        let Some((height, count)) = grown(self.height, n, self.width) else {
            return false;
        };
        self.cells.resize(count, 0);
        self.height = height;
        true
    }

    /// Append `n` columns of tile 0 on the right.
    ///
    /// Returns `false`, leaving the layer unchanged, if the layer is empty
    /// or the grown grid would overflow.
    pub fn add_columns(&mut self, n: usize) -> bool {
        let Some((width, count)) = grown(self.width, n, self.height) else {
            return false;
        };
        let mut cells = Vec::with_capacity(count);
        for row in self.rows() {
            cells.extend_from_slice(row);
            cells.resize(cells.len() + n, 0);
        }
        self.cells = cells;
        self.width = width;
        true
    }

    /// Drop up to `n` rows from the bottom. Dropping the last row empties
    /// the layer.
    pub fn remove_rows(&mut self, n: usize) {
        self.height = self.height.saturating_sub(n);
        if self.height == 0 {
            self.width = 0;
        }
        self.cells.truncate(self.height * self.width);
    }

    /// Drop up to `n` columns from the right. Dropping the last column
    /// empties the layer.
    pub fn remove_columns(&mut self, n: usize) {
        let width = self.width.saturating_sub(n);
        let cells = self.rows().flat_map(|row| &row[..width]).copied().collect();
        self.cells = cells;
        self.width = width;
        if width == 0 {
            self.height = 0;
        }
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

/// New length of the grown side and the new cell count, or `None` if the
/// grid has no cells along `other` or would overflow.
fn grown(side: usize, n: usize, other: usize) -> Option<(usize, usize)> {
    let side = side.checked_add(n)?;
    let count = side.checked_mul(other).filter(|&count| count > 0)?;
    Some((side, count))
}

fn read_dimension(decoder: &mut Decoder<'_, '_>) -> Result<usize, DecodeError> {
    let offset = decoder.offset();
    let value = decoder.read_int()?;
    usize::try_from(value).map_err(|_| DecodeError::MalformedLength {
        offset,
        reason: format!("layer dimension {value} is negative"),
    })
}

impl Packed for TileLayer {
    fn dump(&self, encoder: &mut Encoder<'_>) -> Result<(), EncodeError> {
        encoder.write_tag(CELL_TAG);
        encoder.write_len(self.width);
        encoder.write_len(self.height);
        encoder.write_text(self.tileset.name());
        for &cell in &self.cells {
            let tag = encoder.write_untagged(&Value::Int(i64::from(cell)))?;
            debug_assert_eq!(tag, CELL_TAG);
        }
        Ok(())
    }

    fn load(decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError> {
        let offset = decoder.offset();
        let tag = decoder.read_tag()?;
        if tag != CELL_TAG {
            return Err(DecodeError::UnexpectedTag {
                offset,
                expected: "tile index tag",
                found: tag,
            });
        }

        let offset = decoder.offset();
        let width = read_dimension(decoder)?;
        let height = read_dimension(decoder)?;
        let name = decoder.read_text()?;
        if (width == 0) != (height == 0) {
            return Err(DecodeError::MalformedLength {
                offset,
                reason: format!("{width}x{height} layer has a side but no cells"),
            });
        }

        // Each untagged cell takes at least one byte.
        let count = width
            .checked_mul(height)
            .filter(|&count| count <= decoder.remaining())
            .ok_or_else(|| DecodeError::MalformedLength {
                offset,
                reason: format!(
                    "{width}x{height} cells exceed the {} remaining bytes",
                    decoder.remaining()
                ),
            })?;

        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = decoder.offset();
            let cell = match decoder.read_untagged(tag)? {
                Value::Int(v) => u32::try_from(v).ok(),
                _ => None,
            };
            let cell = cell.ok_or_else(|| {
                DecodeError::custom(format!("tile index at offset {offset} does not fit u32"))
            })?;
            cells.push(cell);
        }

        let tileset = match decoder.resource::<TilesetCache>() {
            Some(cache) => cache.get_or_create(&name),
            None => Arc::new(Tileset::in_dir(Path::new("."), name)),
        };

        Ok(Self {
            width,
            height,
            cells,
            tileset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tilepack_codec::{RegistryBuilder, TypeRegistry};

    fn tileset() -> Arc<Tileset> {
        Arc::new(Tileset::new("blue", "blue.png"))
    }

    fn grid(layer: &TileLayer) -> Vec<Vec<u32>> {
        layer.rows().map(<[u32]>::to_vec).collect()
    }

    fn registry(cache: Option<TilesetCache>) -> TypeRegistry {
        let mut builder = RegistryBuilder::new();
        builder.register_packed::<TileLayer>(TILE_LAYER_TYPE).unwrap();
        if let Some(cache) = cache {
            builder.insert_resource(cache);
        }
        builder.build()
    }

    #[test]
    fn grid_editing() {
        let mut layer = TileLayer::new(3, 1, tileset());
        assert!(layer.add_rows(1));
        assert_eq!((layer.width(), layer.height()), (3, 2));

        assert_eq!(layer.set(2, 1, 7), Some(0));
        assert_eq!(layer.set(3, 0, 1), None);
        assert_eq!(layer.get(2, 1), Some(7));

        layer.add_columns(1);
        assert_eq!(grid(&layer), vec![vec![0, 0, 0, 0], vec![0, 0, 7, 0]]);

        layer.remove_columns(2);
        layer.remove_rows(1);
        assert_eq!(grid(&layer), vec![vec![0, 0]]);

        layer.remove_rows(5);
        assert_eq!((layer.width(), layer.height()), (0, 0));
    }

    #[test]
    fn empty_layer_stays_empty() {
        let mut layer = TileLayer::new(0, 5, tileset());
        assert_eq!((layer.width(), layer.height()), (0, 0));
        assert!(!layer.add_rows(2));
        assert!(!layer.add_columns(2));
        assert_eq!(layer.rows().count(), 0);

        let mut layer = TileLayer::new(2, 2, tileset());
        layer.remove_columns(2);
        assert_eq!((layer.width(), layer.height()), (0, 0));
    }

    #[test]
    fn growth_overflow_leaves_layer_unchanged() {
        let mut layer = TileLayer::new(2, 2, tileset());
        layer.set(1, 1, 9);
        assert!(!layer.add_columns(usize::MAX));
        assert!(!layer.add_rows(usize::MAX / 2));
        assert_eq!(grid(&layer), vec![vec![0, 0], vec![0, 9]]);
    }

    #[test]
    fn fill_clamps_to_grid() {
        let mut layer = TileLayer::new(3, 3, tileset());
        layer.fill((2, 2), (1, 9), 4);
        assert_eq!(grid(&layer), vec![vec![0, 0, 0], vec![0, 0, 0], vec![0, 4, 4]]);
    }

    #[test]
    fn packed_layout() {
        let mut layer = TileLayer::new(2, 1, tileset());
        layer.set(1, 0, 300);
        let registry = registry(None);

        let bytes = registry.serialize(&Value::packed(layer)).unwrap();
        let mut expected = b"UsI\x15game_types::TileLayerI\x0f".to_vec();
        expected.extend(b"II\x02I\x01sI\x04blue\x00\xac\x02");
        assert_eq!(bytes, expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(16, 16)]
    #[case(5, 3)]
    fn roundtrip_through_cache(#[case] width: usize, #[case] height: usize) {
        let cache = TilesetCache::new("tiles");
        let shared = cache.get_or_create("blue");
        let registry = registry(Some(cache));

        let mut layer = TileLayer::new(width, height, shared.clone());
        for (i, (x, y)) in (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .enumerate()
        {
            layer.set(x, y, (i * 37) as u32);
        }

        let bytes = registry.serialize(&Value::packed(layer.clone())).unwrap();
        let (value, _) = registry.deserialize(&bytes, 0).unwrap();
        let decoded = value.into_object::<TileLayer>().unwrap();
        assert_eq!(decoded, layer);
        assert!(Arc::ptr_eq(decoded.tileset(), &shared));
    }

    #[test]
    fn rejects_signed_cell_tag() {
        let registry = registry(None);
        let payload = b"iI\x01I\x01sI\x01a\xff\xff\xff\xff";
        let mut bytes = b"UsI\x15game_types::TileLayerI".to_vec();
        bytes.push(payload.len() as u8);
        bytes.extend(payload);
        assert!(matches!(
            registry.deserialize(&bytes, 0),
            Err(DecodeError::UnexpectedTag { .. })
        ));
    }

    #[rstest]
    #[case::no_columns(&b"II\x00I\x05sI\x01a"[..])]
    #[case::no_rows(&b"II\x05I\x00sI\x01a"[..])]
    #[case::huge_height(&b"II\x00I\x80\x80\x80\x80\x80\x80\x80\x80\x40sI\x01a"[..])]
    fn rejects_grid_without_cells(#[case] payload: &[u8]) {
        let registry = registry(None);
        let mut bytes = b"UsI\x15game_types::TileLayerI".to_vec();
        bytes.push(payload.len() as u8);
        bytes.extend(payload);
        assert!(matches!(
            registry.deserialize(&bytes, 0),
            Err(DecodeError::MalformedLength { .. })
        ));
    }

    #[test]
    fn rejects_oversized_grid() {
        let registry = registry(None);
        let payload = b"II\x64I\x64sI\x01a\x00";
        let mut bytes = b"UsI\x15game_types::TileLayerI".to_vec();
        bytes.push(payload.len() as u8);
        bytes.extend(payload);
        assert!(matches!(
            registry.deserialize(&bytes, 0),
            Err(DecodeError::MalformedLength { .. })
        ));
    }
}
