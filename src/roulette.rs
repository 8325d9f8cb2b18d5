use crate::cases::CaseItem;
use lootcase_core::{
    RandomSource,
    SelectionError,
    selector,
};

pub const TILE_WIDTH: f64 = 120.0;
pub const STRIP_LEN: usize = 50;

/// Jitter is drawn from `[-MAX_JITTER, MAX_JITTER)`.
pub const MAX_JITTER: f64 = 20.0;

/// Tiles shown by the spinning roulette, with the won item at `target_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouletteStrip {
    pub tiles: Vec<CaseItem>,
    pub target_index: usize,
}

impl RouletteStrip {
    /// Fills `len` tiles by weighted picks and puts `won` in the middle one.
    pub fn build<R: RandomSource + ?Sized>(
        items: &[CaseItem],
        won: &CaseItem,
        len: usize,
        rng: &mut R,
    ) -> Result<Self, SelectionError> {
        let len = len.max(1);
        let mut tiles = Vec::with_capacity(len);
        for _ in 0..len {
            tiles.push(selector::pick(items, rng)?.clone());
        }
        let target_index = len / 2;
        tiles[target_index] = won.clone();
        Ok(Self {
            tiles,
            target_index,
        })
    }

    pub fn won(&self) -> &CaseItem {
        &self.tiles[self.target_index]
    }

    /// Translate offset that stops the strip on the won tile.
    pub fn final_offset<R: RandomSource + ?Sized>(
        &self,
        container_width: f64,
        rng: &mut R,
    ) -> f64 {
        target_offset(self.target_index, container_width) + jitter(rng)
    }
}

/// Offset that centres tile `index` in a container of the given width.
pub fn target_offset(index: usize, container_width: f64) -> f64 {
    let centre = container_width / 2.0 - TILE_WIDTH / 2.0;
    index as f64 * TILE_WIDTH - centre
}

fn jitter<R: RandomSource + ?Sized>(rng: &mut R) -> f64 {
    let u = rng.next_unit().clamp(0.0, 1.0);
    (u - 0.5) * 2.0 * MAX_JITTER
}
