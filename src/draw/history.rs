use crate::draw::error::DrawError;
use crate::draw::fill::flood_fill;
use crate::draw::model::{FillOp, Stroke};
use crate::draw::render::render_stroke;
use crate::draw::surface::{PixelSurface, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Snapshot(Snapshot),
    Stroke(Stroke),
    Fill(FillOp),
}

impl HistoryEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Snapshot(_) => "snapshot",
            HistoryEntry::Stroke(_) => "stroke",
            HistoryEntry::Fill(_) => "fill",
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, HistoryEntry::Snapshot(_))
    }
}

impl From<Stroke> for HistoryEntry {
    fn from(stroke: Stroke) -> Self {
        HistoryEntry::Stroke(stroke)
    }
}

impl From<FillOp> for HistoryEntry {
    fn from(fill: FillOp) -> Self {
        HistoryEntry::Fill(fill)
    }
}

#[derive(Debug, Clone)]
struct Record {
    entry: HistoryEntry,
    /// Raster state right after `entry`, kept for some semantic entries so
    /// replay does not have to walk back to the last full snapshot.
    checkpoint: Option<Snapshot>,
}

/// Surface reconstructed for one cursor position.
#[derive(Debug, Clone)]
struct Working {
    cursor: usize,
    surface: PixelSurface,
}

/// Cursor-based command log for one layer.
///
/// Entry 0 is always a snapshot. The visible state for the cursor is the
/// nearest snapshot (or checkpoint) at or before it with every later stroke
/// and fill replayed in order. Undo and redo only move the cursor; committing
/// while the cursor is behind the tail discards the tail.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    records: Vec<Record>,
    cursor: usize,
    size: (u32, u32),
    checkpoint_interval: usize,
    working: Option<Working>,
}

impl HistoryLog {
    pub fn new(initial: Snapshot) -> Self {
        let size = initial.size();
        Self {
            records: vec![Record {
                entry: HistoryEntry::Snapshot(initial),
                checkpoint: None,
            }],
            cursor: 0,
            size,
            checkpoint_interval: 0,
            working: None,
        }
    }

    /// Store a checkpoint after every `interval` semantic entries. Zero keeps
    /// only explicit snapshots.
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.records.get(index).map(|record| &record.entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.records.iter().map(|record| &record.entry)
    }

    pub fn checkpoint_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.checkpoint.is_some())
            .count()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.records.len()
    }

    /// Moves the cursor back one entry. Returns `false` at the lower bound.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        tracing::debug!(cursor = self.cursor, len = self.len(), "history undo");
        true
    }

    /// Moves the cursor forward one entry. Returns `false` at the upper bound.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        tracing::debug!(cursor = self.cursor, len = self.len(), "history redo");
        true
    }

    /// Appends `entry` after the cursor, discarding any redo tail.
    ///
    /// Returns `Ok(false)` without touching the log when `entry` is a snapshot
    /// identical to the current state.
    pub fn commit(&mut self, entry: HistoryEntry) -> Result<bool, DrawError> {
        self.validate(&entry)?;

        if let HistoryEntry::Snapshot(snapshot) = &entry {
            if self.reconstruct()?.matches_snapshot(snapshot) {
                tracing::debug!(cursor = self.cursor, "skipping unchanged snapshot commit");
                return Ok(false);
            }
        }

        if matches!(&self.working, Some(working) if working.cursor > self.cursor) {
            self.working = None;
        }
        let discarded = self.records.len() - (self.cursor + 1);
        self.records.truncate(self.cursor + 1);
        let kind = entry.kind();
        let semantic = !entry.is_snapshot();
        self.records.push(Record {
            entry,
            checkpoint: None,
        });
        self.cursor = self.records.len() - 1;

        if semantic
            && self.checkpoint_interval > 0
            && self.cursor - self.base_index(self.cursor) >= self.checkpoint_interval
        {
            let checkpoint = self.reconstruct()?.snapshot();
            self.records[self.cursor].checkpoint = Some(checkpoint);
            tracing::debug!(index = self.cursor, "stored history checkpoint");
        }

        tracing::debug!(
            kind,
            cursor = self.cursor,
            discarded,
            "history commit"
        );
        Ok(true)
    }

    /// Raster state at the cursor.
    ///
    /// The last reconstruction is cached; moving forward replays only the new
    /// entries, anything else restarts from the nearest snapshot or
    /// checkpoint.
    pub fn reconstruct(&mut self) -> Result<&PixelSurface, DrawError> {
        let cursor = self.cursor;
        let base = self.base_index(cursor);
        let mut working = match self.working.take() {
            Some(working) if working.cursor >= base && working.cursor <= cursor => working,
            _ => Working {
                cursor: base,
                surface: self.base_surface(base),
            },
        };

        for index in (working.cursor + 1)..=cursor {
            apply_entry(&mut working.surface, &self.records[index].entry)?;
        }
        working.cursor = cursor;
        Ok(&self.working.insert(working).surface)
    }

    /// Uncached reconstruction of the state at any index.
    pub fn reconstruct_at(&self, index: usize) -> Result<PixelSurface, DrawError> {
        if index >= self.records.len() {
            return Err(DrawError::InvalidHistoryOperation(format!(
                "index {index} is past the end of a {}-entry history",
                self.records.len()
            )));
        }
        let base = self.base_index(index);
        let mut surface = self.base_surface(base);
        for record in &self.records[base + 1..=index] {
            apply_entry(&mut surface, &record.entry)?;
        }
        Ok(surface)
    }

    /// Flags the stroke at `index` as smoothed.
    ///
    /// This is the only in-place edit of a committed entry. Everything derived
    /// from the old rendering (checkpoints at or after `index` and the cached
    /// reconstruction) is dropped, so the next `reconstruct` replays the stroke
    /// from its raw points.
    pub fn mark_smoothed(&mut self, index: usize) -> Result<(), DrawError> {
        if index > self.cursor {
            return Err(DrawError::InvalidHistoryOperation(format!(
                "entry {index} is ahead of the cursor at {}",
                self.cursor
            )));
        }
        match self.records.get_mut(index).map(|record| &mut record.entry) {
            Some(HistoryEntry::Stroke(stroke)) if stroke.can_smooth() => {
                if stroke.smoothed {
                    return Ok(());
                }
                stroke.smoothed = true;
            }
            Some(HistoryEntry::Stroke(stroke)) => {
                return Err(DrawError::InvalidHistoryOperation(format!(
                    "stroke {index} has {} points, smoothing needs at least 3",
                    stroke.points.len()
                )));
            }
            Some(other) => {
                return Err(DrawError::InvalidHistoryOperation(format!(
                    "entry {index} is a {}, not a stroke",
                    other.kind()
                )));
            }
            None => {
                return Err(DrawError::InvalidHistoryOperation(format!(
                    "no entry at {index}"
                )));
            }
        }

        for record in &mut self.records[index..] {
            record.checkpoint = None;
        }
        if matches!(&self.working, Some(working) if working.cursor >= index) {
            self.working = None;
        }
        tracing::debug!(index, "marked stroke smoothed");
        Ok(())
    }

    /// Most recent stroke at or before the cursor that smoothing applies to.
    pub fn last_smoothable_stroke(&self) -> Option<usize> {
        (0..=self.cursor).rev().find(|&index| {
            matches!(
                &self.records[index].entry,
                HistoryEntry::Stroke(stroke) if stroke.can_smooth() && !stroke.smoothed
            )
        })
    }

    fn validate(&self, entry: &HistoryEntry) -> Result<(), DrawError> {
        match entry {
            HistoryEntry::Snapshot(snapshot) => {
                if snapshot.size() != self.size {
                    return Err(DrawError::DimensionMismatch {
                        expected: self.size,
                        actual: snapshot.size(),
                    });
                }
            }
            HistoryEntry::Stroke(stroke) => {
                if stroke.points.is_empty() {
                    return Err(DrawError::InvalidHistoryOperation(
                        "stroke has no points".to_string(),
                    ));
                }
                if stroke.width == 0 {
                    return Err(DrawError::InvalidHistoryOperation(
                        "stroke width must be positive".to_string(),
                    ));
                }
            }
            HistoryEntry::Fill(fill) => {
                let (width, height) = self.size;
                if fill.x < 0 || fill.y < 0 || fill.x as u32 >= width || fill.y as u32 >= height {
                    return Err(DrawError::OutOfBounds {
                        x: fill.x,
                        y: fill.y,
                        width,
                        height,
                    });
                }
            }
        }
        Ok(())
    }

    /// Nearest index at or before `upto` whose full raster is stored.
    fn base_index(&self, upto: usize) -> usize {
        (0..=upto)
            .rev()
            .find(|&index| {
                let record = &self.records[index];
                record.entry.is_snapshot() || record.checkpoint.is_some()
            })
            .unwrap_or(0)
    }

    fn base_surface(&self, index: usize) -> PixelSurface {
        let record = &self.records[index];
        match (&record.entry, &record.checkpoint) {
            (HistoryEntry::Snapshot(snapshot), _) => snapshot.to_surface(),
            (_, Some(checkpoint)) => checkpoint.to_surface(),
            // base_index only returns snapshots or checkpointed records, and
            // entry 0 is always a snapshot.
            _ => match &self.records[0].entry {
                HistoryEntry::Snapshot(snapshot) => snapshot.to_surface(),
                _ => PixelSurface::blank(self.size.0, self.size.1),
            },
        }
    }
}

/// Replays one entry onto `surface`. Fills re-derive their target color from
/// whatever `surface` holds at this point of the replay.
fn apply_entry(surface: &mut PixelSurface, entry: &HistoryEntry) -> Result<(), DrawError> {
    match entry {
        HistoryEntry::Snapshot(snapshot) => surface.restore(snapshot),
        HistoryEntry::Stroke(stroke) => {
            render_stroke(surface, stroke);
            Ok(())
        }
        HistoryEntry::Fill(fill) => flood_fill(surface, fill.x, fill.y, fill.color).map(|_| ()),
    }
}
