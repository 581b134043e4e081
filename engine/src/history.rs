//! Bounded undo/redo stacks: one over canvas snapshots, one over drawing
//! layer records. They keep separate positions.

use std::collections::{HashSet, VecDeque};

use crate::codec::{self, ShapeRecord};
use crate::error::Result;
use crate::scene::{CanvasSnapshot, EditorSession, ImageKey};

/// Entries plus a cursor. The cursor is the entry currently shown and is not
/// necessarily the tail.
#[derive(Clone, Debug)]
pub struct History<T> {
    entries: VecDeque<T>,
    position: usize,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        History { entries: VecDeque::new(), position: 0, capacity: capacity.max(1) }
    }

    /// Discards the redo branch, appends `entry` and evicts the oldest entry
    /// once over capacity.
    pub fn push(&mut self, entry: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.position + 1);
        }
        self.entries.push_back(entry);
        self.position = self.entries.len() - 1;
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.position -= 1;
        }
    }

    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() { return None; }
        self.position -= 1;
        self.entries.get(self.position)
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() { return None; }
        self.position += 1;
        self.entries.get(self.position)
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.position)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Whole-scene history: image, transform and filters.
pub struct CanvasHistory {
    history: History<CanvasSnapshot>,
}

impl CanvasHistory {
    pub fn new(capacity: usize) -> Self {
        CanvasHistory { history: History::new(capacity) }
    }

    pub fn snapshot(&mut self, session: &mut EditorSession) -> Result<()> {
        let snapshot = CanvasSnapshot::capture(session)?;
        log::debug!("canvas snapshot #{} ({} bytes)", self.history.len(), snapshot.byte_len());
        self.history.push(snapshot);
        self.release_unreferenced(session);
        Ok(())
    }

    pub fn undo(&mut self, session: &mut EditorSession) -> Result<bool> {
        match self.history.undo() {
            Some(snapshot) => {
                snapshot.restore(session)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self, session: &mut EditorSession) -> Result<bool> {
        match self.history.redo() {
            Some(snapshot) => {
                snapshot.restore(session)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rasters are shared by reference; drop those no entry and no live
    /// image points at any more.
    fn release_unreferenced(&self, session: &mut EditorSession) {
        let mut keep: HashSet<ImageKey> = self.history.iter().filter_map(|s| s.source()).collect();
        if let Some(image) = &session.image {
            keep.insert(image.source);
        }
        session.images.retain(&keep);
    }

    pub fn can_undo(&self) -> bool { self.history.can_undo() }
    pub fn can_redo(&self) -> bool { self.history.can_redo() }
    pub fn len(&self) -> usize { self.history.len() }
    pub fn is_empty(&self) -> bool { self.history.is_empty() }
    pub fn position(&self) -> usize { self.history.position() }
}

/// Drawing-layer history. Entry 0 is the empty layer.
pub struct DrawingHistory {
    history: History<Vec<ShapeRecord>>,
}

impl DrawingHistory {
    pub fn new(capacity: usize) -> Self {
        let mut history = History::new(capacity);
        history.push(Vec::new());
        DrawingHistory { history }
    }

    pub fn snapshot(&mut self, session: &EditorSession) {
        let records = codec::encode_all(session.drawing.shapes());
        log::debug!("drawing snapshot with {} shape(s)", records.len());
        self.history.push(records);
    }

    /// Undoing back to the empty entry also deactivates the drawing tool.
    /// Once that entry has been evicted the oldest entry holds shapes and
    /// the tool stays on.
    pub fn undo(&mut self, session: &mut EditorSession) -> bool {
        let Some(records) = self.history.undo() else { return false };
        reload(session, records);
        if self.history.position() == 0 && session.drawing.is_empty() {
            session.deactivate_tool();
        }
        true
    }

    pub fn redo(&mut self, session: &mut EditorSession) -> bool {
        let Some(records) = self.history.redo() else { return false };
        reload(session, records);
        true
    }

    pub fn can_undo(&self) -> bool { self.history.can_undo() }
    pub fn can_redo(&self) -> bool { self.history.can_redo() }
    pub fn len(&self) -> usize { self.history.len() }
    pub fn is_empty(&self) -> bool { self.history.is_empty() }
    pub fn position(&self) -> usize { self.history.position() }
}

/// Replaces the layer's shapes with the decoded records, in record order.
fn reload(session: &mut EditorSession, records: &[ShapeRecord]) {
    session.drawing.clear_shapes();
    for record in records {
        session.drawing.add(codec::decode(record));
    }
    session.mark_dirty();
}
