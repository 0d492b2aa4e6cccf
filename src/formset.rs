//! Explicit formset state.
//!
//! A [`Formset`] knows its rows, their indices and whether each row is still
//! visible. Adding, removing and renumbering are plain operations on that
//! state; the page layer renders the outcome onto the DOM afterwards.

/// Opaque handle to the DOM element that renders a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Visible,
    /// Deletion marker set; hidden but still submitted with its old index.
    SoftDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    pub id: RowId,
    pub index: usize,
    pub state: RowState,
    pub has_deletion_marker: bool,
}

impl FormRow {
    pub fn is_visible(&self) -> bool {
        self.state == RowState::Visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The row stays in the document, flagged and hidden.
    Soft,
    /// The row is gone from both the state and the document.
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formset {
    prefix: String,
    rows: Vec<FormRow>,
    max_forms: Option<usize>,
}

impl Formset {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            rows: Vec::new(),
            max_forms: None,
        }
    }

    pub fn with_max_forms(mut self, max_forms: Option<usize>) -> Self {
        self.max_forms = max_forms;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn rows(&self) -> &[FormRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&FormRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn max_forms(&self) -> Option<usize> {
        self.max_forms
    }

    /// Count of visible rows; mirrored into the `TOTAL_FORMS` counter.
    pub fn total(&self) -> usize {
        self.rows.iter().filter(|row| row.is_visible()).count()
    }

    pub fn can_add(&self) -> bool {
        self.max_forms.is_none_or(|max| self.total() < max)
    }

    /// Records a row that already exists in the server-rendered document.
    pub fn adopt_row(&mut self, row: FormRow) {
        self.rows.push(row);
    }

    /// Appends a fresh visible row at index `total()`.
    ///
    /// Returns the assigned index, or `None` when the formset is full.
    pub fn push_row(&mut self, id: RowId, has_deletion_marker: bool) -> Option<usize> {
        if !self.can_add() {
            return None;
        }
        let index = self.total();
        self.rows.push(FormRow {
            id,
            index,
            state: RowState::Visible,
            has_deletion_marker,
        });
        Some(index)
    }

    /// Removes or soft-deletes the row. Call [`Formset::renumber`] afterwards.
    pub fn remove_row(&mut self, id: RowId) -> Option<Removal> {
        let pos = self.rows.iter().position(|row| row.id == id)?;
        if self.rows[pos].has_deletion_marker {
            self.rows[pos].state = RowState::SoftDeleted;
            Some(Removal::Soft)
        } else {
            self.rows.remove(pos);
            Some(Removal::Hard)
        }
    }

    /// Assigns contiguous zero-based indices to the visible rows in order.
    ///
    /// Soft-deleted rows keep their index. Returns every visible row with its
    /// (possibly unchanged) index so the caller can rewrite the document.
    pub fn renumber(&mut self) -> Vec<(RowId, usize)> {
        let mut assigned = Vec::new();
        for row in self.rows.iter_mut().filter(|row| row.state == RowState::Visible) {
            row.index = assigned.len();
            assigned.push((row.id, row.index));
        }
        assigned
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.rows
            .iter()
            .filter(|row| row.is_visible())
            .map(|row| row.index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formset_with(rows: &[(usize, bool)]) -> Formset {
        let mut formset = Formset::new("items");
        for (pos, (index, marker)) in rows.iter().enumerate() {
            formset.adopt_row(FormRow {
                id: RowId(pos + 100),
                index: *index,
                state: RowState::Visible,
                has_deletion_marker: *marker,
            });
        }
        formset
    }

    #[test]
    fn push_row_uses_current_total() {
        let mut formset = formset_with(&[(0, false), (1, false)]);
        assert_eq!(formset.push_row(RowId(1), false), Some(2));
        assert_eq!(formset.total(), 3);
        assert_eq!(formset.visible_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn hard_remove_then_renumber_closes_the_gap() {
        let mut formset = formset_with(&[(0, false), (1, false), (2, false)]);
        assert_eq!(formset.remove_row(RowId(100)), Some(Removal::Hard));
        let assigned = formset.renumber();
        assert_eq!(assigned, vec![(RowId(101), 0), (RowId(102), 1)]);
        assert_eq!(formset.total(), 2);
    }

    #[test]
    fn soft_remove_keeps_row_and_its_index() {
        let mut formset = formset_with(&[(0, true), (1, true), (2, true)]);
        assert_eq!(formset.remove_row(RowId(101)), Some(Removal::Soft));
        formset.renumber();
        assert_eq!(formset.rows().len(), 3);
        assert_eq!(formset.total(), 2);
        assert_eq!(formset.visible_indices(), vec![0, 1]);
        let deleted = formset.row(RowId(101));
        assert_eq!(
            deleted.map(|row| (row.index, row.state)),
            Some((1, RowState::SoftDeleted))
        );
    }

    #[test]
    fn removing_unknown_row_is_a_no_op() {
        let mut formset = formset_with(&[(0, false)]);
        assert_eq!(formset.remove_row(RowId(7)), None);
        assert_eq!(formset.total(), 1);
    }

    #[test]
    fn max_forms_blocks_push() {
        let mut formset = formset_with(&[(0, false)]).with_max_forms(Some(2));
        assert_eq!(formset.push_row(RowId(1), false), Some(1));
        assert!(!formset.can_add());
        assert_eq!(formset.push_row(RowId(2), false), None);
        assert_eq!(formset.total(), 2);
    }

    #[test]
    fn soft_deleted_rows_free_capacity() {
        let mut formset = formset_with(&[(0, true), (1, true)]).with_max_forms(Some(2));
        assert!(!formset.can_add());
        formset.remove_row(RowId(100));
        formset.renumber();
        assert!(formset.can_add());
        assert_eq!(formset.push_row(RowId(1), true), Some(1));
    }
}
