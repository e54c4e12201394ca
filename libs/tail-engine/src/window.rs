use std::collections::VecDeque;

/// Most-recent-first buffer of tail lines with a fixed capacity.
///
/// Every insertion sets the dirty flag; the render tick clears it with
/// [`BoundedWindow::take_dirty`] and only redraws when it was set.
#[derive(Debug, Clone)]
pub struct BoundedWindow {
    lines: VecDeque<String>,
    capacity: usize,
    received: u64,
    dirty: bool,
}

impl BoundedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // Grows with the data; `capacity` comes straight from user input.
            lines: VecDeque::new(),
            capacity,
            received: 0,
            // First tick draws the empty window.
            dirty: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines taken in since creation, evicted ones included.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn push(&mut self, line: String) {
        self.received += 1;
        self.lines.push_front(line);
        self.lines.truncate(self.capacity);
        self.dirty = true;
    }

    /// Insert lines given in log order. Lines that would be evicted
    /// immediately are skipped. Returns the number of lines received.
    pub fn extend<I>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: ExactSizeIterator,
    {
        let lines = lines.into_iter();
        let total = lines.len();
        let skip = total.saturating_sub(self.capacity);
        for line in lines.skip(skip) {
            self.lines.push_front(line);
        }
        self.lines.truncate(self.capacity);
        self.received += total as u64;
        if total > 0 {
            self.dirty = true;
        }
        total
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    pub fn front(&self) -> Option<&String> {
        self.lines.front()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Contiguous view for the renderer.
    pub fn as_slice(&mut self) -> &[String] {
        self.lines.make_contiguous()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the dirty flag and clear it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_most_recent_first_within_capacity() {
        let mut w = BoundedWindow::new(3);
        w.extend(lines(&["a", "b"]));
        w.extend(lines(&["c", "d"]));
        w.extend(lines(&["e", "f"]));
        assert_eq!(w.len(), 3);
        assert_eq!(w.to_vec(), lines(&["f", "e", "d"]));
    }

    #[test]
    fn oversized_batch_keeps_its_tail() {
        let mut w = BoundedWindow::new(2);
        w.push("old".into());
        assert_eq!(w.extend(lines(&["1", "2", "3", "4"])), 4);
        assert_eq!(w.to_vec(), lines(&["4", "3"]));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut w = BoundedWindow::new(5);
        for batch in 0..40 {
            let size = batch % 7;
            w.extend((0..size).map(|i| format!("{batch}:{i}")).collect::<Vec<_>>());
            assert!(w.len() <= 5);
        }
        assert_eq!(w.front().map(String::as_str), Some("39:3"));
    }

    #[test]
    fn dirty_flag_tracks_changes() {
        let mut w = BoundedWindow::new(2);
        assert!(w.take_dirty());
        assert!(!w.take_dirty());
        w.extend(Vec::<String>::new());
        assert!(!w.is_dirty());
        w.push("x".into());
        assert!(w.take_dirty());
        assert!(!w.is_dirty());
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let mut w = BoundedWindow::new(1usize << 60);
        assert_eq!(w.capacity(), 1usize << 60);
        w.extend(lines(&["a", "b"]));
        assert_eq!(w.to_vec(), lines(&["b", "a"]));
    }

    #[test]
    fn received_counts_evicted_lines() {
        let mut w = BoundedWindow::new(2);
        w.push("a".into());
        w.extend(lines(&["b", "c", "d"]));
        assert_eq!(w.received(), 4);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut w = BoundedWindow::new(0);
        w.push("a".into());
        w.push("b".into());
        assert_eq!(w.capacity(), 1);
        assert_eq!(w.as_slice(), &["b".to_string()]);
    }
}
