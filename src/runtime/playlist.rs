/// Cursor into the catalog's track list, owned by the command loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Playlist {
    current: Option<usize>,
}

impl Playlist {
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Advance with wrap-around. The first call selects the first track.
    pub fn next(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let i = match self.current {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.current = Some(i);
        self.current
    }

    /// Step back with wrap-around. The first call selects the first track.
    pub fn prev(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let i = match self.current {
            Some(i) => (i.min(len) + len - 1) % len,
            None => 0,
        };
        self.current = Some(i);
        self.current
    }

    /// Select by 1-based position.
    pub fn goto(&mut self, position: usize, len: usize) -> Option<usize> {
        if position == 0 || position > len {
            return None;
        }
        self.current = Some(position - 1);
        self.current
    }

    pub fn select(&mut self, index: usize) {
        self.current = Some(index);
    }

    /// Forget the cursor when a rescan shrank the list below it.
    pub fn clamp(&mut self, len: usize) {
        if self.current.is_some_and(|i| i >= len) {
            self.current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_prev_wrap_around() {
        let mut p = Playlist::default();
        assert_eq!(p.next(3), Some(0));
        assert_eq!(p.next(3), Some(1));
        assert_eq!(p.next(3), Some(2));
        assert_eq!(p.next(3), Some(0));
        assert_eq!(p.prev(3), Some(2));
        assert_eq!(p.prev(3), Some(1));
    }

    #[test]
    fn prev_from_nothing_starts_at_the_top() {
        let mut p = Playlist::default();
        assert_eq!(p.prev(4), Some(0));
    }

    #[test]
    fn empty_list_selects_nothing() {
        let mut p = Playlist::default();
        assert_eq!(p.next(0), None);
        assert_eq!(p.prev(0), None);
        assert_eq!(p.current(), None);
    }

    #[test]
    fn goto_is_one_based_and_bounds_checked() {
        let mut p = Playlist::default();
        assert_eq!(p.goto(0, 3), None);
        assert_eq!(p.goto(4, 3), None);
        assert_eq!(p.current(), None);
        assert_eq!(p.goto(3, 3), Some(2));
    }

    #[test]
    fn clamp_resets_an_out_of_range_cursor() {
        let mut p = Playlist::default();
        p.select(4);
        p.clamp(5);
        assert_eq!(p.current(), Some(4));
        p.clamp(2);
        assert_eq!(p.current(), None);
    }
}
