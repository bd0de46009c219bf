use crate::Bitmap;

impl Bitmap {
    /// Returns an iterator over the boolean value of every row.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter()
    }

    /// Returns an iterator over the indices of the set rows, in ascending order.
    pub fn set_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(idx, bit)| bit.then_some(idx))
    }
}
