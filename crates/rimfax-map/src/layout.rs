//! Partial bijection between logical and physical qubits.

use serde::{Deserialize, Serialize};

/// A partial bijection from logical to physical qubits.
///
/// Both directions are stored densely; unmapped slots are `None`. The search
/// deduplicates layouts by their packed byte encoding, so physical indices
/// must fit in a `u8` (devices above 255 qubits are rejected up front).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    log_to_phys: Vec<Option<u16>>,
    phys_to_log: Vec<Option<u16>>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new(num_logical: usize, num_physical: usize) -> Self {
        Self {
            log_to_phys: vec![None; num_logical],
            phys_to_log: vec![None; num_physical],
        }
    }

    /// Create an identity layout over the logical qubits.
    pub fn identity(num_logical: usize, num_physical: usize) -> Self {
        let mut layout = Self::new(num_logical, num_physical);
        for i in 0..num_logical {
            layout.assign(i as u16, i as u16);
        }
        layout
    }

    /// Bind a logical qubit to a free physical qubit.
    ///
    /// Existing bindings of either side are released first.
    pub fn assign(&mut self, logical: u16, physical: u16) {
        if let Some(old_phys) = self.log_to_phys[logical as usize] {
            self.phys_to_log[old_phys as usize] = None;
        }
        if let Some(old_log) = self.phys_to_log[physical as usize] {
            self.log_to_phys[old_log as usize] = None;
        }
        self.log_to_phys[logical as usize] = Some(physical);
        self.phys_to_log[physical as usize] = Some(logical);
    }

    /// The physical position of a logical qubit.
    #[inline]
    pub fn physical(&self, logical: u16) -> Option<u16> {
        self.log_to_phys[logical as usize]
    }

    /// The logical qubit on a physical position.
    #[inline]
    pub fn logical(&self, physical: u16) -> Option<u16> {
        self.phys_to_log[physical as usize]
    }

    /// Whether a physical position hosts no logical qubit.
    #[inline]
    pub fn is_free(&self, physical: u16) -> bool {
        self.phys_to_log[physical as usize].is_none()
    }

    /// Exchange the logical qubits on two physical positions.
    pub fn swap_physical(&mut self, p1: u16, p2: u16) {
        let l1 = self.phys_to_log[p1 as usize];
        let l2 = self.phys_to_log[p2 as usize];
        self.phys_to_log[p1 as usize] = l2;
        self.phys_to_log[p2 as usize] = l1;
        if let Some(l1) = l1 {
            self.log_to_phys[l1 as usize] = Some(p2);
        }
        if let Some(l2) = l2 {
            self.log_to_phys[l2 as usize] = Some(p1);
        }
    }

    /// Number of logical qubits (mapped or not).
    pub fn num_logical(&self) -> usize {
        self.log_to_phys.len()
    }

    /// Number of physical qubits.
    pub fn num_physical(&self) -> usize {
        self.phys_to_log.len()
    }

    /// Number of mapped logical qubits.
    pub fn num_mapped(&self) -> usize {
        self.log_to_phys.iter().flatten().count()
    }

    /// Physical positions not hosting a logical qubit, ascending.
    pub fn free_physical(&self) -> Vec<u16> {
        self.phys_to_log
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_none())
            .map(|(p, _)| p as u16)
            .collect()
    }

    /// Canonical byte encoding of the physical-to-logical map, used as the
    /// search dedup key.
    pub fn packed_key(&self) -> Vec<u8> {
        self.phys_to_log
            .iter()
            .map(|l| match l {
                Some(l) => u8::try_from(*l).expect("logical index exceeds u8"),
                None => u8::MAX,
            })
            .collect()
    }

    /// The layout as a per-logical vector of physical positions, `-1` for
    /// unmapped (report format).
    pub fn as_report_vec(&self) -> Vec<i32> {
        self.log_to_phys
            .iter()
            .map(|p| p.map_or(-1, i32::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let layout = Layout::identity(3, 5);
        assert_eq!(layout.physical(0), Some(0));
        assert_eq!(layout.physical(2), Some(2));
        assert_eq!(layout.logical(2), Some(2));
        assert!(layout.is_free(3));
        assert_eq!(layout.free_physical(), vec![3, 4]);
    }

    #[test]
    fn test_swap_physical() {
        let mut layout = Layout::identity(2, 4);
        layout.swap_physical(0, 3);
        assert_eq!(layout.physical(0), Some(3));
        assert_eq!(layout.logical(3), Some(0));
        assert!(layout.is_free(0));

        layout.swap_physical(1, 3);
        assert_eq!(layout.physical(0), Some(1));
        assert_eq!(layout.physical(1), Some(3));
    }

    #[test]
    fn test_assign_releases_old_bindings() {
        let mut layout = Layout::identity(2, 4);
        layout.assign(0, 2);
        assert!(layout.is_free(0));
        assert_eq!(layout.physical(0), Some(2));

        // Stealing an occupied slot unbinds its previous owner.
        layout.assign(1, 2);
        assert_eq!(layout.physical(1), Some(2));
        assert_eq!(layout.physical(0), None);
    }

    #[test]
    fn test_packed_key_distinguishes_layouts() {
        let a = Layout::identity(2, 4);
        let mut b = Layout::identity(2, 4);
        b.swap_physical(0, 1);
        assert_ne!(a.packed_key(), b.packed_key());
        assert_eq!(a.packed_key().len(), 4);
        assert_eq!(a.packed_key()[3], u8::MAX);
    }

    #[test]
    fn test_report_vec() {
        let mut layout = Layout::new(3, 4);
        layout.assign(1, 2);
        assert_eq!(layout.as_report_vec(), vec![-1, 2, -1]);
    }
}
