//! Ping-pong state buffers.
//!
//! A [`PingPong`] owns two physically distinct members, `A` and `B`. One is the
//! *source* (read this frame) and the other the *target* (written this frame).
//! [`PingPong::swap`] exchanges the roles. The two members are separate owned
//! values, so a source and target handed out at the same time can never alias.
//!
//! The same type backs the CPU reference backend (`Vec<Vec4>`) and the GPU
//! backend (a pair of storage textures).

/// Which physical member of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

/// A pair of buffers with alternating source/target roles.
#[derive(Debug)]
pub struct PingPong<T> {
    a: T,
    b: T,
    /// Which buffer is currently the source (false = A, true = B)
    source_is_b: bool,
    swaps: u64,
}

impl<T> PingPong<T> {
    /// Create a pair with `a` as the initial source.
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            source_is_b: false,
            swaps: 0,
        }
    }

    /// Create a pair where both members start as copies of `initial`.
    pub fn from_initial(initial: T) -> Self
    where
        T: Clone,
    {
        Self::new(initial.clone(), initial)
    }

    /// The currently-readable member.
    #[inline]
    pub fn source(&self) -> &T {
        if self.source_is_b {
            &self.b
        } else {
            &self.a
        }
    }

    /// The currently-writable member.
    #[inline]
    pub fn target(&self) -> &T {
        if self.source_is_b {
            &self.a
        } else {
            &self.b
        }
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut T {
        if self.source_is_b {
            &mut self.b
        } else {
            &mut self.a
        }
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut T {
        if self.source_is_b {
            &mut self.a
        } else {
            &mut self.b
        }
    }

    /// Borrow the source for reading and the target for writing at once.
    #[inline]
    pub fn source_and_target_mut(&mut self) -> (&T, &mut T) {
        if self.source_is_b {
            (&self.b, &mut self.a)
        } else {
            (&self.a, &mut self.b)
        }
    }

    /// Physical slot currently acting as the source.
    #[inline]
    pub fn source_slot(&self) -> Slot {
        if self.source_is_b {
            Slot::B
        } else {
            Slot::A
        }
    }

    /// 0 while `A` is the source, 1 while `B` is.
    #[inline]
    pub fn parity(&self) -> usize {
        self.source_is_b as usize
    }

    /// Number of swaps since construction.
    #[inline]
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Exchange source and target roles.
    ///
    /// The previous target (holding this frame's output) becomes next frame's source.
    pub fn swap(&mut self) {
        self.source_is_b = !self.source_is_b;
        self.swaps += 1;
    }

    /// Direct access to a physical member regardless of role.
    pub fn slot(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }
}

/// Position and velocity pairs that always swap together.
#[derive(Debug)]
pub struct StateBuffers<T> {
    pub positions: PingPong<T>,
    pub velocities: PingPong<T>,
}

impl<T> StateBuffers<T> {
    pub fn new(positions: PingPong<T>, velocities: PingPong<T>) -> Self {
        Self {
            positions,
            velocities,
        }
    }

    /// Swap every tracked quantity. Call exactly once per frame, after both kernels.
    pub fn swap(&mut self) {
        self.positions.swap();
        self.velocities.swap();
        debug_assert_eq!(self.positions.parity(), self.velocities.parity());
    }

    /// Shared parity of both pairs.
    #[inline]
    pub fn parity(&self) -> usize {
        self.positions.parity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_alternate_with_parity() {
        let mut pair = PingPong::new("a", "b");
        for k in 0..10u64 {
            assert_eq!(pair.swaps(), k);
            if k % 2 == 0 {
                assert_eq!(*pair.source(), "a");
                assert_eq!(*pair.target(), "b");
                assert_eq!(pair.source_slot(), Slot::A);
            } else {
                assert_eq!(*pair.source(), "b");
                assert_eq!(*pair.target(), "a");
                assert_eq!(pair.source_slot(), Slot::B);
            }
            pair.swap();
        }
    }

    #[test]
    fn test_target_write_becomes_source_after_swap() {
        let mut pair = PingPong::from_initial(vec![0u32; 4]);
        {
            let (source, target) = pair.source_and_target_mut();
            for (dst, src) in target.iter_mut().zip(source.iter()) {
                *dst = src + 7;
            }
        }
        assert_eq!(pair.source(), &vec![0; 4]);
        pair.swap();
        assert_eq!(pair.source(), &vec![7; 4]);
        assert_eq!(pair.target(), &vec![0; 4]);
    }

    #[test]
    fn test_mut_accessors_follow_roles() {
        let mut pair = PingPong::new(0, 0);
        *pair.target_mut() = 5;
        *pair.source_mut() = 1;
        assert_eq!(*pair.slot(Slot::A), 1);
        assert_eq!(*pair.slot(Slot::B), 5);
        pair.swap();
        *pair.target_mut() += 10;
        assert_eq!(*pair.slot(Slot::A), 11);
        assert_eq!(*pair.source(), 5);
    }

    #[test]
    fn test_source_and_target_never_alias() {
        let mut pair = PingPong::from_initial([0.0f32; 2]);
        for _ in 0..3 {
            let src = pair.source() as *const _;
            let dst = pair.target() as *const _;
            assert_ne!(src, dst);
            pair.swap();
        }
    }

    #[test]
    fn test_state_buffers_swap_together() {
        let mut state = StateBuffers::new(PingPong::new(1, 2), PingPong::new(3, 4));
        state.swap();
        assert_eq!(state.parity(), 1);
        assert_eq!(*state.positions.source(), 2);
        assert_eq!(*state.velocities.source(), 4);
        state.swap();
        assert_eq!(state.parity(), 0);
        assert_eq!(*state.velocities.target(), 4);
    }
}
