//! Sliding-bitmap replay window for datagram mode.
//!
//! Unlike a conventional seen-bitmap (bit set = "already received"), this
//! window tracks "late" sequence numbers: a set bit means that sequence
//! number has *not* been received yet even though `inseqno` has already
//! passed it. This matches the reference implementation's
//! `sptps_check_seqno` exactly and is what lets the window both reject
//! duplicates and accept reordered packets that eventually arrive.

use crate::core::SptpsError;

/// `replaywin` bytes, i.e. `8 * replaywin` tracked past sequence numbers.
pub struct ReplayWindow {
    /// One bit per tracked sequence number; index 0 is the bit for
    /// `inseqno - 1`. Empty when `replaywin == 0` (window disabled).
    late: Vec<u8>,
    /// Count of recent far-future observations; resets to zero whenever a
    /// packet is accepted.
    farfuture: u32,
}

/// Outcome of a successful replay-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// The new `inseqno` after this packet.
    pub new_inseqno: u32,
    /// Whether the window was wiped because of a far-future flood.
    pub window_wiped: bool,
}

impl ReplayWindow {
    /// Create a window tracking `replaywin` bytes (`0` disables replay
    /// checking entirely).
    pub fn new(replaywin: usize) -> Self {
        Self {
            late: vec![0u8; replaywin],
            farfuture: 0,
        }
    }

    /// Size of the window in bytes, as configured.
    pub fn len(&self) -> usize {
        self.late.len()
    }

    /// `true` if the window is disabled (`replaywin == 0`).
    pub fn is_empty(&self) -> bool {
        self.late.is_empty()
    }

    fn bits(&self) -> usize {
        self.late.len() * 8
    }

    fn bit(&self, offset: usize) -> bool {
        self.late[offset / 8] & (1 << (offset % 8)) != 0
    }

    fn set_bit(&mut self, offset: usize) {
        self.late[offset / 8] |= 1 << (offset % 8);
    }

    fn clear_bit(&mut self, offset: usize) {
        self.late[offset / 8] &= !(1 << (offset % 8));
    }

    /// Check `seqno` against `inseqno`, optionally updating internal
    /// state. Returns the new `inseqno` (and whether the window was
    /// wiped) on acceptance, or the rejection reason.
    ///
    /// When `update_state` is false (the `verify_datagram` fast path),
    /// this only inspects state; no bits or counters change.
    pub fn check(
        &mut self,
        inseqno: u32,
        seqno: u32,
        update_state: bool,
    ) -> Result<Accepted, SptpsError> {
        if self.is_empty() {
            return Ok(Accepted {
                new_inseqno: seqno.max(inseqno),
                window_wiped: false,
            });
        }

        let window = self.bits() as u64;
        // The far-future threshold is a count of bytes, not bits,
        // matching the reference implementation's `replaywin >> 2`.
        let farfuture_threshold = self.late.len() as u64 / 4;

        if seqno >= inseqno {
            let gap = (seqno - inseqno) as u64;
            if gap >= window {
                // Far future.
                if update_state {
                    self.farfuture += 1;
                }
                if (self.farfuture as u64) < farfuture_threshold {
                    return Err(SptpsError::FarFuture);
                }
                if update_state {
                    self.late.iter_mut().for_each(|b| *b = 0xFF);
                    self.clear_bit(0);
                    self.farfuture = 0;
                }
                return Ok(Accepted {
                    new_inseqno: seqno.wrapping_add(1),
                    window_wiped: true,
                });
            }

            if update_state {
                // Shift so offset 0 becomes `seqno` (the one just
                // received); offsets 1..=gap, which become the
                // previously-skipped range [inseqno, seqno), are marked
                // late.
                self.shift(gap as usize + 1);
                for skipped in 1..=gap as usize {
                    self.set_bit(skipped);
                }
                self.clear_bit(0);
                self.farfuture = 0;
            }
            return Ok(Accepted {
                new_inseqno: seqno.wrapping_add(1),
                window_wiped: false,
            });
        }

        // seqno < inseqno: a sequence number we've already advanced past.
        let age = (inseqno - seqno) as u64;
        if age > window {
            return Err(SptpsError::LateOrReplay);
        }
        let offset = (age - 1) as usize;
        if !self.bit(offset) {
            // Already received: a duplicate.
            return Err(SptpsError::LateOrReplay);
        }
        if update_state {
            self.clear_bit(offset);
            self.farfuture = 0;
        }
        Ok(Accepted {
            new_inseqno: inseqno,
            window_wiped: false,
        })
    }

    /// Shift the tracked bits forward by `n` positions, discarding the
    /// oldest `n` bits and making room for `n` fresh (clear) bits at the
    /// front.
    fn shift(&mut self, n: usize) {
        let bits = self.bits();
        if n >= bits {
            self.late.iter_mut().for_each(|b| *b = 0);
            return;
        }
        for i in (0..bits).rev() {
            let from = i.checked_sub(n);
            let value = from.map(|f| self.bit(f)).unwrap_or(false);
            if value {
                self.set_bit(i);
            } else {
                self.clear_bit(i);
            }
        }
    }
}
