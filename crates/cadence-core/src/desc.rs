//! Cadence descriptor format — the unit that moves through the pacing engine.
//!
//! These types ARE the interface between the upstream completion ring, the
//! pacing engine, and the downstream work list. Every field and every
//! reserved byte is part of the format; changing anything here changes what
//! the surrounding stages see on their rings.
//!
//! All types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Packet Descriptor ────────────────────────────────────────────────────────

/// One finished packet, as delivered by the upstream completion ring and as
/// forwarded to the downstream work list.
///
/// The descriptor never carries payload bytes — `buf_lo`/`buf_hi` form an
/// opaque 40-bit payload handle owned by whichever slot (or output buffer)
/// currently holds the descriptor.
///
/// Wire size: 16 bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PacketDesc {
    /// Destination work-queue id.
    pub dst_q: u8,

    /// Bit flags — see `FLAG_EOP`, `FLAG_RESET`. Remaining bits reserved,
    /// must be zero.
    pub flags: u8,

    /// Per-destination sequence number. Zero on ingress; assigned by the
    /// dequeue path immediately before forwarding. Wraps at u16::MAX.
    pub seq: u16,

    /// Byte offset of the packet data within the payload buffer.
    pub offset: u16,

    /// Pacing field: bits 0-11 rate code, bits 12-15 flow id.
    /// Consumed at admission and zeroed in the stored descriptor.
    pub pacing: u16,

    /// Payload handle, low 32 bits.
    pub buf_lo: u32,

    /// Payload handle, high 8 bits (40-bit handle total).
    pub buf_hi: u8,

    /// Segmentation tag — see `SEG_NONE` / `SEG_CONT` / `SEG_LAST`.
    /// A non-`SEG_NONE` tag on a ring descriptor with EOP clear announces a
    /// segmented burst carried on the side ring.
    pub seg: u8,

    /// Reserved, must be zero.
    pub reserved: u16,
}

// Compile-time size guard. If this fails, the descriptor layout has
// silently changed.
assert_eq_size!(PacketDesc, [u8; 16]);

/// End-of-packet: this descriptor completes a packet and is eligible for
/// pacing. Descriptors without it are bookkeeping-only.
pub const FLAG_EOP: u8 = 0x01;

/// Queue-reset marker propagated downstream unchanged.
pub const FLAG_RESET: u8 = 0x02;

/// Not part of a segmented burst.
pub const SEG_NONE: u8 = 0x00;

/// Segment of a burst; more segments follow on the side ring.
pub const SEG_CONT: u8 = 0x01;

/// Final segment of a burst; ends the side-ring read loop.
pub const SEG_LAST: u8 = 0x02;

impl PacketDesc {
    pub fn eop(&self) -> bool {
        self.flags & FLAG_EOP != 0
    }

    /// Rate code — low 12 bits of the pacing field.
    pub fn rate_code(&self) -> u16 {
        self.pacing & 0x0fff
    }

    /// Flow id — high 4 bits of the pacing field.
    pub fn flow_id(&self) -> u8 {
        (self.pacing >> 12) as u8 & 0x0f
    }

    /// 40-bit payload handle.
    pub fn buf_handle(&self) -> u64 {
        ((self.buf_hi as u64) << 32) | self.buf_lo as u64
    }

    /// Zero the pacing field. Called once at admission; the stored and
    /// forwarded descriptor never carries rate metadata.
    pub fn clear_pacing(&mut self) {
        self.pacing = 0;
    }
}

// ── Segment Descriptor ───────────────────────────────────────────────────────

/// One entry of the segmented-burst side ring.
///
/// Carries the segment's packet descriptor plus the completion sequence
/// number its DMA was issued under. The engine must not act on the segment
/// until the burst completion counter has caught up to `burst_seq`.
///
/// Wire size: 20 bytes.
#[derive(Debug, Default, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct SegmentDesc {
    pub desc: PacketDesc,
    pub burst_seq: u32,
}

assert_eq_size!(SegmentDesc, [u8; 20]);

// ── Constants ────────────────────────────────────────────────────────────────

/// Upstream batch size. The completion ring always hands the engine
/// descriptors in groups of this many; the served counter advances in the
/// same unit.
pub const BATCH_SIZE: usize = 8;

/// Output buffer count — the hard bound on descriptors in flight downstream.
pub const OUT_BUFS: usize = 8;

/// Acknowledgement batch size — per-destination completion counts are
/// flushed downstream in units of this many.
pub const ACK_BATCH: u32 = 8;

// ── Tests ────────────────────────────────────────────────────────────────────
