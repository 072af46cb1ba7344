//! Bounded copy of untrusted-length data out of the traced process.
//!
//! Both the pointer and the length come straight from registers of the
//! traced function, so neither is trusted. A length outside the allowed range
//! is rejected outright: the data is never clamped or masked into range,
//! since a truncated copy would present corrupt data as valid.

use crate::probe::ProbeError;

/// Fault-tolerant read of the traced process's memory.
///
/// Implementations must never fault the host: in BPF this is
/// `bpf_probe_read_user`, which reports a bad address as an error code.
pub trait UserMemory {
    /// Fill `dst` from `addr` in the traced address space.
    ///
    /// # Errors
    /// Returns the host's negative error code if any byte could not be read.
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), i64>;
}

/// Copy `declared_len` bytes from `src` into `dst`.
///
/// Succeeds only for `0 <= declared_len < N` (and `declared_len != 0` unless
/// `allow_empty`). On success `dst[..len]` holds the source bytes and
/// `dst[len..]` is zero; the effective length is returned. On any failure
/// `dst` is left all zero.
///
/// # Errors
/// - [`ProbeError::BoundsViolation`] for an out-of-range length, with no read
///   attempted.
/// - [`ProbeError::CopyFault`] if the source could not be read.
pub fn bounded_copy<M, const N: usize>(
    mem: &M,
    src: u64,
    declared_len: i64,
    dst: &mut [u8; N],
    allow_empty: bool,
) -> Result<usize, ProbeError>
where
    M: UserMemory + ?Sized,
{
    *dst = [0u8; N];

    if declared_len < 0 || (declared_len == 0 && !allow_empty) {
        return Err(ProbeError::BoundsViolation { declared: declared_len });
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let len = declared_len as u64 as usize;
    if len >= N {
        return Err(ProbeError::BoundsViolation { declared: declared_len });
    }
    if len == 0 {
        return Ok(0);
    }

    if let Err(code) = mem.read_user(src, &mut dst[..len]) {
        *dst = [0u8; N];
        return Err(ProbeError::CopyFault { code });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat memory image starting at `base`.
    struct Image {
        base: u64,
        bytes: Vec<u8>,
    }

    impl UserMemory for Image {
        fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), i64> {
            let start = addr.checked_sub(self.base).ok_or(-14)? as usize;
            let end = start + dst.len();
            let src = self.bytes.get(start..end).ok_or(-14)?;
            dst.copy_from_slice(src);
            Ok(())
        }
    }

    fn image(bytes: &[u8]) -> Image {
        Image { base: 0x1000, bytes: bytes.to_vec() }
    }

    #[test]
    fn copies_prefix_and_zero_fills_rest() {
        let mem = image(b"helloworld-and-more");
        let mut dst = [0xAAu8; 16];
        let len = bounded_copy(&mem, 0x1000, 10, &mut dst, true).unwrap();
        assert_eq!(len, 10);
        assert_eq!(&dst[..10], b"helloworld");
        assert!(dst[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn every_in_range_length_copies_exactly() {
        let source: Vec<u8> = (1..=255u8).collect();
        let mem = image(&source);
        for n in 0..128i64 {
            let mut dst = [0u8; 128];
            let len = bounded_copy(&mem, 0x1000, n, &mut dst, true).unwrap();
            assert_eq!(len as i64, n);
            assert_eq!(&dst[..len], &source[..len]);
            assert!(dst[len..].iter().all(|&b| b == 0), "tail not zero for n={n}");
        }
    }

    #[test]
    fn rejects_negative_length() {
        let mem = image(b"abc");
        let mut dst = [0u8; 8];
        let err = bounded_copy(&mem, 0x1000, -1, &mut dst, true).unwrap_err();
        assert_eq!(err, ProbeError::BoundsViolation { declared: -1 });
    }

    #[test]
    fn rejects_length_at_capacity_without_truncating() {
        let mem = image(&[7u8; 64]);
        let mut dst = [0u8; 8];
        let err = bounded_copy(&mem, 0x1000, 8, &mut dst, true).unwrap_err();
        assert_eq!(err, ProbeError::BoundsViolation { declared: 8 });
        assert_eq!(dst, [0u8; 8]);
    }

    #[test]
    fn zero_length_follows_policy() {
        let mem = image(b"");
        let mut dst = [0u8; 8];
        assert_eq!(bounded_copy(&mem, 0, 0, &mut dst, true), Ok(0));
        assert_eq!(
            bounded_copy(&mem, 0, 0, &mut dst, false),
            Err(ProbeError::BoundsViolation { declared: 0 })
        );
    }

    #[test]
    fn fault_leaves_destination_zeroed() {
        let mem = image(b"abc");
        let mut dst = [0x55u8; 8];
        let err = bounded_copy(&mem, 0x1000, 5, &mut dst, true).unwrap_err();
        assert_eq!(err, ProbeError::CopyFault { code: -14 });
        assert_eq!(dst, [0u8; 8]);
    }
}
