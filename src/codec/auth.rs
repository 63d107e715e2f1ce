//! # Sterzo Challenge Response
//!
//! The steering plate refuses to stream angles until it receives the correct
//! answer to a 16-bit challenge.
//!
//! **Transform**: `n = c mod 11`, `m = rotl16(c, n)`, `x = (c + 38550) xor m (mod 2^16)`,
//! `response = x mod 65336`
//!
//! The final modulus is 65336, not 65536. It matches the device firmware and must
//! not be changed.

/// Offset added to the challenge before mixing
const CHALLENGE_OFFSET: u16 = 38550;

/// Rotation amount modulus
const ROTATION_MODULUS: u16 = 11;

/// Final response modulus
const RESPONSE_MODULUS: u16 = 65336;

/// Compute the Sterzo handshake response for a challenge.
///
/// # Arguments
///
/// * `challenge` - Value carried by the `0x1003` challenge frame
///
/// # Returns
///
/// * `u16` - Value to send back in the `0x03 0x11` response frame
///
/// # Examples
///
/// ```
/// use trainer_bridge::codec::auth::response_code;
///
/// assert_eq!(response_code(12345), 18182);
/// ```
pub fn response_code(challenge: u16) -> u16 {
    let n = u32::from(challenge % ROTATION_MODULUS);
    let m = challenge.rotate_left(n);
    let x = challenge.wrapping_add(CHALLENGE_OFFSET) ^ m;
    x % RESPONSE_MODULUS
}
