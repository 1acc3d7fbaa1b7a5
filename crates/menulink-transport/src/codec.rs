//! Pure helpers for the WebSocket envelope: the handshake accept key and
//! payload masking.

use data_encoding::BASE64;
use sha1::{Digest, Sha1};

/// GUID appended to the client key before hashing (RFC 6455 §1.3).
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes `Sec-WebSocket-Accept` for a client's `Sec-WebSocket-Key`.
///
/// `accept = Base64(SHA1(key + GUID))`. The key is used verbatim, exactly
/// as it appeared in the request header.
///
/// ```rust
/// use menulink_transport::codec::websocket_accept_key;
///
/// assert_eq!(
///     websocket_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=",
/// );
/// ```
pub fn websocket_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(&hasher.finalize())
}

/// Builds the `101 Switching Protocols` response for an accepted upgrade.
pub fn upgrade_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\r\n"
    )
}

/// XORs `data` in place with `mask`, where `data[0]` sits at byte `offset`
/// of the frame payload. Applying it twice restores the input.
///
/// The offset lets a payload that arrives over several reads be unmasked
/// piece by piece.
pub fn mask_payload(data: &mut [u8], mask: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[(offset + i) % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accept_key_matches_rfc6455_example() {
        assert_eq!(
            websocket_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_upgrade_response_layout() {
        let resp = upgrade_response("abc=");
        assert!(resp.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(resp.contains("\r\nUpgrade: websocket\r\n"));
        assert!(resp.contains("\r\nConnection: Upgrade\r\n"));
        assert!(resp.ends_with("Sec-WebSocket-Accept: abc=\r\n\r\n"));
    }

    #[test]
    fn test_mask_uses_position_modulo_four() {
        let mut data = [0u8; 6];
        mask_payload(&mut data, [1, 2, 3, 4], 0);
        assert_eq!(data, [1, 2, 3, 4, 1, 2]);

        let mut data = [0u8; 3];
        mask_payload(&mut data, [1, 2, 3, 4], 3);
        assert_eq!(data, [4, 1, 2]);
    }

    proptest! {
        #[test]
        fn prop_unmask_of_mask_is_identity(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            mask in any::<[u8; 4]>(),
        ) {
            let mut data = payload.clone();
            mask_payload(&mut data, mask, 0);
            mask_payload(&mut data, mask, 0);
            prop_assert_eq!(data, payload);
        }

        #[test]
        fn prop_split_masking_matches_whole(
            payload in proptest::collection::vec(any::<u8>(), 1..256),
            mask in any::<[u8; 4]>(),
            split in 0usize..256,
        ) {
            let split = split % payload.len();
            let mut whole = payload.clone();
            mask_payload(&mut whole, mask, 0);

            let mut pieces = payload.clone();
            let (head, tail) = pieces.split_at_mut(split);
            mask_payload(head, mask, 0);
            mask_payload(tail, mask, split);
            prop_assert_eq!(pieces, whole);
        }
    }
}
