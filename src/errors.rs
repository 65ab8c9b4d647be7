//! Crate-wide error handling

error_chain! {
    foreign_links {
        Io(::std::io::Error)
        /// Generic IO error
        ;
        StringDecode(::std::string::FromUtf8Error)
        /// Error decoding a UTF-8 string
        ;
    }

    errors {
        // Validation errors (bad user input, caught before anything touches the wire)

        /// Returned when a lobby code isn't exactly 6 uppercase letters.
        /// 4-letter codes use a different, undocumented encoding this
        /// crate does not implement, so they are rejected unconditionally
        /// rather than partially supported.
        InvalidLobbyCode(code: String) {
            description("invalid lobby code")
            display("Invalid lobby code: {:?}", code)
        }
        /// Returned when a region/server name isn't recognised
        InvalidRegion(region: String) {
            description("invalid region")
            display("Unknown region: {:?}", region)
        }
        /// Returned when an impostor count is outside `0..=3`
        InvalidImpostorCount(count: u8) {
            description("invalid impostor count")
            display("Invalid impostor count: {} (expected 0-3)", count)
        }
        /// Returned when attempting to chat/move while in spectator mode
        SpectatorMisuse {
            description("action not allowed while spectating")
        }

        // Connection errors (transport-level)

        /// Returned when connecting to the remote host timed out
        ConnectTimeout {
            description("timed out connecting to server")
        }
        /// Returned when no datagram was received within `recv_timeout`
        ReceiveTimeout {
            description("timed out waiting for data from server")
        }
        /// Returned when the socket is no longer usable
        ConnectionClosed {
            description("connection was closed")
        }

        // Protocol errors (decode failures on a known tag)

        /// Returned when a tag-dispatched frame's payload didn't match its schema
        ProtocolDecode(what: &'static str) {
            description("protocol decode error")
            display("Failed to decode {}", what)
        }
        /// Returned when a nested frame's length prefix would read past
        /// the bytes available for it
        FrameTooShort {
            description("frame shorter than its length prefix claims")
        }
        /// Returned when a VarInt7 would require more than 5 bytes /
        /// overflow 32 bits
        VarIntOverflow {
            description("packed varint exceeds 32 bits")
        }

        // Server-initiated outcomes

        /// The server closed the connection with a reason
        ServerDisconnect(reason: u8, custom: Option<String>) {
            description("disconnected by server")
            display("Server disconnected us: reason {}{}", reason,
                custom.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default())
        }
        /// `JoinGame` failed with a reason instead of succeeding
        JoinGameFailed(reason: u8, custom: Option<String>) {
            description("failed to join game")
            display("Failed to join game: reason {}{}", reason,
                custom.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default())
        }

        // Internal invariants

        /// Returned if the 16-bit reliable id counter would wrap
        ReliableIdOverflow {
            description("reliable id counter overflowed")
        }
        /// Returned when a waiter was cancelled by a disconnect before
        /// its predicate matched
        WaiterCancelled {
            description("waiter cancelled by disconnect")
        }
    }
}
