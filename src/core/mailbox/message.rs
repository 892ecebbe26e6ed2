//! Message encoding traits and declaration macros
//!
//! [`Message`] is the per-type wire contract: a fixed encoded size plus
//! encode/decode into caller-provided byte slices. Flat copyable types get
//! the impl for free through [`flat_message!`], which routes through
//! `bytemuck` so only genuinely plain-old-data types qualify.
//!
//! [`MessageSet`] is the closed set of types one mailbox carries. The
//! [`message_set!`] macro declares the set as an enum and derives the tag
//! assignment (declaration order), payload sizing, and dispatch. Tags are
//! positional, so reordering variants changes the format.

/// Fixed-size wire encoding for one message type.
///
/// `encode` may assume `buf` holds at least [`ENCODED_SIZE`] bytes; `decode`
/// must reject slices of any other length rather than panic.
///
/// [`ENCODED_SIZE`]: Message::ENCODED_SIZE
pub trait Message: Sized {
    /// Exact number of bytes `encode` writes.
    const ENCODED_SIZE: usize;

    /// Write the encoded form into the front of `buf`.
    fn encode(&self, buf: &mut [u8]);

    /// Parse an encoded payload. Returns `None` for a wrong length or an
    /// invalid bit pattern.
    fn decode(buf: &[u8]) -> Option<Self>;
}

/// Closed set of message types carried by one mailbox.
///
/// Implemented by [`message_set!`]; rarely hand-written. Tags identify the
/// variant on the wire and are assigned in declaration order starting at 0.
pub trait MessageSet: Sized {
    /// Largest alignment requirement among the member payload types.
    const MAX_ALIGN: usize;

    /// Wire tag of this value's variant.
    fn tag(&self) -> u8;

    /// Encoded payload size of this value.
    fn payload_size(&self) -> usize;

    /// Encode this value's payload into the front of `buf`.
    fn encode_payload(&self, buf: &mut [u8]);

    /// Decode a payload for `tag`. Returns `None` for an undeclared tag or
    /// a payload the member type rejects.
    fn decode_payload(tag: u8, payload: &[u8]) -> Option<Self>;
}

/// Implement [`Message`] for plain-old-data types by flat byte copy.
///
/// The types must be `bytemuck::Pod`, which rules out padding, references,
/// and types with invalid bit patterns. Decoding copies out of the payload
/// slice, so unaligned records are fine.
#[macro_export]
macro_rules! flat_message {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::core::mailbox::Message for $ty {
                const ENCODED_SIZE: usize = ::core::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_SIZE].copy_from_slice(::bytemuck::bytes_of(self));
                }

                fn decode(buf: &[u8]) -> Option<Self> {
                    ::bytemuck::try_pod_read_unaligned(buf).ok()
                }
            }
        )+
    };
}

flat_message!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Declare a mailbox message set.
///
/// Expands to the enum itself, a `From` impl per member type so call sites
/// can pass payloads directly, and the [`MessageSet`] impl. Variant tags
/// follow declaration order, so the declaration is the wire contract.
///
/// # Example
///
/// ```
/// mp3_deck::message_set! {
///     pub enum TelemetryMessage {
///         SampleCount(u32),
///         Voltage(f32),
///     }
/// }
/// ```
#[macro_export]
macro_rules! message_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $variant($ty)),+
        }

        $(
            impl ::core::convert::From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+

        impl $crate::core::mailbox::MessageSet for $name {
            const MAX_ALIGN: usize = {
                let mut max = 1;
                $(
                    if ::core::mem::align_of::<$ty>() > max {
                        max = ::core::mem::align_of::<$ty>();
                    }
                )+
                max
            };

            fn tag(&self) -> u8 {
                #[allow(dead_code)]
                #[repr(u8)]
                enum Tag { $($variant),+ }
                match self {
                    $($name::$variant(_) => Tag::$variant as u8),+
                }
            }

            fn payload_size(&self) -> usize {
                match self {
                    $($name::$variant(_) => <$ty as $crate::core::mailbox::Message>::ENCODED_SIZE),+
                }
            }

            fn encode_payload(&self, buf: &mut [u8]) {
                match self {
                    $($name::$variant(value) => $crate::core::mailbox::Message::encode(value, buf)),+
                }
            }

            fn decode_payload(tag: u8, payload: &[u8]) -> Option<Self> {
                #[allow(dead_code)]
                #[repr(u8)]
                enum Tag { $($variant),+ }
                $(
                    if tag == Tag::$variant as u8 {
                        return <$ty as $crate::core::mailbox::Message>::decode(payload)
                            .map($name::$variant);
                    }
                )+
                None
            }
        }

        // Tag 255 is reserved for untyped blobs.
        const _: () = assert!(
            [$(stringify!($variant)),+].len() < 255,
            "message set exceeds the available tag space"
        );
    };
}
