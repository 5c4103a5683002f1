use std::fmt::Debug;

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{DecodeError, EncodeError};

/// A type that owns its whole wire layout.
///
/// Register with
/// [`RegistryBuilder::register_packed`](crate::RegistryBuilder::register_packed).
/// On the wire the payload is framed by the registered name and a length
/// prefix, so `dump` and `load` only see their own bytes.
///
/// Aggregates that own children with back-edges rebuild those edges in
/// `load`: decode the children, construct the aggregate (for example with
/// [`Arc::new_cyclic`](std::sync::Arc::new_cyclic)) and hand each child a
/// `Weak` pointer to it.
///
/// # Example
///
/// ```
/// use tilepack_codec::{Decoder, DecodeError, Encoder, EncodeError, Packed};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Rgb(u8, u8, u8);
///
/// impl Packed for Rgb {
///     fn dump(&self, encoder: &mut Encoder<'_>) -> Result<(), EncodeError> {
///         encoder.write_raw(&[self.0, self.1, self.2]);
///         Ok(())
///     }
///
///     fn load(decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError> {
///         let [r, g, b] = decoder.read_array::<3>()?;
///         Ok(Rgb(r, g, b))
///     }
/// }
/// ```
pub trait Packed: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Write the payload.
    fn dump(&self, encoder: &mut Encoder<'_>) -> Result<(), EncodeError>;

    /// Read the payload back. `decoder` covers exactly the bytes `dump`
    /// produced; it may recurse into every other codec.
    fn load(decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError>;
}
