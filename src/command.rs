//! Command-argument encoding: turns a Rust value a caller passes to
//! [`Client::send`](crate::client::Client::send) and friends into the byte
//! string RESP expects every command argument to be.
//!
//! Redis commands are always sent as an array of bulk strings -- there is
//! no structured-argument shape on the wire -- so [`ToArg`] only needs to
//! produce bytes, never a frame tree.

use crate::error::ClientError;

/// A value encodable as a single RESP command argument.
pub trait ToArg {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError>;
}

impl ToArg for str {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.to_vec())
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.clone())
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        (**self).to_arg()
    }
}

macro_rules! impl_to_arg_int {
    ($($t:ty),* $(,)?) => {
        $(impl ToArg for $t {
            fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
                Ok(self.to_string().into_bytes())
            }
        })*
    };
}

impl_to_arg_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_to_arg_float {
    ($($t:ty),* $(,)?) => {
        $(impl ToArg for $t {
            fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
                if !self.is_finite() {
                    return Err(ClientError::InvalidArgument);
                }
                // Shortest round-trip decimal, same representation a human
                // typing the value at `redis-cli` would produce.
                Ok(format!("{self}").into_bytes())
            }
        })*
    };
}

impl_to_arg_float!(f32, f64);

impl ToArg for bool {
    fn to_arg(&self) -> Result<Vec<u8>, ClientError> {
        Ok(if *self { b"1".to_vec() } else { b"0".to_vec() })
    }
}

/// Encodes a command name plus its argument list into the owned byte
/// strings [`crate::resp::encode_command`] writes to the wire. Structured
/// values (anything that is not a flat byte string, integer, float, or
/// bool) have no RESP command-argument encoding and are rejected here
/// rather than silently stringified.
pub fn encode_args<A: ToArg>(name: &str, args: &[A]) -> Result<Vec<Vec<u8>>, ClientError> {
    let mut out = Vec::with_capacity(args.len() + 1);
    out.push(name.as_bytes().to_vec());
    for a in args {
        out.push(a.to_arg()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_mixed_argument_types() {
        let args: Vec<Vec<u8>> = encode_args("SET", &["key".to_arg().unwrap()]).unwrap();
        assert_eq!(args[0], b"SET");
        assert_eq!(args[1], b"key");
    }

    #[test]
    fn integer_encodes_as_decimal() {
        assert_eq!(42i64.to_arg().unwrap(), b"42".to_vec());
    }

    #[test]
    fn bool_encodes_as_one_or_zero() {
        assert_eq!(true.to_arg().unwrap(), b"1".to_vec());
        assert_eq!(false.to_arg().unwrap(), b"0".to_vec());
    }

    #[test]
    fn nan_float_is_rejected() {
        assert!(f64::NAN.to_arg().is_err());
    }
}
