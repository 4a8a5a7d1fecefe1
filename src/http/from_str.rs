//! Parsing of route parameters and query values.
//!
//! [`Context::params_parse`](crate::Context::params_parse) and
//! [`Context::query_parse`](crate::Context::query_parse) parse through
//! this trait, and turn parse errors into `400 Bad Request`.

use std::borrow::Cow;
use std::convert::Infallible;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::*;

/// A type that can be parsed from a parameter value.
///
/// Parameter values live as long as the request, so an implementation
/// may borrow from them: a `&str` parameter is never copied.
///
/// An absent optional parameter is the empty string. `Option<T>` parses
/// it as `None`, while most other types reject it.
pub trait FromStr<'a>: Sized {
    type Err: Error + Send + Sync + 'static;

    fn from_str(value: &'a str) -> Result<Self, Self::Err>;
}

impl<'a> FromStr<'a> for &'a str {
    type Err = Infallible;

    fn from_str(value: &'a str) -> Result<Self, Self::Err> {
        Ok(value)
    }
}

impl<'a> FromStr<'a> for Cow<'a, str> {
    type Err = Infallible;

    fn from_str(value: &'a str) -> Result<Self, Self::Err> {
        Ok(Cow::Borrowed(value))
    }
}

impl<'a, T> FromStr<'a> for Option<T>
where
    T: FromStr<'a>,
{
    type Err = T::Err;

    fn from_str(value: &'a str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(None),
            value => T::from_str(value).map(Some),
        }
    }
}

from_std! {
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    NonZeroU8, NonZeroU16, NonZeroU32, NonZeroU64, NonZeroUsize,
    NonZeroI32, NonZeroI64,
    IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, bool, char, String
}

// Types whose `std::str::FromStr` implementation is used as is.
macro_rules! from_std {
    ($($T:ty),+ $(,)?) => ($(
        impl<'a> FromStr<'a> for $T {
            type Err = <$T as std::str::FromStr>::Err;

            #[inline]
            fn from_str(value: &'a str) -> Result<Self, Self::Err> {
                value.parse()
            }
        }
    )+)
}

pub(self) use from_std;
