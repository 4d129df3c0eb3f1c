//! The transfer encoding for parsed objects.
//!
//! Parsed objects are handed between processes as a flat sequence of
//! fields. Integers are written in the host’s native byte order with a
//! fixed width, strings and byte slices are preceded by their length as a
//! `u64`, and absent optional strings are written as empty strings.
//!
//! Both sides of the exchange run on the same host, so the native byte
//! order is the same for writer and reader.
//!
//! [`Composer`] writes the fields and [`Parser`] reads them back. The
//! parser never reads beyond the end of its data and fails with a
//! [`TransportError`] instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use super::error::TransportError;
use super::x509::Time;


//------------ Composer ------------------------------------------------------

/// Assembles the transfer encoding of an object.
#[derive(Clone, Debug, Default)]
pub struct Composer {
    buf: BytesMut,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32_ne(value)
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value)
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_ne(value)
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_ne(value)
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64_ne(value)
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64_ne(value)
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_i32(i32::from(value))
    }

    /// Appends a length, i.e., a count or the size of a string.
    pub fn put_len(&mut self, len: usize) {
        // usize is at most 64 bits wide on all supported platforms.
        self.put_u64(len as u64)
    }

    /// Appends octets without a length.
    pub fn put_fixed(&mut self, data: &[u8]) {
        self.buf.put_slice(data)
    }

    /// Appends a length-prefixed string.
    pub fn put_str(&mut self, value: &str) {
        self.put_len(value.len());
        self.buf.put_slice(value.as_bytes())
    }

    /// Appends an optional string as an empty one if absent.
    pub fn put_opt_str(&mut self, value: Option<&str>) {
        self.put_str(value.unwrap_or(""))
    }

    /// Appends a time as seconds since the Unix epoch.
    pub fn put_time(&mut self, value: Time) {
        self.put_i64(value.timestamp())
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}


//------------ Parser --------------------------------------------------------

/// Reads the transfer encoding of an object.
#[derive(Clone, Debug)]
pub struct Parser {
    data: Bytes,
}

impl Parser {
    pub fn new(data: Bytes) -> Self {
        Parser { data }
    }

    /// Returns the number of octets left to read.
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    /// Makes sure at least `len` octets are left.
    fn check_remaining(&self, len: u64) -> Result<(), TransportError> {
        if (self.remaining() as u64) < len {
            Err(TransportError::truncated(len, self.remaining()))
        }
        else {
            Ok(())
        }
    }

    pub fn get_i32(&mut self) -> Result<i32, TransportError> {
        self.check_remaining(4)?;
        Ok(self.data.get_i32_ne())
    }

    pub fn get_u8(&mut self) -> Result<u8, TransportError> {
        self.check_remaining(1)?;
        Ok(self.data.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16, TransportError> {
        self.check_remaining(2)?;
        Ok(self.data.get_u16_ne())
    }

    pub fn get_u32(&mut self) -> Result<u32, TransportError> {
        self.check_remaining(4)?;
        Ok(self.data.get_u32_ne())
    }

    pub fn get_u64(&mut self) -> Result<u64, TransportError> {
        self.check_remaining(8)?;
        Ok(self.data.get_u64_ne())
    }

    pub fn get_i64(&mut self) -> Result<i64, TransportError> {
        self.check_remaining(8)?;
        Ok(self.data.get_i64_ne())
    }

    /// Reads a flag written by [`Composer::put_bool`].
    ///
    /// Values other than 0 and 1 are rejected.
    pub fn get_bool(&mut self) -> Result<bool, TransportError> {
        match self.get_i32()? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(TransportError::bad_flag(flag))
        }
    }

    /// Reads a count of items that are at least `item_len` octets each.
    ///
    /// Fails if the remaining data cannot possibly hold that many items so
    /// that callers can safely reserve space for them.
    pub fn get_count(
        &mut self, item_len: usize
    ) -> Result<usize, TransportError> {
        let count = self.get_u64()?;
        let needed = count.checked_mul(item_len as u64).ok_or_else(|| {
            TransportError::truncated(u64::MAX, self.remaining())
        })?;
        self.check_remaining(needed)?;
        // needed fits into the remaining data, so count fits into usize.
        Ok(count as usize)
    }

    /// Reads exactly `len` octets.
    pub fn get_fixed(&mut self, len: usize) -> Result<Bytes, TransportError> {
        self.check_remaining(len as u64)?;
        Ok(self.data.split_to(len))
    }

    /// Reads exactly `N` octets into an array.
    pub fn get_array<const N: usize>(
        &mut self
    ) -> Result<[u8; N], TransportError> {
        self.check_remaining(N as u64)?;
        let mut res = [0u8; N];
        self.data.copy_to_slice(&mut res);
        Ok(res)
    }

    /// Reads a length-prefixed string.
    pub fn get_string(&mut self) -> Result<String, TransportError> {
        let len = self.get_u64()?;
        self.check_remaining(len)?;
        let data = self.data.split_to(len as usize);
        String::from_utf8(data.to_vec()).map_err(|_| {
            TransportError::bad_string()
        })
    }

    /// Reads an optional string, treating an empty string as absent.
    pub fn get_opt_string(
        &mut self
    ) -> Result<Option<String>, TransportError> {
        self.get_string().map(|s| if s.is_empty() { None } else { Some(s) })
    }

    /// Reads a time written by [`Composer::put_time`].
    pub fn get_time(&mut self) -> Result<Time, TransportError> {
        let secs = self.get_i64()?;
        Time::from_timestamp(secs).ok_or_else(|| {
            TransportError::bad_time(secs)
        })
    }

    /// Makes sure all data has been consumed.
    pub fn finish(self) -> Result<(), TransportError> {
        if self.data.is_empty() {
            Ok(())
        }
        else {
            Err(TransportError::trailing_data(self.data.len()))
        }
    }
}


//============ Tests =========================================================
