// SPDX-License-Identifier: Apache-2.0

//! A name-indexed registry of text encodings. UTF-8 is the first-class path
//! through the buffer read/write surface; everything else goes through an
//! [`Encoding`] looked up here by name. The built-ins are `utf-8`, `us-ascii`
//! and `iso-8859-1`; more can be added with [`register`].

use std::collections::HashMap;
use std::sync::RwLock;
use once_cell::sync::Lazy;
use simdutf8::compat::from_utf8;
use crate::{ByteString, Error, Result};
use crate::error::Context::{Decode, Encode as EncodeCtx};

/// A bidirectional mapping between text and bytes.
pub trait Encoding: Send + Sync {
	/// The registry name, lowercase.
	fn name(&self) -> &'static str;

	/// Encodes `text` into bytes, failing with a format error on unmappable
	/// characters.
	fn encode(&self, text: &str) -> Result<ByteString>;

	/// Decodes `bytes` into text, failing with a format error on byte sequences
	/// with no mapping.
	fn decode(&self, bytes: &[u8]) -> Result<String>;
}

#[derive(Debug, thiserror::Error)]
#[error("character `{char}` (U+{code:04X}) has no mapping in {encoding}")]
struct Unmappable {
	char: char,
	code: u32,
	encoding: &'static str,
}

#[derive(Debug, thiserror::Error)]
#[error("byte `{byte:#04X}` at {index} has no mapping in {encoding}")]
struct Unrepresentable {
	byte: u8,
	index: usize,
	encoding: &'static str,
}

static REGISTRY: Lazy<RwLock<HashMap<&'static str, &'static dyn Encoding>>> =
	Lazy::new(|| {
		let mut map: HashMap<&'static str, &'static dyn Encoding> = HashMap::new();
		map.insert(Utf8.name(), &Utf8);
		map.insert(Ascii.name(), &Ascii);
		map.insert(Latin1.name(), &Latin1);
		RwLock::new(map)
	});

/// Finds an encoding by its lowercase name.
pub fn lookup(name: &str) -> Option<&'static dyn Encoding> {
	let registry = REGISTRY.read().ok()?;
	registry.get(name.to_ascii_lowercase().as_str()).copied()
}

/// Registers an encoding under [its name](Encoding::name), replacing any
/// previous entry.
pub fn register(encoding: &'static dyn Encoding) {
	if let Ok(mut registry) = REGISTRY.write() {
		registry.insert(encoding.name(), encoding);
	}
}

/// UTF-8, the identity path.
pub struct Utf8;

impl Encoding for Utf8 {
	fn name(&self) -> &'static str { "utf-8" }

	fn encode(&self, text: &str) -> Result<ByteString> {
		Ok(text.as_bytes().into())
	}

	fn decode(&self, bytes: &[u8]) -> Result<String> {
		let str = from_utf8(bytes).map_err(|err| Error::format(Decode, err))?;
		Ok(str.to_owned())
	}
}

/// US-ASCII: seven-bit characters only.
pub struct Ascii;

impl Encoding for Ascii {
	fn name(&self) -> &'static str { "us-ascii" }

	fn encode(&self, text: &str) -> Result<ByteString> {
		let mut data = Vec::with_capacity(text.len());
		for char in text.chars() {
			if !char.is_ascii() {
				return Err(Error::format(EncodeCtx, Unmappable {
					char,
					code: char as u32,
					encoding: self.name(),
				}))
			}
			data.push(char as u8);
		}
		Ok(data.into())
	}

	fn decode(&self, bytes: &[u8]) -> Result<String> {
		if let Some(index) = bytes.iter().position(|byte| !byte.is_ascii()) {
			return Err(Error::format(Decode, Unrepresentable {
				byte: bytes[index],
				index,
				encoding: self.name(),
			}))
		}
		Ok(bytes.iter().map(|&byte| byte as char).collect())
	}
}

/// ISO-8859-1: the first 256 Unicode code points, one byte each.
pub struct Latin1;

impl Encoding for Latin1 {
	fn name(&self) -> &'static str { "iso-8859-1" }

	fn encode(&self, text: &str) -> Result<ByteString> {
		let mut data = Vec::with_capacity(text.len());
		for char in text.chars() {
			let code = char as u32;
			if code > 0xFF {
				return Err(Error::format(EncodeCtx, Unmappable {
					char,
					code,
					encoding: self.name(),
				}))
			}
			data.push(code as u8);
		}
		Ok(data.into())
	}

	fn decode(&self, bytes: &[u8]) -> Result<String> {
		Ok(bytes.iter().map(|&byte| byte as char).collect())
	}
}
