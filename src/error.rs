// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{error, io, result};
use amplify_derive::Display;

pub type Result<T = ()> = result::Result<T, Error>;

/// The operation an [`Error`] occurred in.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum Context {
	#[default]
	#[display("operate on a stream")]
	Unknown,
	#[display("read from a buffer")]
	BufRead,
	#[display("write to a buffer")]
	BufWrite,
	#[display("copy a buffer")]
	BufCopy,
	#[display("clear a buffer")]
	BufClear,
	#[display("compact a buffer")]
	BufCompact,
	#[display("fill from a source")]
	Fill,
	#[display("drain into a sink")]
	Drain,
	#[display("flush a sink")]
	Flush,
	#[display("close a stream")]
	Close,
	#[display("compress data")]
	Compress,
	#[display("decompress data")]
	Decompress,
	#[display("encode text")]
	Encode,
	#[display("decode text")]
	Decode,
	#[display("{0}")]
	Other(&'static str),
}

/// The kind of failure an [`Error`] describes. Recoverable stream conditions
/// ([`Eos`](ErrorKind::Eos), [`Format`](ErrorKind::Format),
/// [`Compression`](ErrorKind::Compression)) are distinct from programmer errors
/// ([`Closed`](ErrorKind::Closed), [`InvalidInput`](ErrorKind::InvalidInput)).
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	#[display("premature end-of-stream")]
	Eos,
	#[display("invalid operation on closed stream")]
	Closed,
	#[display("invalid input")]
	InvalidInput,
	#[display("malformed data")]
	Format,
	#[display("compressed data corrupt")]
	Compression,
	#[display("segment pool failure")]
	Pool,
	#[display("IO error")]
	Io,
}

#[derive(Debug, Display)]
#[display("could not {context}: {kind}")]
pub struct Error {
	pub context: Context,
	pub kind: ErrorKind,
	source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		self.source
			.as_ref()
			.map(|src| &**src as &(dyn error::Error + 'static))
	}
}

impl Error {
	pub fn new(
		context: Context,
		kind: ErrorKind,
		source: Option<Box<dyn error::Error + Send + Sync>>,
	) -> Self {
		Self { context, kind, source }
	}

	/// Creates a new "end-of-stream" error.
	pub fn eos(context: Context) -> Self {
		Self::new(context, ErrorKind::Eos, None)
	}

	/// Creates a new "closed" error.
	pub fn closed(context: Context) -> Self {
		Self::new(context, ErrorKind::Closed, None)
	}

	/// Creates a new "invalid input" error with a static message.
	pub fn invalid_input(context: Context, message: &'static str) -> Self {
		Self::new(context, ErrorKind::InvalidInput, Some(message.into()))
	}

	/// Creates a new format error.
	pub fn format(
		context: Context,
		source: impl error::Error + Send + Sync + 'static,
	) -> Self {
		Self::new(context, ErrorKind::Format, Some(Box::new(source)))
	}

	/// Creates a new compression error with a static message.
	pub fn compression(context: Context, message: &'static str) -> Self {
		Self::new(context, ErrorKind::Compression, Some(message.into()))
	}

	/// Creates a new compression error wrapping an underlying codec error.
	pub fn compression_source(
		context: Context,
		source: impl error::Error + Send + Sync + 'static,
	) -> Self {
		Self::new(context, ErrorKind::Compression, Some(Box::new(source)))
	}

	/// Creates a new IO error.
	pub fn io(context: Context, error: io::Error) -> Self {
		Self::new(context, ErrorKind::Io, Some(Box::new(error)))
	}

	/// Replaces the error context.
	pub fn with_context(mut self, context: Context) -> Self {
		self.context = context;
		self
	}

	/// Returns `true` for end-of-stream errors.
	pub fn is_eos(&self) -> bool { self.kind == ErrorKind::Eos }

	/// Returns the source downcast into an IO error, if any.
	pub fn io_source(&self) -> Option<&io::Error> {
		error::Error::source(self)?.downcast_ref()
	}

	pub(crate) fn into_io(self) -> io::Error {
		let kind = match self.kind {
			ErrorKind::Eos => io::ErrorKind::UnexpectedEof,
			ErrorKind::Io => self.io_source()
				.map_or(io::ErrorKind::Other, io::Error::kind),
			ErrorKind::InvalidInput => io::ErrorKind::InvalidInput,
			_ => io::ErrorKind::Other,
		};
		io::Error::new(kind, self)
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		if value.kind() == io::ErrorKind::UnexpectedEof {
			Self::eos(Context::Unknown)
		} else {
			Self::io(Context::Unknown, value)
		}
	}
}

impl From<PoolError> for Error {
	fn from(value: PoolError) -> Self {
		Self::new(Context::Unknown, ErrorKind::Pool, Some(Box::new(value)))
	}
}

impl From<ParseNumError> for Error {
	fn from(value: ParseNumError) -> Self {
		Self::format(Context::BufRead, value)
	}
}

/// Attaches a [`Context`] to errors, `.context(BufRead)` and the like.
pub trait ResultExt<T> {
	fn context(self, context: Context) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for result::Result<T, E> {
	fn context(self, context: Context) -> Result<T> {
		self.map_err(|err| err.into().with_context(context))
	}
}

/// An error parsing a decimal or hexadecimal number from bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseNumError {
	#[error("empty byte string")]
	Empty,
	#[error("invalid digit `{0:#04X}` found in byte string")]
	InvalidDigit(u8),
	#[error("number too large to fit in target type")]
	PosOverflow,
	#[error("number too small to fit in target type")]
	NegOverflow,
}

/// A segment pool failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PoolError {
	#[error("could not lock pool shard, mutex was poisoned")]
	Poisoned,
	#[error("could not borrow the pool, already in use")]
	Borrowed,
}
