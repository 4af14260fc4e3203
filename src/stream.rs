use crate::error::FsError;
use crate::registry::RootsSnapshot;
use crate::validate;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;
pub const TAIL_CHUNK_SIZE: u64 = 1024;
pub const MAX_LINE_BYTES: usize = 64 * 1024;
const BASE64_STREAM_THRESHOLD: u64 = 10 * 1024 * 1024;

// Removes the temp file unless the rename went through.
struct TempGuard {
	path: PathBuf,
	armed: bool,
}

impl TempGuard {
	fn new(path: PathBuf) -> Self {
		Self {
			path,
			armed: true
		}
	}
	fn disarm(&mut self) {
		self.armed = false;
	}
}

impl Drop for TempGuard {
	fn drop(&mut self) {
		if self.armed {
			let _ = std::fs::remove_file(&self.path);
		}
	}
}

fn temp_path_in(dir: &Path) -> PathBuf {
	dir.join(format!(".tmp-{}", Uuid::new_v4().simple()))
}

/// Writes `data` to `path` via an exclusive temp file and rename. The
/// destination either holds the complete new contents or is untouched.
pub async fn atomic_write_file(
	path: &Path,
	data: &[u8],
	mode: u32,
	roots: &RootsSnapshot) -> Result<(), FsError> {
	validate::final_create_path(&path.to_string_lossy(), roots)?;
	let dir = path.parent().ok_or_else(|| FsError::NoValidAncestor(path.to_path_buf()))?;
	let tmp = temp_path_in(dir);
	let mut open = tokio::fs::OpenOptions::new();
	open.write(true).create_new(true);
	#[cfg(unix)]
	open.mode(mode);
	#[cfg(not(unix))]
	let _ = mode;
	let mut file = open.open(&tmp).await?;
	let mut guard = TempGuard::new(tmp.clone());
	file.write_all(data).await?;
	file.sync_all().await?;
	drop(file);
	tokio::fs::rename(&tmp, path).await?;
	guard.disarm();
	Ok(())
}

/// Streams `src` into `dst` through an exclusive 0600 temp file, then matches
/// the source permissions and renames over the destination.
pub async fn copy_file_streaming(src: &Path, dst: &Path) -> Result<(), FsError> {
	let mut source = File::open(src).await?;
	let info = source.metadata().await?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(src.to_path_buf()));
	}
	let dir = dst.parent().ok_or_else(|| FsError::NoValidAncestor(dst.to_path_buf()))?;
	let tmp = temp_path_in(dir);
	let mut open = tokio::fs::OpenOptions::new();
	open.write(true).create_new(true);
	#[cfg(unix)]
	open.mode(0o600);
	let mut out = open.open(&tmp).await?;
	let mut guard = TempGuard::new(tmp.clone());
	let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
	loop {
		let count = source.read(&mut buf).await?;
		if count == 0 {
			break;
		}
		out.write_all(&buf[..count]).await?;
	}
	out.sync_all().await?;
	drop(out);
	tokio::fs::set_permissions(&tmp, info.permissions()).await?;
	tokio::fs::rename(&tmp, dst).await?;
	guard.disarm();
	Ok(())
}

// Buffered line scanner with a hard cap on line length. Longer lines fail
// rather than silently truncate.
struct LineScanner {
	reader: BufReader<File>,
	buf: Vec<u8>,
	done: bool,
}

impl LineScanner {
	fn new(file: File) -> Self {
		Self {
			reader: BufReader::new(file),
			buf: Vec::new(),
			done: false
		}
	}

	async fn next_line(&mut self) -> Result<Option<String>, FsError> {
		use tokio::io::AsyncBufReadExt;
		if self.done {
			return Ok(None);
		}
		self.buf.clear();
		loop {
			let chunk = self.reader.fill_buf().await?;
			if chunk.is_empty() {
				self.done = true;
				if self.buf.is_empty() {
					return Ok(None);
				}
				let line = String::from_utf8_lossy(&self.buf).to_string();
				return Ok(Some(line));
			}
			if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
				if self.buf.len() + pos > MAX_LINE_BYTES {
					return Err(FsError::LineTooLong(MAX_LINE_BYTES));
				}
				self.buf.extend_from_slice(&chunk[..pos]);
				self.reader.consume(pos + 1);
				let line = String::from_utf8_lossy(&self.buf).to_string();
				self.buf.clear();
				return Ok(Some(line));
			}
			let len = chunk.len();
			if self.buf.len() + len > MAX_LINE_BYTES {
				return Err(FsError::LineTooLong(MAX_LINE_BYTES));
			}
			self.buf.extend_from_slice(chunk);
			self.reader.consume(len);
		}
	}
}

/// Reads the first `n` lines. No trailing newline in the output.
pub async fn head_file(path: &Path, n: usize) -> Result<String, FsError> {
	if n == 0 {
		return Ok(String::new());
	}
	let file = File::open(path).await?;
	let mut scanner = LineScanner::new(file);
	let mut out = String::new();
	let mut count = 0usize;
	while count < n {
		let Some(line) = scanner.next_line().await? else {
			break;
		};
		if count > 0 {
			out.push('\n');
		}
		out.push_str(&line);
		count += 1;
	}
	Ok(out)
}

/// Reads the last `n` lines by scanning backward in fixed-size chunks.
/// Handles files without a trailing newline and lines longer than one chunk.
pub async fn tail_file(path: &Path, n: usize) -> Result<String, FsError> {
	if n == 0 {
		return Ok(String::new());
	}
	let mut file = File::open(path).await?;
	let size = file.metadata().await?.len();
	if size == 0 {
		return Ok(String::new());
	}
	// A final newline terminates the last line rather than starting an empty one.
	let mut effective = size;
	file.seek(std::io::SeekFrom::Start(size - 1)).await?;
	let mut last = [0u8; 1];
	file.read_exact(&mut last).await?;
	if last[0] == b'\n' {
		effective -= 1;
	}
	let mut lines: std::collections::VecDeque<String> = std::collections::VecDeque::new();
	let mut leftover: Vec<u8> = Vec::new();
	let mut offset = effective;
	while lines.len() < n && offset > 0 {
		let read_size = offset.min(TAIL_CHUNK_SIZE);
		offset -= read_size;
		file.seek(std::io::SeekFrom::Start(offset)).await?;
		let mut chunk = vec![0u8; read_size as usize];
		file.read_exact(&mut chunk).await?;
		chunk.extend_from_slice(&leftover);
		let mut end = chunk.len();
		for i in (0..chunk.len()).rev() {
			if chunk[i] == b'\n' {
				lines.push_front(String::from_utf8_lossy(&chunk[i + 1..end]).to_string());
				end = i;
				if lines.len() >= n {
					break;
				}
			}
		}
		leftover = chunk[..end].to_vec();
		if lines.len() >= n {
			break;
		}
	}
	if lines.len() < n && offset == 0 {
		// Whatever precedes the first newline is the first line, empty or not.
		lines.push_front(String::from_utf8_lossy(&leftover).to_string());
	}
	let mut out = String::new();
	for (index, line) in lines.iter().enumerate() {
		if index > 0 {
			out.push('\n');
		}
		out.push_str(line);
	}
	Ok(out)
}

/// Reads lines `[start, end]` (1-based, inclusive) prefixed with right-aligned
/// line numbers. `start <= 0` means from the beginning, `end <= 0` means to
/// end of file.
pub async fn read_lines_numbered(path: &Path, start_line: i64, end_line: i64) -> Result<String, FsError> {
	let start = if start_line <= 0 {
		1
	}
	else {
		start_line as usize
	};
	let max_line = if end_line > 0 {
		end_line as usize
	}
	else {
		count_lines(path).await?
	};
	let width = decimal_width(max_line);
	let file = File::open(path).await?;
	let mut scanner = LineScanner::new(file);
	let mut out = String::new();
	let mut number = 0usize;
	let mut first = true;
	while let Some(line) = scanner.next_line().await? {
		number += 1;
		if number < start {
			continue;
		}
		if end_line > 0 && number > end_line as usize {
			break;
		}
		if !first {
			out.push('\n');
		}
		first = false;
		out.push_str(&format!("{:>width$} | {}", number, line, width = width));
	}
	Ok(out)
}

/// Single-pass tail with line numbers: a ring buffer of the last `n` lines
/// annotated with their 1-based numbers.
pub async fn tail_lines_numbered(path: &Path, n: usize) -> Result<String, FsError> {
	if n == 0 {
		return Ok(String::new());
	}
	let file = File::open(path).await?;
	let mut scanner = LineScanner::new(file);
	let mut ring: Vec<(usize, String)> = Vec::with_capacity(n);
	let mut total = 0usize;
	while let Some(line) = scanner.next_line().await? {
		total += 1;
		if ring.len() < n {
			ring.push((total, line));
		}
		else {
			ring[(total - 1) % n] = (total, line);
		}
	}
	if total == 0 {
		return Ok(String::new());
	}
	let width = decimal_width(total);
	let count = ring.len();
	let start = if total > n {
		total % n
	}
	else {
		0
	};
	let mut out = String::new();
	for i in 0..count {
		let (number, text) = &ring[(start + i) % count];
		if i > 0 {
			out.push('\n');
		}
		out.push_str(&format!("{:>width$} | {}", number, text, width = width));
	}
	Ok(out)
}

pub async fn count_lines(path: &Path) -> Result<usize, FsError> {
	let file = File::open(path).await?;
	let mut scanner = LineScanner::new(file);
	let mut count = 0usize;
	while scanner.next_line().await?.is_some() {
		count += 1;
	}
	Ok(count)
}

fn decimal_width(mut value: usize) -> usize {
	if value == 0 {
		return 1;
	}
	let mut width = 0;
	while value > 0 {
		width += 1;
		value /= 10;
	}
	width
}

/// Encodes a file as standard-alphabet base64. Small files are read whole;
/// larger ones are streamed chunk by chunk.
pub async fn file_to_base64(path: &Path) -> Result<String, FsError> {
	let mut file = File::open(path).await?;
	let size = file.metadata().await?.len();
	if size < BASE64_STREAM_THRESHOLD {
		let mut data = Vec::with_capacity(size as usize);
		file.read_to_end(&mut data).await?;
		return Ok(STANDARD.encode(data));
	}
	let mut out = String::new();
	let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
	let mut pending: Vec<u8> = Vec::new();
	loop {
		let count = file.read(&mut buf).await?;
		if count == 0 {
			break;
		}
		pending.extend_from_slice(&buf[..count]);
		let usable = pending.len() - pending.len() % 3;
		out.push_str(&STANDARD.encode(&pending[..usable]));
		pending.drain(..usable);
	}
	if !pending.is_empty() {
		out.push_str(&STANDARD.encode(&pending));
	}
	Ok(out)
}

/// Base-1024 human-readable size, one decimal at KB and above.
pub fn format_size(size: u64) -> String {
	const UNIT: u64 = 1024;
	if size < UNIT {
		return format!("{} B", size);
	}
	let mut div = UNIT;
	let mut exp = 0usize;
	let mut n = size / UNIT;
	while n >= UNIT {
		div *= UNIT;
		exp += 1;
		n /= UNIT;
	}
	let units = ['K', 'M', 'G', 'T', 'P', 'E'];
	format!("{:.1} {}B", size as f64 / div as f64, units[exp])
}
