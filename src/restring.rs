// restring.rs - Port of re_string_t (regex_internal.c)
// Working view of a pattern or subject: translation, case folding,
// character boundaries and positional context.

use std::borrow::Cow;

use crate::bitset::BitSet;
use crate::regenc::{CodePoint, Encoding};
use crate::regex::RegErrcode;
use crate::regint::{Context, Idx};

/// Marks a byte that continues the character started before it.
pub const WEOF: CodePoint = u32::MAX;
/// Marks a byte that does not start a valid character.
pub const WINVALID: CodePoint = u32::MAX - 1;

/// Options shared by pattern and subject views.
#[derive(Clone, Copy)]
pub struct ViewOptions<'t> {
    pub encoding: &'static dyn Encoding,
    pub translate: Option<&'t [u8; 256]>,
    pub icase: bool,
    pub newline_anchor: bool,
    pub word_ops_used: bool,
    pub word_char: BitSet,
    pub not_bol: bool,
    pub not_eol: bool,
}

impl<'t> ViewOptions<'t> {
    pub fn new(encoding: &'static dyn Encoding) -> Self {
        let mut word_char = BitSet::new();
        if encoding.is_single_byte() {
            for b in 0..=255u8 {
                if encoding.is_word_code(b as CodePoint) {
                    word_char.set(b);
                }
            }
        } else {
            for b in 0..0x80u8 {
                if encoding.is_word_code(b as CodePoint) {
                    word_char.set(b);
                }
            }
        }
        ViewOptions {
            encoding,
            translate: None,
            icase: false,
            newline_anchor: false,
            word_ops_used: false,
            word_char,
            not_bol: false,
            not_eol: false,
        }
    }
}

pub struct ReString<'a> {
    raw: &'a [u8],
    mbs: Cow<'a, [u8]>,
    /// Code point per working byte, `WEOF` on continuation bytes.
    wcs: Option<Vec<CodePoint>>,
    /// Working index to raw index, present only when folding changed lengths.
    offsets: Option<Vec<usize>>,
    cur_idx: Idx,
    len: Idx,
    tip_context: Context,
    opts: ViewOptions<'a>,
}

impl<'a> ReString<'a> {
    /// Build the working view of `raw`.
    pub fn construct(raw: &'a [u8], opts: ViewOptions<'a>) -> Result<Self, RegErrcode> {
        let enc = opts.encoding;
        let needs_copy = opts.translate.is_some() || opts.icase;

        let (mbs, wcs, offsets) = if enc.is_single_byte() {
            let mbs = if needs_copy {
                let mut buf = Vec::new();
                buf.try_reserve_exact(raw.len())?;
                buf.extend(raw.iter().map(|&b| {
                    let t = opts.translate.map_or(b, |tr| tr[b as usize]);
                    if opts.icase {
                        enc.to_upper(t as CodePoint) as u8
                    } else {
                        t
                    }
                }));
                Cow::Owned(buf)
            } else {
                Cow::Borrowed(raw)
            };
            (mbs, None, None)
        } else {
            let translated: Cow<'a, [u8]> = match opts.translate {
                Some(tr) => {
                    let mut buf = Vec::new();
                    buf.try_reserve_exact(raw.len())?;
                    buf.extend(raw.iter().map(|&b| tr[b as usize]));
                    Cow::Owned(buf)
                }
                None => Cow::Borrowed(raw),
            };
            if opts.icase {
                let (buf, offsets) = build_upper_buffer(&translated, enc)?;
                let wcs = build_wcs(&buf, enc)?;
                (Cow::Owned(buf), Some(wcs), offsets)
            } else {
                let wcs = build_wcs(&translated, enc)?;
                (translated, Some(wcs), None)
            }
        };

        let len = mbs.len();
        let tip_context = if opts.not_bol {
            Context::BEGBUF
        } else {
            Context::NEWLINE | Context::BEGBUF
        };
        Ok(ReString {
            raw,
            mbs,
            wcs,
            offsets,
            cur_idx: 0,
            len,
            tip_context,
            opts,
        })
    }

    // === Cursor ===

    #[inline]
    pub fn cur_idx(&self) -> Idx {
        self.cur_idx
    }

    #[inline]
    pub fn len(&self) -> Idx {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn eoi(&self) -> bool {
        self.cur_idx >= self.len
    }

    pub fn set_index(&mut self, idx: Idx) {
        self.cur_idx = idx.min(self.len);
    }

    pub fn skip_bytes(&mut self, n: isize) {
        self.cur_idx = self.cur_idx.saturating_add_signed(n).min(self.len);
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.mbs
    }

    #[inline]
    pub fn byte_at(&self, idx: Idx) -> u8 {
        self.mbs[idx]
    }

    /// Byte at `cur_idx + off`; `0` past the end.
    #[inline]
    pub fn peek_byte(&self, off: isize) -> u8 {
        self.cur_idx
            .checked_add_signed(off)
            .and_then(|i| self.mbs.get(i).copied())
            .unwrap_or(0)
    }

    /// Like `peek_byte` but before case folding.
    pub fn peek_byte_case(&self, off: isize) -> u8 {
        match self.cur_idx.checked_add_signed(off) {
            Some(i) if i < self.len => self.byte_case_at(i),
            _ => 0,
        }
    }

    pub fn fetch_byte(&mut self) -> u8 {
        let b = self.peek_byte(0);
        self.skip_bytes(1);
        b
    }

    pub fn fetch_byte_case(&mut self) -> u8 {
        let b = self.peek_byte_case(0);
        self.skip_bytes(1);
        b
    }

    fn byte_case_at(&self, idx: Idx) -> u8 {
        let folded = self.mbs[idx];
        if !self.opts.icase {
            return folded;
        }
        let raw_idx = self.working_to_raw(idx);
        let b = self.raw[raw_idx];
        let t = self.opts.translate.map_or(b, |tr| tr[b as usize]);
        if self.wcs.is_some() && (folded >= 0x80 || t >= 0x80) {
            folded
        } else {
            t
        }
    }

    // === Characters ===

    #[inline]
    pub fn is_multibyte(&self) -> bool {
        self.wcs.is_some()
    }

    /// True when `idx` starts a character (or is the end).
    #[inline]
    pub fn first_byte(&self, idx: Idx) -> bool {
        match &self.wcs {
            Some(wcs) => idx >= self.len || wcs[idx] != WEOF,
            None => true,
        }
    }

    /// Byte length of the character starting at `idx`.
    pub fn char_size_at(&self, idx: Idx) -> usize {
        match &self.wcs {
            Some(wcs) if idx < self.len => {
                let mut n = 1;
                while idx + n < self.len && wcs[idx + n] == WEOF {
                    n += 1;
                }
                n
            }
            _ => 1,
        }
    }

    /// Code point at `idx`: `WEOF` inside a character, `WINVALID` for
    /// undecodable bytes.
    pub fn wchar_at(&self, idx: Idx) -> CodePoint {
        match &self.wcs {
            Some(wcs) => wcs.get(idx).copied().unwrap_or(WEOF),
            None => self.mbs.get(idx).map_or(WEOF, |&b| b as CodePoint),
        }
    }

    // === Context ===

    /// Context of the character at `idx`; the end of the buffer yields
    /// `ENDBUF` (plus `NEWLINE` unless `not_eol`).
    pub fn context_at(&self, idx: Idx) -> Context {
        if idx >= self.len {
            return if self.opts.not_eol {
                Context::ENDBUF
            } else {
                Context::ENDBUF | Context::NEWLINE
            };
        }
        match &self.wcs {
            Some(wcs) => {
                let mut wi = idx;
                while wcs[wi] == WEOF && wi > 0 {
                    wi -= 1;
                }
                let wc = wcs[wi];
                if wc == WEOF || wc == WINVALID {
                    return Context::empty();
                }
                if self.opts.word_ops_used && self.opts.encoding.is_word_code(wc) {
                    return Context::WORD;
                }
                if wc == b'\n' as CodePoint && self.opts.newline_anchor {
                    Context::NEWLINE
                } else {
                    Context::empty()
                }
            }
            None => {
                let c = self.mbs[idx];
                if self.opts.word_char.contains(c) {
                    return Context::WORD;
                }
                if c == b'\n' && self.opts.newline_anchor {
                    Context::NEWLINE
                } else {
                    Context::empty()
                }
            }
        }
    }

    /// Context of the character before `idx`.
    pub fn context_before(&self, idx: Idx) -> Context {
        if idx == 0 {
            self.tip_context
        } else {
            self.context_at(idx - 1)
        }
    }

    // === Offsets ===

    #[inline]
    pub fn offsets_needed(&self) -> bool {
        self.offsets.is_some()
    }

    /// Raw offset of working offset `idx` (the end maps to the raw end).
    pub fn working_to_raw(&self, idx: Idx) -> usize {
        match &self.offsets {
            Some(offs) if idx < offs.len() => offs[idx],
            Some(_) => self.raw.len(),
            None => idx,
        }
    }

    /// First working offset whose raw offset is at least `raw_idx`.
    pub fn raw_to_working(&self, raw_idx: usize) -> Idx {
        match &self.offsets {
            Some(offs) => offs.partition_point(|&o| o < raw_idx),
            None => raw_idx.min(self.len),
        }
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

fn build_wcs(buf: &[u8], enc: &dyn Encoding) -> Result<Vec<CodePoint>, RegErrcode> {
    let mut wcs = Vec::new();
    wcs.try_reserve_exact(buf.len())?;
    let mut i = 0;
    while i < buf.len() {
        match enc.mbc_to_code(&buf[i..]) {
            Some((code, n)) => {
                wcs.push(code);
                for _ in 1..n {
                    wcs.push(WEOF);
                }
                i += n;
            }
            None => {
                wcs.push(WINVALID);
                i += 1;
            }
        }
    }
    Ok(wcs)
}

/// Uppercase every character whose uppercase form is a single character.
/// Returns the folded bytes and, if any length changed, the offset map.
fn build_upper_buffer(
    src: &[u8],
    enc: &dyn Encoding,
) -> Result<(Vec<u8>, Option<Vec<usize>>), RegErrcode> {
    let mut out = Vec::new();
    out.try_reserve(src.len())?;
    let mut offsets: Vec<usize> = Vec::new();
    let mut offsets_needed = false;
    let mut i = 0;
    while i < src.len() {
        let start_len = out.len();
        match enc.mbc_to_code(&src[i..]) {
            Some((code, n)) => {
                let up = enc.to_upper(code);
                if up == code {
                    out.extend_from_slice(&src[i..i + n]);
                } else {
                    let mut buf = [0u8; 4];
                    let m = enc.code_to_mbc(up, &mut buf);
                    out.try_reserve(m)?;
                    out.extend_from_slice(&buf[..m]);
                    if m != n {
                        offsets_needed = true;
                    }
                }
                let written = out.len() - start_len;
                offsets.try_reserve(written)?;
                for k in 0..written {
                    offsets.push(i + k.min(n - 1));
                }
                i += n;
            }
            None => {
                out.try_reserve(1)?;
                out.push(src[i]);
                offsets.try_reserve(1)?;
                offsets.push(i);
                i += 1;
            }
        }
    }
    Ok((out, offsets_needed.then_some(offsets)))
}
